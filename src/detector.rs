//! Threshold-crossing spike detection over voltage matrices.
//!
//! [`SpikeDetector`] turns each scanned row of a voltage matrix into a sparse
//! list of spike onsets. A sample is a spike onset when the trace rises
//! through the threshold between two consecutive samples, is still at or
//! above threshold a minimum spike duration later, and lies outside the
//! refractory period of the previous spike on the same row.
//!
//! Rows never share state, so the scan can run one row per rayon task; the
//! per-row results are concatenated in scan order either way.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{RasterError, Result};
use crate::geometry::ScanGeometry;
use crate::record::{Raster, RasterPrefix, SimulationRecord, SpikeEvent};

/// Default refractory period, in ms.
pub const DEFAULT_T_REFRACTORY: f64 = 2.0;
/// Default minimum time above threshold, in ms.
pub const DEFAULT_T_MIN_SPIKE: f64 = 0.1;

/// How rows are distributed during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One row after the other on the calling thread.
    #[default]
    Sequential,
    /// One rayon task per row.
    Parallel,
}

/// Caller-facing parameters of [`rasterize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Detection threshold in mV. `None` (or `0`) uses the record's own
    /// threshold; ask for a tiny non-zero value to detect at exactly 0 mV.
    pub threshold: Option<f64>,
    /// Start of the scan, in ms.
    pub t_start: f64,
    /// End of the scan, in ms. `None` (or `0`) scans up to `tstop`.
    pub t_stop: Option<f64>,
    /// Refractory period, in ms.
    pub t_refractory: f64,
    /// Minimum time above threshold, in ms.
    pub t_min_spike: f64,
    pub mode: ExecutionMode,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold: None,
            t_start: 0.0,
            t_stop: None,
            t_refractory: DEFAULT_T_REFRACTORY,
            t_min_spike: DEFAULT_T_MIN_SPIKE,
            mode: ExecutionMode::Sequential,
        }
    }
}

/// Spike onset scanner with refractory period and minimum spike duration.
///
/// # Example
/// ```
/// use axonraster::SpikeDetector;
///
/// // dt = 0.01 ms, scan the first 100 samples, 2 ms refractory, 0.1 ms minimum spike
/// let detector = SpikeDetector::new(0.0, 0.01, 0.0, 100, 2.0, 0.1).unwrap();
///
/// let mut trace = vec![-70.0; 100];
/// trace[21..60].iter_mut().for_each(|v| *v = 30.0);
///
/// let mut onsets = Vec::new();
/// detector.scan_trace(&trace, &mut onsets);
/// assert_eq!(onsets, vec![20]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SpikeDetector {
    threshold: f64,
    dt: f64,
    t_start: f64,
    start_index: usize,
    stop_index: usize,
    t_refractory: f64,
    min_spike_samples: usize,
    mode: ExecutionMode,
}

impl SpikeDetector {
    /// Creates a detector.
    ///
    /// # Arguments
    /// * `threshold` - Detection threshold, in mV
    /// * `dt` - Sample interval, in ms
    /// * `t_start` - Scan start, in ms
    /// * `stop_index` - Exclusive end of the scan, in samples
    /// * `t_refractory` - Refractory period, in ms
    /// * `t_min_spike` - Minimum time above threshold, in ms
    ///
    /// # Errors
    /// `VariableTimeStep` when `dt == 0`.
    pub fn new(
        threshold: f64,
        dt: f64,
        t_start: f64,
        stop_index: usize,
        t_refractory: f64,
        t_min_spike: f64,
    ) -> Result<Self> {
        if dt == 0.0 {
            return Err(RasterError::VariableTimeStep("spike detection"));
        }
        Ok(Self {
            threshold,
            dt,
            t_start,
            start_index: samples(t_start, dt),
            stop_index,
            t_refractory,
            min_spike_samples: samples(t_min_spike, dt),
            mode: ExecutionMode::Sequential,
        })
    }

    /// Selects sequential or per-row parallel scanning.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Scans one trace and appends the onset sample indices to `onsets`.
    ///
    /// The scan stops one sample before the end of the trace at the latest,
    /// so every rising-edge test has a following sample to look at. The
    /// refractory reference starts one refractory period before `t_start`,
    /// so a crossing exactly at the scan start is not an onset.
    pub fn scan_trace(&self, trace: &[f64], onsets: &mut Vec<usize>) {
        let thr = self.threshold;
        let stop = self.stop_index.min(trace.len().saturating_sub(1));
        let mut t_last_spike = self.t_start - self.t_refractory;

        for j in self.start_index..stop {
            if trace[j] <= thr
                && trace[j + 1] >= thr
                && trace[j.saturating_add(self.min_spike_samples).min(stop)] >= thr
            {
                let t_j = j as f64 * self.dt;
                if t_j - t_last_spike > self.t_refractory {
                    onsets.push(j);
                    t_last_spike = t_j;
                }
            }
        }
    }

    /// Detects spikes on every row of `geometry`, in scan order.
    ///
    /// # Errors
    /// `IndexOutOfRange` when a scanned row has no matrix row or coordinate,
    /// `ShapeMismatch` when the time vector is shorter than the traces.
    pub fn detect(
        &self,
        voltage: &Array2<f64>,
        t: &[f64],
        geometry: &ScanGeometry<'_>,
    ) -> Result<Raster> {
        geometry.check_bounds(voltage.nrows())?;
        if t.len() < voltage.ncols() {
            return Err(RasterError::ShapeMismatch(format!(
                "time vector has {} samples, voltage has {}",
                t.len(),
                voltage.ncols()
            )));
        }

        let rows = geometry.rows.to_vec();
        let scan_row = |row: usize| -> Vec<SpikeEvent> {
            let mut onsets = Vec::new();
            let trace = voltage.row(row);
            match trace.as_slice() {
                Some(samples) => self.scan_trace(samples, &mut onsets),
                None => self.scan_trace(&trace.to_vec(), &mut onsets),
            }
            onsets
                .into_iter()
                .map(|j| SpikeEvent {
                    position: row,
                    x_position: geometry.coordinates[row],
                    time_index: j,
                    time: t[j],
                })
                .collect()
        };

        let per_row: Vec<Vec<SpikeEvent>> = match self.mode {
            ExecutionMode::Sequential => rows.iter().map(|&row| scan_row(row)).collect(),
            ExecutionMode::Parallel => rows.par_iter().map(|&row| scan_row(row)).collect(),
        };

        let mut raster = Raster::with_capacity(per_row.iter().map(Vec::len).sum());
        per_row.into_iter().flatten().for_each(|event| raster.push(event));
        Ok(raster)
    }
}

fn samples(duration: f64, dt: f64) -> usize {
    (duration / dt).round().max(0.0) as usize
}

/// Detects spikes in the voltage behind `prefix` and stores the raster.
///
/// Returns the number of detected spikes. The previous raster under the same
/// prefix is replaced as a whole; on error the record is left untouched.
///
/// # Errors
/// `VariableTimeStep` when `dt == 0`; `MissingField` when the voltage, time
/// vector, geometry arrays or threshold are absent; the errors of
/// [`SpikeDetector::detect`].
pub fn rasterize(
    record: &mut SimulationRecord,
    prefix: RasterPrefix,
    params: &DetectionParams,
) -> Result<usize> {
    if record.dt == 0.0 {
        warn!("rasterization aborted, variable time step used for differential equation solving");
        return Err(RasterError::VariableTimeStep("rasterization"));
    }
    let dt = record.dt;
    let threshold = params
        .threshold
        .filter(|&thr| thr != 0.0)
        .or(record.threshold)
        .ok_or(RasterError::MissingField("threshold"))?;
    let t_stop = params
        .t_stop
        .filter(|&t| t != 0.0)
        .unwrap_or(record.tstop);
    let stop_index = samples(t_stop, dt);

    let raster = {
        let voltage = record.voltage(prefix)?;
        let t = record.time()?;
        let geometry = ScanGeometry::resolve(record)?;
        debug!(
            key = prefix.source_key(),
            threshold,
            t_start = params.t_start,
            stop_index,
            rows = geometry.rows.len(),
            mode = ?params.mode,
            "rasterizing voltage"
        );
        SpikeDetector::new(
            threshold,
            dt,
            params.t_start,
            stop_index,
            params.t_refractory,
            params.t_min_spike,
        )?
        .with_mode(params.mode)
        .detect(voltage, t, &geometry)?
    };

    let spikes = raster.len();
    record.set_raster(prefix, raster);
    info!(key = prefix.key(), spikes, "stored spike raster");
    Ok(spikes)
}

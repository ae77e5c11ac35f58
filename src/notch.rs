//! Notch filtering of stimulation artifacts out of voltage traces.
//!
//! [`NotchFilter`] cascades one biquad notch per frequency, in the order the
//! frequencies are given. Coefficients are shared across rows; each row is
//! filtered from a zero initial state, so rows are independent and are
//! processed in parallel.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Zip};
use tracing::{debug, info, warn};

use crate::error::{RasterError, Result};
use crate::filter::{BiquadCoeffs, IirFilter};
use crate::record::SimulationRecord;

/// Default notch quality factor.
pub const DEFAULT_Q: f64 = 10.0;

/// Cascade of notch sections applied to every row of a voltage matrix.
///
/// Frequencies are in kHz when times are in ms.
///
/// # Example
/// ```
/// use axonraster::NotchFilter;
/// use ndarray::Array2;
///
/// // dt = 0.005 ms -> fs = 200 kHz, remove a 10 kHz artifact and its harmonic
/// let filter = NotchFilter::new(200.0, &[10.0, 20.0], 10.0).unwrap();
/// let out = filter.filter_matrix(&Array2::zeros((4, 100)));
/// assert_eq!(out.dim(), (4, 100));
/// ```
#[derive(Debug, Clone)]
pub struct NotchFilter {
    coeffs: Vec<BiquadCoeffs>,
}

impl NotchFilter {
    /// Designs one notch per frequency.
    ///
    /// # Errors
    /// `InvalidFrequency` when a frequency is not strictly between 0 and the
    /// Nyquist frequency, or `q` is not positive.
    pub fn new(sample_rate: f64, frequencies: &[f64], q: f64) -> Result<Self> {
        let coeffs = frequencies
            .iter()
            .map(|&freq| {
                BiquadCoeffs::notch(sample_rate, freq, q).ok_or(RasterError::InvalidFrequency {
                    freq,
                    fs: sample_rate,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { coeffs })
    }

    pub fn coefficients(&self) -> &[BiquadCoeffs] {
        &self.coeffs
    }

    /// Filters one trace into `out`, starting from a zero state.
    pub fn filter_row_into(&self, row: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        let mut iir = IirFilter::new(self.coeffs.clone());
        for (y, &x) in out.iter_mut().zip(row.iter()) {
            *y = iir.process_sample(x);
        }
    }

    /// Filters every row of `matrix`, rows in parallel.
    pub fn filter_matrix(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros(matrix.raw_dim());
        Zip::from(out.rows_mut())
            .and(matrix.rows())
            .par_for_each(|out_row, row| self.filter_row_into(row, out_row));
        out
    }
}

/// Notch-filters the record's membrane voltage into `voltage_filtered`.
///
/// Frequencies (kHz) are removed one after the other in the given order.
///
/// # Errors
/// `VariableTimeStep` when `dt == 0`, `MissingField` when the voltage is
/// absent, `InvalidFrequency` for a frequency outside `(0, fs/2)`. Nothing is
/// written on error.
pub fn filter_voltage(record: &mut SimulationRecord, frequencies: &[f64], q: f64) -> Result<()> {
    if record.dt == 0.0 {
        warn!("filtering aborted, variable time step used for differential equation solving");
        return Err(RasterError::VariableTimeStep("notch filtering"));
    }
    let voltage = record
        .voltage
        .as_ref()
        .ok_or(RasterError::MissingField("V_mem"))?;

    let fs = 1.0 / record.dt;
    debug!(fs, ?frequencies, q, "designing notch cascade");
    let filter = NotchFilter::new(fs, frequencies, q)?;
    let filtered = filter.filter_matrix(voltage);

    info!(
        rows = filtered.nrows(),
        samples = filtered.ncols(),
        sections = filter.coefficients().len(),
        "stored notch-filtered voltage"
    );
    record.voltage_filtered = Some(filtered);
    Ok(())
}

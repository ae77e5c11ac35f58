//! Typed simulation record and the raster key sets written into it.
//!
//! [`SimulationRecord`] mirrors the result mapping produced by the nerve-fiber
//! simulator. Every field the analysis reads is typed, and every field that
//! may be absent is an `Option`, so presence checks are explicit instead of
//! key lookups. Serialized names match the simulator's keys so records can be
//! read straight from its JSON output.

use ndarray::{Array2, Axis};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{RasterError, Result};

/// Which voltage trace a raster was extracted from.
///
/// Replaces the `"V_mem_raster"` / `"V_mem_filtered_raster"` string prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterPrefix {
    /// Raster of the raw membrane voltage (`V_mem_raster`).
    Raw,
    /// Raster of the notch-filtered membrane voltage (`V_mem_filtered_raster`).
    Filtered,
}

impl RasterPrefix {
    /// Key prefix used by the simulator's result files.
    pub const fn key(self) -> &'static str {
        match self {
            RasterPrefix::Raw => "V_mem_raster",
            RasterPrefix::Filtered => "V_mem_filtered_raster",
        }
    }

    /// Name of the voltage field this raster is computed from.
    pub const fn source_key(self) -> &'static str {
        match self {
            RasterPrefix::Raw => "V_mem",
            RasterPrefix::Filtered => "V_mem_filtered",
        }
    }
}

/// Recording mode of the simulation (`rec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Every computational segment was recorded.
    #[default]
    All,
    /// Only a subset of positions (`x_rec`) was recorded.
    #[serde(other)]
    Subset,
}

/// One detected spike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvent {
    /// Row of the voltage matrix.
    pub position: usize,
    /// Physical coordinate of the row, in um.
    pub x_position: f64,
    /// Column (sample index) of the threshold crossing.
    pub time_index: usize,
    /// Time of the crossing, in ms.
    pub time: f64,
}

/// Four parallel spike sequences stored under one key prefix.
///
/// Entry `k` of each sequence describes the same spike. Events can only be
/// added whole, so the sequences always have equal length. In the simulator's
/// files the sequences sit under `<prefix>_position`, `<prefix>_x_position`,
/// `<prefix>_time_index` and `<prefix>_time`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raster {
    position: Vec<u32>,
    x_position: Vec<f64>,
    time_index: Vec<u32>,
    time: Vec<f64>,
}

impl Raster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a raster from already-parallel sequences.
    ///
    /// # Errors
    /// `ShapeMismatch` when the sequences differ in length.
    pub fn from_columns(
        position: Vec<u32>,
        x_position: Vec<f64>,
        time_index: Vec<u32>,
        time: Vec<f64>,
    ) -> Result<Self> {
        let n = position.len();
        if x_position.len() != n || time_index.len() != n || time.len() != n {
            return Err(RasterError::ShapeMismatch(format!(
                "raster sequences have lengths {}/{}/{}/{}",
                n,
                x_position.len(),
                time_index.len(),
                time.len()
            )));
        }
        Ok(Self {
            position,
            x_position,
            time_index,
            time,
        })
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            position: Vec::with_capacity(capacity),
            x_position: Vec::with_capacity(capacity),
            time_index: Vec::with_capacity(capacity),
            time: Vec::with_capacity(capacity),
        }
    }

    /// Appends one spike to all four sequences.
    pub fn push(&mut self, event: SpikeEvent) {
        self.position.push(event.position as u32);
        self.x_position.push(event.x_position);
        self.time_index.push(event.time_index as u32);
        self.time.push(event.time);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<SpikeEvent> {
        if k >= self.len() {
            return None;
        }
        Some(SpikeEvent {
            position: self.position[k] as usize,
            x_position: self.x_position[k],
            time_index: self.time_index[k] as usize,
            time: self.time[k],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = SpikeEvent> + '_ {
        (0..self.len()).filter_map(move |k| self.get(k))
    }

    pub fn positions(&self) -> &[u32] {
        &self.position
    }

    pub fn x_positions(&self) -> &[f64] {
        &self.x_position
    }

    pub fn time_indices(&self) -> &[u32] {
        &self.time_index
    }

    pub fn times(&self) -> &[f64] {
        &self.time
    }
}

impl FromIterator<SpikeEvent> for Raster {
    fn from_iter<I: IntoIterator<Item = SpikeEvent>>(iter: I) -> Self {
        let mut raster = Raster::new();
        for event in iter {
            raster.push(event);
        }
        raster
    }
}

/// Fields that can be removed from a record or cleaned up to nodes of Ranvier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Time,
    Voltage,
    VoltageFiltered,
    Raster(RasterPrefix),
    NodeIndex,
    Coordinates,
    RecordedCoordinates,
    IntraStimStarts,
    IntraStimPositions,
}

impl RecordField {
    pub const fn key(self) -> &'static str {
        match self {
            RecordField::Time => "t",
            RecordField::Voltage => "V_mem",
            RecordField::VoltageFiltered => "V_mem_filtered",
            RecordField::Raster(prefix) => prefix.key(),
            RecordField::NodeIndex => "node_index",
            RecordField::Coordinates => "x",
            RecordField::RecordedCoordinates => "x_rec",
            RecordField::IntraStimStarts => "intra_stim_starts",
            RecordField::IntraStimPositions => "intra_stim_positions",
        }
    }
}

/// Results of a single axon simulation.
///
/// Keys the analysis does not model are kept in `extra` and written back on
/// save, so a load/save cycle never drops simulator output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "wire::RecordWire")]
pub struct SimulationRecord {
    /// Sample times, in ms.
    pub t: Option<Vec<f64>>,
    /// Sample interval in ms; `0` means a variable-step solve.
    pub dt: f64,
    /// Nominal simulation end, in ms.
    pub tstop: f64,
    /// Membrane voltage (`V_mem`), rows = positions, columns = samples.
    pub voltage: Option<Array2<f64>>,
    /// Notch-filtered membrane voltage (`V_mem_filtered`).
    pub voltage_filtered: Option<Array2<f64>>,
    /// Fiber detection threshold, in mV.
    pub threshold: Option<f64>,
    pub myelinated: bool,
    pub rec: RecordingMode,
    pub node_index: Option<Vec<u32>>,
    /// Coordinates of every computational segment, in um.
    pub x: Option<Vec<f64>>,
    /// Coordinates of the recorded positions, in um.
    pub x_rec: Option<Vec<f64>>,
    pub intra_stim_starts: Option<Vec<f64>>,
    pub intra_stim_positions: Option<Vec<f64>>,
    pub extracellular_electrode_x: Option<f64>,
    /// Fiber length (`L`), in um.
    pub length: Option<f64>,
    /// Raster of `V_mem`, stored under the `V_mem_raster_*` keys.
    pub raster: Option<Raster>,
    /// Raster of `V_mem_filtered`, stored under the `V_mem_filtered_raster_*` keys.
    pub filtered_raster: Option<Raster>,
    /// Simulator keys not modelled above.
    pub extra: Map<String, Value>,
}

impl SimulationRecord {
    /// Empty record with the given time base.
    pub fn new(dt: f64, tstop: f64) -> Self {
        Self {
            dt,
            tstop,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn time(&self) -> Result<&[f64]> {
        self.t.as_deref().ok_or(RasterError::MissingField("t"))
    }

    /// Voltage matrix a raster of `prefix` is computed from.
    pub fn voltage(&self, prefix: RasterPrefix) -> Result<&Array2<f64>> {
        let matrix = match prefix {
            RasterPrefix::Raw => self.voltage.as_ref(),
            RasterPrefix::Filtered => self.voltage_filtered.as_ref(),
        };
        matrix.ok_or(RasterError::MissingField(prefix.source_key()))
    }

    pub fn raster(&self, prefix: RasterPrefix) -> Option<&Raster> {
        match prefix {
            RasterPrefix::Raw => self.raster.as_ref(),
            RasterPrefix::Filtered => self.filtered_raster.as_ref(),
        }
    }

    /// Replaces the raster stored under `prefix` as a whole.
    pub fn set_raster(&mut self, prefix: RasterPrefix, raster: Raster) {
        match prefix {
            RasterPrefix::Raw => self.raster = Some(raster),
            RasterPrefix::Filtered => self.filtered_raster = Some(raster),
        }
    }

    /// Picks the raster a query should read.
    ///
    /// An explicit prefix wins; otherwise the filtered raster is preferred
    /// over the raw one. `None` means nothing has been rasterized.
    pub fn select_raster(&self, prefix: Option<RasterPrefix>) -> Option<(RasterPrefix, &Raster)> {
        match prefix {
            Some(p) => self.raster(p).map(|r| (p, r)),
            None => [RasterPrefix::Filtered, RasterPrefix::Raw]
                .into_iter()
                .find_map(|p| self.raster(p).map(|r| (p, r))),
        }
    }

    /// First intracellular stimulation start, if any.
    pub fn first_stim_start(&self) -> Option<f64> {
        self.intra_stim_starts.as_ref()?.first().copied()
    }

    /// Deletes a field, typically to shrink the record before it is saved.
    pub fn remove_field(&mut self, field: RecordField) {
        let removed = match field {
            RecordField::Time => self.t.take().is_some(),
            RecordField::Voltage => self.voltage.take().is_some(),
            RecordField::VoltageFiltered => self.voltage_filtered.take().is_some(),
            RecordField::Raster(RasterPrefix::Raw) => self.raster.take().is_some(),
            RecordField::Raster(RasterPrefix::Filtered) => self.filtered_raster.take().is_some(),
            RecordField::NodeIndex => self.node_index.take().is_some(),
            RecordField::Coordinates => self.x.take().is_some(),
            RecordField::RecordedCoordinates => self.x_rec.take().is_some(),
            RecordField::IntraStimStarts => self.intra_stim_starts.take().is_some(),
            RecordField::IntraStimPositions => self.intra_stim_positions.take().is_some(),
        };
        if removed {
            info!(key = field.key(), "removed field from simulation record");
        }
    }

    /// Keeps only the node-of-Ranvier rows of a voltage field.
    ///
    /// Only meaningful for membrane voltages of myelinated fibers; any other
    /// request is logged and left untouched.
    ///
    /// # Errors
    /// `MissingField` when the voltage field or `node_index` is absent,
    /// `IndexOutOfRange` when a node index exceeds the matrix.
    pub fn keep_nodes_of_ranvier(&mut self, field: RecordField) -> Result<()> {
        let prefix = match field {
            RecordField::Voltage => RasterPrefix::Raw,
            RecordField::VoltageFiltered => RasterPrefix::Filtered,
            other => {
                warn!(
                    key = other.key(),
                    "node-of-Ranvier cleanup only applies to membrane voltage"
                );
                return Ok(());
            }
        };
        if !self.myelinated {
            warn!("node-of-Ranvier cleanup only applies to myelinated axons");
            return Ok(());
        }

        let nodes = self
            .node_index
            .as_ref()
            .ok_or(RasterError::MissingField("node_index"))?;
        let matrix = self.voltage(prefix)?;
        let rows = matrix.nrows();
        let indices = nodes
            .iter()
            .map(|&n| {
                let n = n as usize;
                if n < rows {
                    Ok(n)
                } else {
                    Err(RasterError::IndexOutOfRange {
                        what: "node",
                        index: n,
                        len: rows,
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let kept = matrix.select(Axis(0), &indices);

        match prefix {
            RasterPrefix::Raw => self.voltage = Some(kept),
            RasterPrefix::Filtered => self.voltage_filtered = Some(kept),
        }
        info!(key = field.key(), nodes = indices.len(), "kept node-of-Ranvier rows");
        Ok(())
    }
}

impl Serialize for SimulationRecord {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(None)?;
        if let Some(t) = &self.t {
            map.serialize_entry("t", t)?;
        }
        map.serialize_entry("dt", &self.dt)?;
        map.serialize_entry("tstop", &self.tstop)?;
        if let Some(v) = &self.voltage {
            map.serialize_entry("V_mem", &wire::MatrixRows(v))?;
        }
        if let Some(v) = &self.voltage_filtered {
            map.serialize_entry("V_mem_filtered", &wire::MatrixRows(v))?;
        }
        if let Some(threshold) = &self.threshold {
            map.serialize_entry("threshold", threshold)?;
        }
        map.serialize_entry("myelinated", &self.myelinated)?;
        map.serialize_entry("rec", &self.rec)?;
        if let Some(nodes) = &self.node_index {
            map.serialize_entry("node_index", nodes)?;
        }
        if let Some(x) = &self.x {
            map.serialize_entry("x", x)?;
        }
        if let Some(x_rec) = &self.x_rec {
            map.serialize_entry("x_rec", x_rec)?;
        }
        if let Some(starts) = &self.intra_stim_starts {
            map.serialize_entry("intra_stim_starts", starts)?;
        }
        if let Some(positions) = &self.intra_stim_positions {
            map.serialize_entry("intra_stim_positions", positions)?;
        }
        if let Some(electrode) = &self.extracellular_electrode_x {
            map.serialize_entry("extracellular_electrode_x", electrode)?;
        }
        if let Some(length) = &self.length {
            map.serialize_entry("L", length)?;
        }
        for prefix in [RasterPrefix::Raw, RasterPrefix::Filtered] {
            if let Some(raster) = self.raster(prefix) {
                let key = prefix.key();
                map.serialize_entry(&format!("{}_position", key), &raster.position)?;
                map.serialize_entry(&format!("{}_x_position", key), &raster.x_position)?;
                map.serialize_entry(&format!("{}_time_index", key), &raster.time_index)?;
                map.serialize_entry(&format!("{}_time", key), &raster.time)?;
            }
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// On-disk layout of a record: matrices as nested row arrays, rasters as four
/// flat keys per prefix, everything else collected as-is.
mod wire {
    use ndarray::Array2;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::{Map, Value};

    use super::{Raster, RasterPrefix, RecordingMode, SimulationRecord};
    use crate::error::RasterError;

    pub(super) struct MatrixRows<'a>(pub &'a Array2<f64>);

    impl Serialize for MatrixRows<'_> {
        fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
            s.collect_seq(self.0.rows().into_iter().map(|r| r.to_vec()))
        }
    }

    fn matrix_rows<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<Array2<f64>>, D::Error> {
        let rows: Option<Vec<Vec<f64>>> = Option::deserialize(d)?;
        rows.map(|rows| {
            let n_rows = rows.len();
            let n_cols = rows.first().map_or(0, Vec::len);
            if rows.iter().any(|r| r.len() != n_cols) {
                return Err(D::Error::custom("voltage matrix rows have unequal lengths"));
            }
            let data: Vec<f64> = rows.into_iter().flatten().collect();
            Array2::from_shape_vec((n_rows, n_cols), data).map_err(D::Error::custom)
        })
        .transpose()
    }

    #[derive(Deserialize)]
    pub(super) struct RecordWire {
        #[serde(default)]
        t: Option<Vec<f64>>,
        dt: f64,
        tstop: f64,
        #[serde(rename = "V_mem", default, deserialize_with = "matrix_rows")]
        voltage: Option<Array2<f64>>,
        #[serde(rename = "V_mem_filtered", default, deserialize_with = "matrix_rows")]
        voltage_filtered: Option<Array2<f64>>,
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default)]
        myelinated: bool,
        #[serde(default)]
        rec: RecordingMode,
        #[serde(default)]
        node_index: Option<Vec<u32>>,
        #[serde(default)]
        x: Option<Vec<f64>>,
        #[serde(default)]
        x_rec: Option<Vec<f64>>,
        #[serde(default)]
        intra_stim_starts: Option<Vec<f64>>,
        #[serde(default)]
        intra_stim_positions: Option<Vec<f64>>,
        #[serde(default)]
        extracellular_electrode_x: Option<f64>,
        #[serde(rename = "L", default)]
        length: Option<f64>,
        #[serde(rename = "V_mem_raster_position", default)]
        raw_position: Option<Vec<u32>>,
        #[serde(rename = "V_mem_raster_x_position", default)]
        raw_x_position: Option<Vec<f64>>,
        #[serde(rename = "V_mem_raster_time_index", default)]
        raw_time_index: Option<Vec<u32>>,
        #[serde(rename = "V_mem_raster_time", default)]
        raw_time: Option<Vec<f64>>,
        #[serde(rename = "V_mem_filtered_raster_position", default)]
        filtered_position: Option<Vec<u32>>,
        #[serde(rename = "V_mem_filtered_raster_x_position", default)]
        filtered_x_position: Option<Vec<f64>>,
        #[serde(rename = "V_mem_filtered_raster_time_index", default)]
        filtered_time_index: Option<Vec<u32>>,
        #[serde(rename = "V_mem_filtered_raster_time", default)]
        filtered_time: Option<Vec<f64>>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    }

    /// All four sequences or none; a partial key set is malformed.
    fn raster(
        prefix: RasterPrefix,
        position: Option<Vec<u32>>,
        x_position: Option<Vec<f64>>,
        time_index: Option<Vec<u32>>,
        time: Option<Vec<f64>>,
    ) -> Result<Option<Raster>, RasterError> {
        match (position, x_position, time_index, time) {
            (None, None, None, None) => Ok(None),
            (Some(position), Some(x_position), Some(time_index), Some(time)) => {
                Raster::from_columns(position, x_position, time_index, time).map(Some)
            }
            _ => Err(RasterError::ShapeMismatch(format!(
                "{} is missing some of its four sequences",
                prefix.key()
            ))),
        }
    }

    impl TryFrom<RecordWire> for SimulationRecord {
        type Error = RasterError;

        fn try_from(w: RecordWire) -> Result<Self, RasterError> {
            Ok(Self {
                raster: raster(
                    RasterPrefix::Raw,
                    w.raw_position,
                    w.raw_x_position,
                    w.raw_time_index,
                    w.raw_time,
                )?,
                filtered_raster: raster(
                    RasterPrefix::Filtered,
                    w.filtered_position,
                    w.filtered_x_position,
                    w.filtered_time_index,
                    w.filtered_time,
                )?,
                t: w.t,
                dt: w.dt,
                tstop: w.tstop,
                voltage: w.voltage,
                voltage_filtered: w.voltage_filtered,
                threshold: w.threshold,
                myelinated: w.myelinated,
                rec: w.rec,
                node_index: w.node_index,
                x: w.x,
                x_rec: w.x_rec,
                intra_stim_starts: w.intra_stim_starts,
                intra_stim_positions: w.intra_stim_positions,
                extracellular_electrode_x: w.extracellular_electrode_x,
                length: w.length,
                extra: w.extra,
            })
        }
    }
}

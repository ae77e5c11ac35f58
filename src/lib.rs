//! Spike extraction and conduction analysis for simulated axon recordings.
//!
//! A [`SimulationRecord`] holds the membrane-voltage matrix produced by a
//! nerve-fiber simulation. The analysis runs in two stages:
//!
//! 1. [`filter_voltage`] (optional) notches stimulation artifacts out of the
//!    voltage, and [`rasterize`] turns a voltage matrix into a [`Raster`] of
//!    threshold-crossing spike onsets stored back into the record.
//! 2. Queries read the stored rasters: [`find_spike_origin`],
//!    [`find_spike_last_occurrence`], [`conduction_velocity`] and
//!    [`detect_block`].
//!
//! # Example
//! ```
//! use axonraster::{
//!     conduction_velocity, find_spike_origin, rasterize, DetectionParams, RasterPrefix,
//!     SimulationRecord, Window,
//! };
//! use ndarray::Array2;
//!
//! let dt = 0.01;
//! let mut record = SimulationRecord::new(dt, 10.0);
//! record.t = Some((0..1000).map(|j| j as f64 * dt).collect());
//! record.x_rec = Some(vec![0.0, 1000.0, 2000.0]);
//! record.threshold = Some(0.0);
//! // rows 0..3 cross 0 mV at samples 100, 150, 200
//! record.voltage = Some(Array2::from_shape_fn((3, 1000), |(i, j)| {
//!     let onset = 100 + 50 * i;
//!     if j > onset && j <= onset + 50 { 30.0 } else { -70.0 }
//! }));
//!
//! let spikes = rasterize(&mut record, RasterPrefix::Raw, &DetectionParams::default()).unwrap();
//! assert_eq!(spikes, 3);
//!
//! let origin = find_spike_origin(&record, None, &Window::full()).unwrap();
//! assert_eq!(origin.x_positions(), vec![0.0]);
//! assert!(conduction_velocity(&record, None, &Window::full()).speed().unwrap() > 0.0);
//! ```

pub mod conduction;
pub mod config;
pub mod counter;
pub mod detector;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod notch;
pub mod query;
pub mod record;

pub use conduction::{conduction_velocity, detect_block, BlockState, Velocity};
pub use config::{load_config, AnalysisConfig, DetectionConfig, NotchConfig};
pub use counter::count_spikes;
pub use detector::{rasterize, DetectionParams, ExecutionMode, SpikeDetector};
pub use error::{RasterError, Result};
pub use filter::{BiquadCoeffs, IirFilter};
pub use geometry::{distance_point_to_line, ScanGeometry, ScanRows};
pub use notch::{filter_voltage, NotchFilter};
pub use query::{
    find_spike_last_occurrence, find_spike_origin, Direction, Extremum, LastOccurrence, Window,
};
pub use record::{Raster, RasterPrefix, RecordField, RecordingMode, SimulationRecord, SpikeEvent};

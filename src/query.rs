//! Where and when a spike train starts, and how far it gets.
//!
//! Queries only read rasters already stored in the record; they never run
//! detection. A query on a record with no usable raster returns `None`,
//! which is distinct from any spike found.

use crate::record::{Raster, RasterPrefix, SimulationRecord, SpikeEvent};

/// Time and coordinate restriction of a query.
///
/// Time bounds are exclusive. An unset (or zero) `t_start` means 0 for the
/// spike-train queries and the first stimulation start for the conduction
/// queries; an unset (or zero) `t_stop` means the record's `tstop`. Unset
/// coordinate bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Window {
    pub t_start: Option<f64>,
    pub t_stop: Option<f64>,
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
}

impl Window {
    /// Whole simulation, whole fiber.
    pub fn full() -> Self {
        Self::default()
    }

    /// Restricts to `t_start < t < t_stop`.
    pub fn between(t_start: f64, t_stop: f64) -> Self {
        Self {
            t_start: Some(t_start),
            t_stop: Some(t_stop),
            ..Self::default()
        }
    }

    /// Adds coordinate bounds to the window.
    pub fn with_x(mut self, x_min: Option<f64>, x_max: Option<f64>) -> Self {
        self.x_min = x_min;
        self.x_max = x_max;
        self
    }

    pub(crate) fn stop(&self, record: &SimulationRecord) -> f64 {
        self.t_stop.filter(|&t| t != 0.0).unwrap_or(record.tstop)
    }

    pub(crate) fn contains_time(t_start: f64, t_stop: f64, event: &SpikeEvent) -> bool {
        event.time > t_start && event.time < t_stop
    }
}

/// Events sharing the earliest (or latest) time of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Extremum {
    pub time: f64,
    /// Every event at `time`, in raster order.
    pub events: Vec<SpikeEvent>,
}

impl Extremum {
    pub fn x_positions(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.x_position).collect()
    }

    fn min_x(&self) -> f64 {
        self.events.iter().map(|e| e.x_position).fold(f64::INFINITY, f64::min)
    }

    fn max_x(&self) -> f64 {
        self.events
            .iter()
            .map(|e| e.x_position)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Direction of propagation from the starting coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards increasing coordinates.
    Up,
    /// Towards decreasing coordinates.
    Down,
    /// Both ways; the result pairs the lower and upper extrema.
    Both,
}

/// Last occurrences on each side of the starting coordinate.
///
/// Only the side(s) asked for are filled; a side without any event in the
/// window is `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LastOccurrence {
    /// Latest events below the starting coordinate.
    pub lower: Option<Extremum>,
    /// Latest events above the starting coordinate.
    pub upper: Option<Extremum>,
}

fn extreme(events: impl Iterator<Item = SpikeEvent>, latest: bool) -> Option<Extremum> {
    let mut best: Option<Extremum> = None;
    for event in events {
        let replace = match &best {
            None => true,
            Some(b) if latest => event.time > b.time,
            Some(b) => event.time < b.time,
        };
        if replace {
            best = Some(Extremum {
                time: event.time,
                events: vec![event],
            });
        } else if let Some(b) = best.as_mut() {
            if event.time == b.time {
                b.events.push(event);
            }
        }
    }
    best
}

/// Earliest events of `raster` inside the window.
pub fn earliest_in(raster: &Raster, t_start: f64, t_stop: f64, window: &Window) -> Option<Extremum> {
    extreme(
        raster.iter().filter(|e| {
            Window::contains_time(t_start, t_stop, e)
                && window.x_min.map_or(true, |lo| e.x_position > lo)
                && window.x_max.map_or(true, |hi| e.x_position < hi)
        }),
        false,
    )
}

/// Finds where and when a spike train starts.
///
/// Returns every event at the earliest time strictly inside the window and
/// strictly inside the coordinate bounds. `None` when no raster is stored or
/// no event qualifies.
///
/// `prefix` selects a raster explicitly; otherwise the filtered raster is
/// preferred over the raw one.
pub fn find_spike_origin(
    record: &SimulationRecord,
    prefix: Option<RasterPrefix>,
    window: &Window,
) -> Option<Extremum> {
    let (_, raster) = record.select_raster(prefix)?;
    earliest_in(
        raster,
        window.t_start.unwrap_or(0.0),
        window.stop(record),
        window,
    )
}

/// Finds the latest spike on one or both sides of `x_start`.
///
/// When `x_start` is unset (or zero) the origin of the train in the window
/// is used instead, and the scan starts at the origin time. With tied origin
/// events the lower side is taken below all of them and the upper side above
/// all of them. Coordinate bounds of `window` are not used.
pub fn find_spike_last_occurrence(
    record: &SimulationRecord,
    prefix: Option<RasterPrefix>,
    window: &Window,
    direction: Direction,
    x_start: Option<f64>,
) -> Option<LastOccurrence> {
    let (prefix, raster) = record.select_raster(prefix)?;
    let t_stop = window.stop(record);
    let mut t_start = window.t_start.unwrap_or(0.0);

    let (below, above) = match x_start.filter(|&x| x != 0.0) {
        Some(x) => (x, x),
        None => {
            let origin = find_spike_origin(
                record,
                Some(prefix),
                &Window {
                    t_start: Some(t_start),
                    t_stop: Some(t_stop),
                    ..Window::default()
                },
            )?;
            t_start = origin.time;
            (origin.min_x(), origin.max_x())
        }
    };

    let in_time = |e: &SpikeEvent| Window::contains_time(t_start, t_stop, e);
    let lower = matches!(direction, Direction::Down | Direction::Both)
        .then(|| extreme(raster.iter().filter(|e| in_time(e) && e.x_position < below), true))
        .flatten();
    let upper = matches!(direction, Direction::Up | Direction::Both)
        .then(|| extreme(raster.iter().filter(|e| in_time(e) && e.x_position > above), true))
        .flatten();

    Some(LastOccurrence { lower, upper })
}

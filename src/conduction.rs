//! Conduction velocity and conduction block from stored rasters.

use crate::query::Window;
use crate::record::{RasterPrefix, SimulationRecord, SpikeEvent};

/// Outcome of a velocity estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Velocity {
    /// No raster is stored in the record.
    NoData,
    /// Fewer than two distinct spike times in the window.
    InsufficientData,
    /// Signed velocity in m/s; positive towards increasing coordinates.
    Speed(f64),
}

impl Velocity {
    pub fn speed(self) -> Option<f64> {
        match self {
            Velocity::Speed(v) => Some(v),
            _ => None,
        }
    }
}

/// Conduction state of the fiber for the test spike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// No raster, or an empty one.
    NoData,
    /// The test spike was not seen in the window, or the stimulation and
    /// electrode layout is unknown.
    Indeterminate,
    Blocked,
    NotBlocked,
}

impl BlockState {
    /// `Some(true)` when blocked, `Some(false)` when conducting.
    pub fn is_blocked(self) -> Option<bool> {
        match self {
            BlockState::Blocked => Some(true),
            BlockState::NotBlocked => Some(false),
            BlockState::NoData | BlockState::Indeterminate => None,
        }
    }
}

/// Start of the analysis window: explicit and non-zero, else the first
/// intracellular stimulation, else 0.
fn stim_aligned_start(record: &SimulationRecord, window: &Window) -> f64 {
    window
        .t_start
        .filter(|&t| t != 0.0)
        .or_else(|| record.first_stim_start())
        .unwrap_or(0.0)
}

/// Estimates the conduction velocity between the first and last spike.
///
/// Events must lie strictly inside the time window and inside the inclusive
/// coordinate window. Velocity is `(x_last - x_first) * 1e-3 / (t_last - t_first)`
/// with x in um and t in ms. Only the two extreme events are used, so a
/// window containing several trains or a varying speed gives an average.
pub fn conduction_velocity(
    record: &SimulationRecord,
    prefix: Option<RasterPrefix>,
    window: &Window,
) -> Velocity {
    let Some((_, raster)) = record.select_raster(prefix) else {
        return Velocity::NoData;
    };
    let t_start = stim_aligned_start(record, window);
    let t_stop = window.stop(record);

    let mut first: Option<SpikeEvent> = None;
    let mut last: Option<SpikeEvent> = None;
    for event in raster.iter().filter(|e| {
        Window::contains_time(t_start, t_stop, e)
            && window.x_min.map_or(true, |lo| e.x_position >= lo)
            && window.x_max.map_or(true, |hi| e.x_position <= hi)
    }) {
        if first.map_or(true, |f| event.time < f.time) {
            first = Some(event);
        }
        if last.map_or(true, |l| event.time > l.time) {
            last = Some(event);
        }
    }

    match (first, last) {
        (Some(first), Some(last)) if last.time > first.time => Velocity::Speed(
            (last.x_position - first.x_position) * 1e-3 / (last.time - first.time),
        ),
        _ => Velocity::InsufficientData,
    }
}

/// Checks whether the test spike crossed the fiber.
///
/// With the stimulation proximal to the electrode the fiber is blocked when
/// no spike in the window reaches 9/10 of the fiber length; with a distal
/// stimulation it is blocked when none reaches below 1/10 of it.
pub fn detect_block(
    record: &SimulationRecord,
    prefix: Option<RasterPrefix>,
    window: &Window,
) -> BlockState {
    let Some((_, raster)) = record.select_raster(prefix) else {
        return BlockState::NoData;
    };
    if raster.is_empty() {
        return BlockState::NoData;
    }
    let t_start = stim_aligned_start(record, window);
    let t_stop = window.stop(record);

    let Some((lowest, highest)) = raster
        .iter()
        .filter(|e| Window::contains_time(t_start, t_stop, e))
        .fold(None, |acc: Option<(f64, f64)>, e| {
            let x = e.x_position;
            Some(acc.map_or((x, x), |(lo, hi)| (lo.min(x), hi.max(x))))
        })
    else {
        return BlockState::Indeterminate;
    };

    let stim = record
        .intra_stim_positions
        .as_ref()
        .and_then(|p| p.first().copied());
    let (Some(stim), Some(electrode), Some(length)) =
        (stim, record.extracellular_electrode_x, record.length)
    else {
        return BlockState::Indeterminate;
    };

    let blocked = if stim < electrode {
        highest < 0.9 * length
    } else {
        lowest > 0.1 * length
    };
    if blocked {
        BlockState::Blocked
    } else {
        BlockState::NotBlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Raster;

    const L: f64 = 10_000.0;

    fn event(x: f64, time: f64) -> SpikeEvent {
        SpikeEvent {
            position: (x / 1000.0) as usize,
            x_position: x,
            time_index: (time * 100.0).round() as usize,
            time,
        }
    }

    /// Front from `x_from` to `x_to`, one event per 1000 um, starting at 1 ms.
    fn front_record(x_from: f64, x_to: f64, ms_per_mm: f64) -> SimulationRecord {
        let mut record = SimulationRecord::new(0.01, 20.0);
        let steps = ((x_to - x_from).abs() / 1000.0) as usize;
        let sign = if x_to >= x_from { 1.0 } else { -1.0 };
        let raster = (0..=steps)
            .map(|k| event(x_from + sign * 1000.0 * k as f64, 1.0 + ms_per_mm * k as f64))
            .collect::<Raster>();
        record.set_raster(RasterPrefix::Raw, raster);
        record.length = Some(L);
        record
    }

    #[test]
    fn test_velocity_sign_follows_direction() {
        // 1 mm every 0.2 ms -> 5 m/s
        let up = front_record(0.0, L, 0.2);
        let v = conduction_velocity(&up, None, &Window::full()).speed().unwrap();
        assert!((v - 5.0).abs() < 1e-9, "got {}", v);

        let down = front_record(L, 0.0, 0.2);
        let v = conduction_velocity(&down, None, &Window::full()).speed().unwrap();
        assert!((v + 5.0).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_velocity_window_is_intersection() {
        let record = front_record(0.0, L, 0.2);
        // time window keeps 1.0..=2.0 ms (x 0..=5000), coordinate window 2000..=8000
        let window = Window::between(0.5, 2.1).with_x(Some(2000.0), Some(8000.0));
        let v = conduction_velocity(&record, None, &window).speed().unwrap();
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_uses_stimulation_start() {
        let mut record = front_record(0.0, L, 0.2);
        // only the first two events precede the stimulation start
        record.intra_stim_starts = Some(vec![1.3]);
        let after_stim = record.raster.as_ref().unwrap().iter().filter(|e| e.time > 1.3).count();
        assert_eq!(after_stim, 9);

        let v = conduction_velocity(&record, None, &Window::full()).speed().unwrap();
        assert!((v - 5.0).abs() < 1e-9);

        // a zero start is unset and still defers to the stimulation
        assert_eq!(
            conduction_velocity(&record, None, &Window::between(0.0, 20.0)),
            conduction_velocity(&record, None, &Window::full())
        );
        let early = Window::between(0.9, 1.3);
        assert_eq!(
            conduction_velocity(&record, None, &early),
            Velocity::Speed((1000.0 - 0.0) * 1e-3 / (1.2 - 1.0))
        );

        // the stimulation start leaves a single event in a short window
        let window = Window {
            t_stop: Some(1.5),
            ..Window::default()
        };
        assert_eq!(
            conduction_velocity(&record, None, &window),
            Velocity::InsufficientData
        );
    }

    #[test]
    fn test_velocity_degenerate() {
        let record = SimulationRecord::new(0.01, 10.0);
        assert_eq!(conduction_velocity(&record, None, &Window::full()), Velocity::NoData);

        let mut record = SimulationRecord::new(0.01, 10.0);
        record.set_raster(
            RasterPrefix::Raw,
            Raster::from_iter([event(1000.0, 2.0), event(3000.0, 2.0)]),
        );
        assert_eq!(
            conduction_velocity(&record, None, &Window::full()),
            Velocity::InsufficientData
        );

        record.set_raster(RasterPrefix::Raw, Raster::new());
        assert_eq!(
            conduction_velocity(&record, None, &Window::full()),
            Velocity::InsufficientData
        );
    }

    fn block_record(x_max: f64, stim: f64, electrode: f64) -> SimulationRecord {
        let mut record = front_record(0.0, x_max, 0.2);
        record.intra_stim_positions = Some(vec![stim]);
        record.intra_stim_starts = Some(vec![0.5]);
        record.extracellular_electrode_x = Some(electrode);
        record
    }

    #[test]
    fn test_block_proximal_stimulation() {
        let blocked = block_record(6000.0, 0.0, 5000.0);
        assert_eq!(detect_block(&blocked, None, &Window::full()), BlockState::Blocked);

        let conducting = block_record(L, 0.0, 5000.0);
        assert_eq!(
            detect_block(&conducting, None, &Window::full()),
            BlockState::NotBlocked
        );
    }

    #[test]
    fn test_block_distal_stimulation() {
        // spikes from the far end travelling down
        let mut record = front_record(L, 3000.0, 0.2);
        record.intra_stim_positions = Some(vec![L]);
        record.extracellular_electrode_x = Some(5000.0);
        assert_eq!(detect_block(&record, None, &Window::full()), BlockState::Blocked);

        let mut record = front_record(L, 0.0, 0.2);
        record.intra_stim_positions = Some(vec![L]);
        record.extracellular_electrode_x = Some(5000.0);
        assert_eq!(
            detect_block(&record, None, &Window::full()),
            BlockState::NotBlocked
        );
    }

    #[test]
    fn test_block_no_data_and_indeterminate() {
        let record = SimulationRecord::new(0.01, 10.0);
        assert_eq!(detect_block(&record, None, &Window::full()), BlockState::NoData);

        let mut empty = block_record(L, 0.0, 5000.0);
        empty.set_raster(RasterPrefix::Raw, Raster::new());
        assert_eq!(detect_block(&empty, None, &Window::full()), BlockState::NoData);

        // every spike precedes the window
        let late = block_record(L, 0.0, 5000.0);
        assert_eq!(
            detect_block(&late, None, &Window::between(15.0, 20.0)),
            BlockState::Indeterminate
        );

        let mut unknown_layout = block_record(L, 0.0, 5000.0);
        unknown_layout.extracellular_electrode_x = None;
        assert_eq!(
            detect_block(&unknown_layout, None, &Window::full()),
            BlockState::Indeterminate
        );
        assert_eq!(BlockState::Indeterminate.is_blocked(), None);
        assert_eq!(BlockState::Blocked.is_blocked(), Some(true));
    }
}

use crate::config::Extremum;
use crate::detectors::peaks::window_extremum;
use crate::error::Result;
use crate::signal::{Events, Signal};

/// Re-anchor each event to a local extremum of the raw signal.
///
/// The `[index - radius, index + radius)` window is searched repeatedly,
/// recentred on the best sample each time, until the index stops moving.
/// The result is therefore a fixed point and a second pass is a no-op.
/// Event count and order are preserved as long as neighbouring events
/// sit on distinct extrema.
pub fn correct_peaks(
    raw: &Signal,
    events: &Events,
    radius_s: f64,
    extremum: Extremum,
) -> Result<Events> {
    let radius = raw.samples_for(radius_s) as isize;
    let mut moved = 0usize;
    let indices = events
        .indices
        .iter()
        .map(|&p| {
            let local = climb(&raw.data, p, radius, extremum)?;
            if local != p {
                moved += 1;
            }
            Ok(local)
        })
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "{}: corrected {} of {} events within ±{} samples",
        raw.name,
        moved,
        indices.len(),
        radius
    );
    Ok(Events::from_indices(indices))
}

/// Each step lands on a strictly better sample or an equal one further
/// left, so the walk ends within `data.len()` steps.
fn climb(data: &[f64], start: usize, radius: isize, extremum: Extremum) -> Result<usize> {
    let mut current = start;
    for _ in 0..=data.len() {
        let centre = current as isize;
        let next = window_extremum(data, centre - radius, centre + radius, extremum)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn spiky(len: usize, centres: &[usize]) -> Signal {
        let data = (0..len)
            .map(|i| {
                centres
                    .iter()
                    .map(|&c| (-0.5 * ((i as f64 - c as f64) / 4.0).powi(2)).exp())
                    .sum()
            })
            .collect();
        Signal::new("raw", 1000, data)
    }

    #[test]
    fn snaps_to_raw_maximum() {
        let raw = spiky(3000, &[500, 1300, 2100]);
        let detected = Events::from_indices(vec![520, 1290, 2100]);
        let corrected = correct_peaks(&raw, &detected, 0.07, Extremum::Max).expect("correct");
        assert_eq!(corrected.indices, vec![500, 1300, 2100]);
    }

    #[test]
    fn correction_is_idempotent() {
        let raw = spiky(3000, &[500, 1300, 2100]);
        let detected = Events::from_indices(vec![450, 1340, 2060]);
        let once = correct_peaks(&raw, &detected, 0.07, Extremum::Max).expect("correct");
        let twice = correct_peaks(&raw, &once, 0.07, Extremum::Max).expect("correct");
        assert_eq!(once, twice);
        assert_eq!(once.len(), detected.len());
    }

    #[test]
    fn follows_slope_to_maximum_beyond_first_window() {
        let data = (0..500).map(|i| -((i as f64 - 250.0) / 100.0).powi(2)).collect();
        let raw = Signal::new("raw", 1000, data);
        let detected = Events::from_indices(vec![100]);
        let once = correct_peaks(&raw, &detected, 0.07, Extremum::Max).expect("correct");
        assert_eq!(once.indices, vec![250]);
        let twice = correct_peaks(&raw, &once, 0.07, Extremum::Max).expect("correct");
        assert_eq!(once, twice);
    }

    #[test]
    fn minimum_correction_descends_to_trough() {
        let data = (0..400).map(|i| ((i as f64 - 300.0) / 50.0).powi(2)).collect();
        let raw = Signal::new("raw", 1000, data);
        let detected = Events::from_indices(vec![120]);
        let corrected = correct_peaks(&raw, &detected, 0.02, Extremum::Min).expect("correct");
        assert_eq!(corrected.indices, vec![300]);
    }

    #[test]
    fn window_is_clipped_at_signal_edges() {
        let raw = spiky(200, &[5, 195]);
        let detected = Events::from_indices(vec![0, 199]);
        let corrected = correct_peaks(&raw, &detected, 0.07, Extremum::Max).expect("correct");
        assert_eq!(corrected.indices, vec![5, 195]);
    }

    #[test]
    fn event_outside_signal_is_empty_window() {
        let raw = spiky(100, &[50]);
        let detected = Events::from_indices(vec![500]);
        assert!(matches!(
            correct_peaks(&raw, &detected, 0.07, Extremum::Max),
            Err(PipelineError::EmptyWindow { .. })
        ));
    }
}

/// Counts spikes from the onset positions of the detected trains.
///
/// Every train is expected to start at the same minimal coordinate; each
/// pair of consecutive onsets both sitting at that minimum adds one spike to
/// the first. Onsets elsewhere do not count, so trains starting at different
/// positions are not told apart.
///
/// # Example
/// ```
/// use axonraster::count_spikes;
///
/// assert_eq!(count_spikes(&[]), 0);
/// assert_eq!(count_spikes(&[0.0, 0.0, 0.0]), 3);
/// assert_eq!(count_spikes(&[0.0, 500.0, 0.0]), 1);
/// ```
pub fn count_spikes(onset_positions: &[f64]) -> usize {
    if onset_positions.is_empty() {
        return 0;
    }
    let min = onset_positions.iter().copied().fold(f64::INFINITY, f64::min);

    1 + onset_positions
        .windows(2)
        .filter(|pair| pair[0] == min && pair[1] == pair[0])
        .count()
}

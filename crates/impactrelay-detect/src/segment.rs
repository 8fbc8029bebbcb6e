use std::ops::{Range, RangeInclusive};

use tracing::trace;

/// Default amplitude threshold.
pub const DEFAULT_THRESHOLD: i64 = 150_000_000;

/// Windows closer than this many samples are merged.
pub const DEFAULT_MIN_GAP: usize = 1000;

/// An inclusive index range `[start, end]` into a sample array.
///
/// `start` is the first sample above the threshold, `end` the last one
/// before the signal falls back below it. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventWindow {
    pub start: usize,
    pub end: usize,
}

impl EventWindow {
    /// Create a window. `end` is clamped up to `start`.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of samples covered, `end - start + 1`.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The covered indices.
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// The covered samples, clipped to `samples`.
    pub fn slice<'a, T>(&self, samples: &'a [T]) -> &'a [T] {
        let end = (self.end + 1).min(samples.len());
        let start = self.start.min(end);
        &samples[start..end]
    }
}

/// Subtract the first sample from every sample.
///
/// Cheap DC-offset removal: the baseline is the first sample, not the mean.
/// Widens to `i64` so the difference of two `i32` values never overflows.
pub fn remove_baseline(samples: &[i32]) -> Vec<i64> {
    let Some(&first) = samples.first() else {
        return Vec::new();
    };
    let baseline = i64::from(first);
    samples
        .iter()
        .map(|&sample| i64::from(sample) - baseline)
        .collect()
}

fn exceeds(sample: i64, threshold: i64) -> bool {
    i128::from(sample).abs() > i128::from(threshold)
}

/// Find the windows of `samples` whose magnitude exceeds `threshold`.
///
/// Rising edges (below → above) open a window at the first sample above,
/// falling edges (above → below) close it at the last sample above. A
/// signal already above at index 0 opens a window there; one still above at
/// the end closes at the last index. Windows whose gap is smaller than
/// `min_gap` are then merged. Output is ordered and non-overlapping.
pub fn segment(samples: &[i64], threshold: i64, min_gap: usize) -> Vec<EventWindow> {
    let above: Vec<bool> = samples.iter().map(|&s| exceeds(s, threshold)).collect();
    if !above.iter().any(|&a| a) {
        return Vec::new();
    }

    let mut rising = Vec::new();
    let mut falling = Vec::new();
    for (i, pair) in above.windows(2).enumerate() {
        match (pair[0], pair[1]) {
            (false, true) => rising.push(i + 1),
            (true, false) => falling.push(i),
            _ => {}
        }
    }

    let last = samples.len() - 1;
    let mut falls = falling.into_iter();
    let mut windows = Vec::with_capacity(rising.len() + 1);

    if above[0] {
        windows.push(EventWindow::new(0, falls.next().unwrap_or(last)));
    }
    for start in rising {
        windows.push(EventWindow::new(start, falls.next().unwrap_or(last)));
    }

    let merged = merge_windows(&windows, min_gap);
    trace!(
        raw = windows.len(),
        merged = merged.len(),
        threshold,
        "segmented samples"
    );
    merged
}

/// Merge consecutive windows whose gap (`next.start - prev.end`) is below
/// `min_gap`, extending the earlier window to the later window's end.
///
/// Expects windows ordered by `start`. Re-running on the output with the
/// same `min_gap` returns it unchanged.
pub fn merge_windows(windows: &[EventWindow], min_gap: usize) -> Vec<EventWindow> {
    let mut merged: Vec<EventWindow> = Vec::with_capacity(windows.len());
    for &window in windows {
        match merged.last_mut() {
            Some(prev) if window.start.saturating_sub(prev.end) < min_gap => {
                prev.end = prev.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Index range of `window` padded by `context` samples on each side.
///
/// Returns `[start - context, end + max(context, 1))` clipped to `[0, len)`,
/// so the inclusive window itself is always covered.
pub fn padded_range(window: EventWindow, context: usize, len: usize) -> Range<usize> {
    let start = window.start.saturating_sub(context).min(len);
    let end = window.end.saturating_add(context.max(1)).min(len);
    start..end.max(start)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn w(start: usize, end: usize) -> EventWindow {
        EventWindow::new(start, end)
    }

    #[test]
    fn single_burst() {
        let samples = [0, 0, 0, 2000, 2000, 2000, 0, 0, 0];
        assert_eq!(segment(&samples, 1000, DEFAULT_MIN_GAP), vec![w(3, 5)]);
    }

    #[test]
    fn negative_excursions_count() {
        let samples = [0, -5000, -5000, 0];
        assert_eq!(segment(&samples, 1000, 0), vec![w(1, 2)]);
    }

    #[test]
    fn quiet_signal_yields_nothing() {
        assert!(segment(&[0, 10, -10, 999, 1000], 1000, 1).is_empty());
        assert!(segment(&[], 1000, 1).is_empty());
    }

    #[test]
    fn whole_array_above() {
        let samples = [5000; 16];
        assert_eq!(segment(&samples, 1000, 0), vec![w(0, 15)]);
    }

    #[test]
    fn rising_edge_runs_to_end() {
        let samples = [0, 0, 3000, 3000];
        assert_eq!(segment(&samples, 1000, 0), vec![w(2, 3)]);
    }

    #[test]
    fn falling_edge_starts_at_zero() {
        let samples = [3000, 3000, 0, 0];
        assert_eq!(segment(&samples, 1000, 0), vec![w(0, 1)]);
    }

    #[test]
    fn starts_above_then_separate_bursts() {
        let samples = [3000, 0, 0, 3000, 0, 0, 3000];
        assert_eq!(
            segment(&samples, 1000, 1),
            vec![w(0, 0), w(3, 3), w(6, 6)]
        );
    }

    #[test]
    fn close_bursts_merge() {
        let mut samples = vec![0i64; 3000];
        for s in &mut samples[100..200] {
            *s = 4000;
        }
        for s in &mut samples[700..800] {
            *s = 4000;
        }

        assert_eq!(segment(&samples, 1000, 1000), vec![w(100, 799)]);
        assert_eq!(
            segment(&samples, 1000, 100),
            vec![w(100, 199), w(700, 799)]
        );
    }

    #[test]
    fn merge_with_gap_of_500() {
        let windows = [w(0, 100), w(600, 700)];
        assert_eq!(merge_windows(&windows, 1000), vec![w(0, 700)]);
        assert_eq!(merge_windows(&windows, 500), windows.to_vec());
    }

    #[test]
    fn merge_chains_through_several_windows() {
        let windows = [w(0, 10), w(20, 30), w(40, 50), w(5000, 5001)];
        assert_eq!(
            merge_windows(&windows, 15),
            vec![w(0, 50), w(5000, 5001)]
        );
    }

    #[test]
    fn baseline_is_first_sample() {
        assert_eq!(remove_baseline(&[10, 15, 5]), vec![0, 5, -5]);
        assert_eq!(
            remove_baseline(&[i32::MIN, i32::MAX]),
            vec![0, i64::from(i32::MAX) - i64::from(i32::MIN)]
        );
        assert!(remove_baseline(&[]).is_empty());
    }

    #[test]
    fn padded_range_clips_to_bounds() {
        assert_eq!(padded_range(w(100, 200), 300, 1000), 0..500);
        assert_eq!(padded_range(w(500, 900), 300, 1000), 200..1000);
        assert_eq!(padded_range(w(400, 500), 300, 2000), 100..800);
    }

    #[test]
    fn zero_context_still_covers_the_window() {
        assert_eq!(padded_range(w(2, 2), 0, 5), 2..3);
        assert_eq!(padded_range(w(0, 4), 0, 5), 0..5);
        assert_eq!(padded_range(w(3, 7), 0, 5), 3..5);
    }

    #[test]
    fn window_slice_and_len() {
        let samples = [1, 2, 3, 4, 5];
        let window = w(1, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window.slice(&samples), &[2, 3, 4]);
        assert_eq!(w(3, 10).slice(&samples), &[4, 5]);
    }

    proptest! {
        #[test]
        fn merge_is_a_fixed_point(
            samples in proptest::collection::vec(-5000i64..5000, 0..600),
            threshold in 0i64..4000,
            min_gap in 0usize..50,
        ) {
            let windows = segment(&samples, threshold, min_gap);
            prop_assert_eq!(merge_windows(&windows, min_gap), windows.clone());

            for pair in windows.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
            for window in &windows {
                prop_assert!(window.end < samples.len());
            }
        }
    }
}

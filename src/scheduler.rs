use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A bounded (or half-open) time range over the clip archive. `None` bounds
/// mean "beginning/end of archive".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Clip-count density heuristic guiding which window to explore next.
    pub wealth: f64,
    pub explored: bool,
}

impl TimeWindow {
    /// The whole archive, used to seed a scan.
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
            wealth: 0.0,
            explored: false,
        }
    }

    pub fn bounded(start: DateTime<Utc>, end: DateTime<Utc>, wealth: f64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            wealth,
            explored: false,
        }
    }
}

/// Timestamps observed while enumerating one window. Only used to compute
/// the split point and the children's wealth, then discarded.
#[derive(Debug, Default, Clone)]
pub struct ScanStatistics {
    stamps: Vec<i64>,
    min: Option<i64>,
    max: Option<i64>,
}

impl ScanStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ts: DateTime<Utc>) {
        let stamp = ts.timestamp_millis();
        self.stamps.push(stamp);
        self.min = Some(self.min.map_or(stamp, |m| m.min(stamp)));
        self.max = Some(self.max.map_or(stamp, |m| m.max(stamp)));
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn count(&self) -> usize {
        self.stamps.len()
    }
}

/// Greedy best-first search over time partitions weighted by clip density.
///
/// Clip density is non-uniform across an archive (streaming sessions cluster
/// in time), so repeatedly bisecting the richest unexplored window focuses a
/// limited scan budget on higher-yield regions without global knowledge up
/// front.
#[derive(Debug)]
pub struct TimeWindowScheduler {
    windows: Vec<TimeWindow>,
    normalization: f64,
}

impl TimeWindowScheduler {
    pub fn new(normalization: f64) -> Self {
        Self {
            windows: vec![TimeWindow::unbounded()],
            normalization,
        }
    }

    pub fn window(&self, idx: usize) -> &TimeWindow {
        &self.windows[idx]
    }

    pub fn remaining(&self) -> usize {
        self.windows.iter().filter(|w| !w.explored).count()
    }

    /// Index of the unexplored window with the highest wealth. The very
    /// first window wins unconditionally, having no comparison peer.
    pub fn select_next(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, window) in self.windows.iter().enumerate() {
            if window.explored {
                continue;
            }
            match best {
                Some(b) if self.windows[b].wealth >= window.wealth => {}
                _ => best = Some(idx),
            }
        }
        best
    }

    /// Record the exploration of `idx`. A window that produced clips is
    /// replaced by two children split at the midpoint of the observed
    /// timestamps; an empty window is simply dropped.
    pub fn complete(&mut self, idx: usize, stats: &ScanStatistics) {
        self.windows[idx].explored = true;

        let (Some(min), Some(max)) = (stats.min, stats.max) else {
            debug!("Window produced no clips, dropping it");
            self.windows.remove(idx);
            return;
        };

        let mid = (min + max) / 2;
        let before = stats.stamps.iter().filter(|&&s| s < mid).count();
        let after = stats.stamps.iter().filter(|&&s| s >= mid).count();

        let elapsed = (mid - min) as f64 / self.normalization;
        let wealth_before = Self::wealth(before, elapsed);
        let wealth_after = Self::wealth(after, elapsed);

        let bounds = (
            DateTime::from_timestamp_millis(min),
            DateTime::from_timestamp_millis(mid),
            DateTime::from_timestamp_millis(max),
        );
        let (Some(min_dt), Some(mid_dt), Some(max_dt)) = bounds else {
            warn!("Observed timestamps out of representable range, dropping window");
            self.windows.remove(idx);
            return;
        };

        info!(
            "🪟 Window split at {}: {} clips before ({:.3}), {} at/after ({:.3})",
            mid_dt, before, wealth_before, after, wealth_after
        );

        self.windows.remove(idx);
        self.windows
            .push(TimeWindow::bounded(min_dt, mid_dt, wealth_before));
        self.windows
            .push(TimeWindow::bounded(mid_dt, max_dt, wealth_after));
    }

    /// Zero elapsed time means zero wealth, never a division blowup.
    fn wealth(count: usize, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            0.0
        } else {
            count as f64 / elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn stats_of(stamps: &[i64]) -> ScanStatistics {
        let mut stats = ScanStatistics::new();
        for &s in stamps {
            stats.observe(ts(s));
        }
        stats
    }

    #[test]
    fn test_first_window_is_selected_unconditionally() {
        let scheduler = TimeWindowScheduler::new(1.0);
        let idx = scheduler.select_next().unwrap();
        let window = scheduler.window(idx);
        assert!(window.start.is_none());
        assert!(window.end.is_none());
        assert_eq!(window.wealth, 0.0);
    }

    #[test]
    fn test_even_spread_splits_at_midpoint_with_expected_wealth() {
        // 10 clips spread over 0..=100ms; mid = 50, 4 strictly before,
        // 6 at/after.
        let mut scheduler = TimeWindowScheduler::new(1.0);
        let stats = stats_of(&[0, 10, 20, 30, 50, 60, 70, 80, 90, 100]);

        let idx = scheduler.select_next().unwrap();
        scheduler.complete(idx, &stats);

        assert_eq!(scheduler.remaining(), 2);
        let lo = scheduler.window(0);
        let hi = scheduler.window(1);

        assert_eq!(lo.start.unwrap(), ts(0));
        assert_eq!(lo.end.unwrap(), ts(50));
        assert_eq!(hi.start.unwrap(), ts(50));
        assert_eq!(hi.end.unwrap(), ts(100));
        assert!((lo.wealth - 4.0 / 50.0).abs() < 1e-12);
        assert!((hi.wealth - 6.0 / 50.0).abs() < 1e-12);

        // The richer child is explored next.
        let next = scheduler.select_next().unwrap();
        assert_eq!(scheduler.window(next).end.unwrap(), ts(100));
    }

    #[test]
    fn test_children_partition_parent_exactly() {
        let mut scheduler = TimeWindowScheduler::new(1.0);
        let stamps = [3, 17, 29, 41, 53, 67, 71, 89];
        let stats = stats_of(&stamps);

        scheduler.complete(scheduler.select_next().unwrap(), &stats);

        let lo = scheduler.window(0).clone();
        let hi = scheduler.window(1).clone();
        // No gap, no overlap: the children meet at the split point.
        assert_eq!(lo.end, hi.start);
        assert_eq!(lo.start.unwrap(), ts(3));
        assert_eq!(hi.end.unwrap(), ts(89));

        // count(before) + count(after) = count(parent)
        let mid = lo.end.unwrap().timestamp_millis();
        let before = stamps.iter().filter(|&&s| s < mid).count();
        let after = stamps.iter().filter(|&&s| s >= mid).count();
        assert_eq!(before + after, stamps.len());
    }

    #[test]
    fn test_zero_elapsed_yields_zero_wealth() {
        // Every clip at the same instant: mid == min, elapsed == 0.
        let mut scheduler = TimeWindowScheduler::new(1.0);
        let stats = stats_of(&[42, 42, 42]);

        scheduler.complete(scheduler.select_next().unwrap(), &stats);

        assert_eq!(scheduler.remaining(), 2);
        for idx in 0..2 {
            let wealth = scheduler.window(idx).wealth;
            assert!(wealth.is_finite());
            assert_eq!(wealth, 0.0);
        }
    }

    #[test]
    fn test_wealth_is_never_negative() {
        let mut scheduler = TimeWindowScheduler::new(1e9);
        let stats = stats_of(&[1_700_000_000_000, 1_700_000_600_000, 1_700_003_600_000]);
        scheduler.complete(scheduler.select_next().unwrap(), &stats);
        for idx in 0..scheduler.remaining() {
            assert!(scheduler.window(idx).wealth >= 0.0);
        }
    }

    #[test]
    fn test_empty_window_is_dropped() {
        let mut scheduler = TimeWindowScheduler::new(1.0);
        scheduler.complete(scheduler.select_next().unwrap(), &ScanStatistics::new());
        assert_eq!(scheduler.remaining(), 0);
        assert!(scheduler.select_next().is_none());
    }

    #[test]
    fn test_normalization_scales_wealth() {
        let mut a = TimeWindowScheduler::new(1.0);
        let mut b = TimeWindowScheduler::new(10.0);
        let stats = stats_of(&[0, 100]);

        a.complete(a.select_next().unwrap(), &stats);
        b.complete(b.select_next().unwrap(), &stats);

        // Same data, 10x normalization means 10x wealth.
        assert!((b.window(0).wealth - a.window(0).wealth * 10.0).abs() < 1e-9);
    }
}

//! Gapless scheduling of synthesized speech segments.

use std::collections::BTreeSet;

/// One segment placed on the playback clock. Times are seconds on the
/// session's output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSegment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
}

impl ScheduledSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Sink for decoded response audio.
///
/// `play` is called once per segment with its scheduled start; the sink is
/// expected to begin output at that clock position. `halt` stops everything
/// queued or sounding.
pub trait AudioOutput: Send + Sync {
    fn play(&self, segment: &ScheduledSegment, samples: &[f32], sample_rate: u32);
    fn halt(&self);
}

/// Places segments end to end.
///
/// Each segment starts at `max(now, end of previous segment)`, so segments
/// never overlap and a late arrival starts immediately instead of in the
/// past. Finished segments are removed from the in-flight set.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
    next_id: u64,
    in_flight: BTreeSet<u64>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: f64, duration: f64) -> ScheduledSegment {
        let start = self.next_start.max(now);
        let end = start + duration.max(0.0);
        self.next_start = end;
        self.next_id += 1;
        let id = self.next_id;
        self.in_flight.insert(id);
        ScheduledSegment { id, start, end }
    }

    /// Marks a segment finished. Returns `true` when this emptied the
    /// in-flight set.
    pub fn finish(&mut self, id: u64) -> bool {
        self.in_flight.remove(&id) && self.in_flight.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Clock position where the next segment would start if `now` is earlier.
    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    /// Forgets every scheduled segment and resets the clock cursor.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.next_start = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_back_to_back() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(1.0, 0.5);
        let b = scheduler.schedule(1.1, 0.25);
        assert_eq!((a.start, a.end), (1.0, 1.5));
        assert_eq!((b.start, b.end), (1.5, 1.75));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn late_segment_starts_now() {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.schedule(0.0, 0.5);
        let late = scheduler.schedule(3.0, 0.5);
        assert_eq!(late.start, 3.0);
    }

    #[test]
    fn finish_reports_drain() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.schedule(0.0, 1.0);
        let b = scheduler.schedule(0.0, 1.0);
        assert!(!scheduler.finish(a.id));
        assert!(!scheduler.finish(a.id));
        assert!(scheduler.finish(b.id));
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.schedule(5.0, 2.0);
        scheduler.clear();
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.next_start(), 0.0);
        assert_eq!(scheduler.schedule(1.0, 1.0).start, 1.0);
    }

    #[test]
    fn never_overlaps() {
        let mut scheduler = PlaybackScheduler::new();
        let arrivals = [(0.0, 0.3), (0.1, 0.2), (0.9, 0.1), (0.95, 0.4), (2.0, 0.1)];
        let segments: Vec<_> = arrivals
            .iter()
            .map(|&(now, dur)| scheduler.schedule(now, dur))
            .collect();
        for pair in segments.windows(2) {
            assert!(pair[1].start >= pair[0].end);
        }
        for (seg, &(now, _)) in segments.iter().zip(&arrivals) {
            assert!(seg.start >= now);
        }
    }
}

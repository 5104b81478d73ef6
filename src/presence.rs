/// Presence state machine for a single target emitter.
///
/// Fed once per poll cycle with whether the target was in the scan and
/// how stale the tool says the sighting is. Debounces dropped scans with
/// a miss threshold and rejects cached entries with a freshness limit, so
/// that online/offline transitions are reported exactly once each.
///
/// ```text
///            fresh sighting
///   Offline ───────────────────▶ Online
///      ▲                           │
///      └───── misses >= threshold ─┘
/// ```
use core::time::Duration;

use heapless::Vec;

use crate::defaults::{DEFAULT_FRESHNESS_SECS, DEFAULT_MISS_THRESHOLD};

/// Monotonic milliseconds since the monitor started
pub type Millis = u64;

/// Tracker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Consecutive misses that take an online target offline (at least 1)
    pub miss_threshold: u32,
    /// Oldest reported staleness still accepted as a live sighting
    pub freshness: Duration,
}

impl PresenceConfig {
    pub const fn new() -> Self {
        Self {
            miss_threshold: DEFAULT_MISS_THRESHOLD,
            freshness: Duration::from_secs(DEFAULT_FRESHNESS_SECS),
        }
    }

    /// Threshold with a floor of one miss.
    pub fn with_miss_threshold(mut self, threshold: u32) -> Self {
        self.miss_threshold = threshold.max(1);
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What the tracker believes about the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresenceState {
    pub is_online: bool,
    /// Ticks since the last confirmed sighting
    pub consecutive_misses: u32,
    pub last_seen_at: Option<Millis>,
    pub total_confirmed_ticks: u64,
}

/// Event produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Target confirmed after being offline (or on first sighting)
    BecameOnline { at: Millis },
    /// Fresh sighting this tick
    Confirmed { at: Millis },
    /// Miss threshold reached while online
    BecameOffline { at: Millis, last_seen_at: Option<Millis> },
}

/// At most a transition plus a confirmation per tick
pub type TickEvents = Vec<PresenceEvent, 2>;

/// Owns the presence state; mutated only through [`PresenceTracker::tick`].
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    config: PresenceConfig,
    state: PresenceState,
    ticks: u64,
}

impl PresenceTracker {
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            config: config.with_miss_threshold(config.miss_threshold),
            state: PresenceState::default(),
            ticks: 0,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Total ticks processed
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether a sighting with this reported staleness counts as live.
    /// `None` means the tool saw it in this pass.
    pub fn is_fresh(&self, staleness: Option<Duration>) -> bool {
        staleness.map_or(true, |age| age <= self.config.freshness)
    }

    /// Advance one tick.
    ///
    /// `found` is whether a record for the target was in this pass;
    /// `staleness` is the age that record reported, if any. A stale
    /// sighting counts as a miss.
    pub fn tick(&mut self, now: Millis, found: bool, staleness: Option<Duration>) -> TickEvents {
        self.ticks += 1;
        let mut events = TickEvents::new();

        if found && self.is_fresh(staleness) {
            self.state.consecutive_misses = 0;
            self.state.last_seen_at = Some(now);
            self.state.total_confirmed_ticks += 1;
            if !self.state.is_online {
                self.state.is_online = true;
                log::info!("target online at {} ms", now);
                let _ = events.push(PresenceEvent::BecameOnline { at: now });
            }
            let _ = events.push(PresenceEvent::Confirmed { at: now });
            return events;
        }

        if found {
            log::debug!(
                "stale sighting ({:?} > {:?}) counted as a miss",
                staleness,
                self.config.freshness
            );
        }

        self.state.consecutive_misses = self.state.consecutive_misses.saturating_add(1);
        if self.state.is_online && self.state.consecutive_misses >= self.config.miss_threshold {
            self.state.is_online = false;
            log::info!(
                "target offline at {} ms after {} misses",
                now,
                self.state.consecutive_misses
            );
            let _ = events.push(PresenceEvent::BecameOffline {
                at: now,
                last_seen_at: self.state.last_seen_at,
            });
        }
        events
    }

    /// Share of ticks with a confirmed sighting, 0..=1
    pub fn detection_rate(&self) -> f32 {
        if self.ticks == 0 {
            0.0
        } else {
            self.state.total_confirmed_ticks as f32 / self.ticks as f32
        }
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(events: &[PresenceEvent], pred: fn(&PresenceEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    fn is_online(e: &PresenceEvent) -> bool {
        matches!(e, PresenceEvent::BecameOnline { .. })
    }

    fn is_offline(e: &PresenceEvent) -> bool {
        matches!(e, PresenceEvent::BecameOffline { .. })
    }

    fn is_confirmed(e: &PresenceEvent) -> bool {
        matches!(e, PresenceEvent::Confirmed { .. })
    }

    /// Run a found/missing sequence, one tick per second, collecting
    /// (tick index, event) pairs.
    fn run(tracker: &mut PresenceTracker, found: &[bool]) -> std::vec::Vec<(usize, PresenceEvent)> {
        let mut out = std::vec::Vec::new();
        for (i, &f) in found.iter().enumerate() {
            for e in tracker.tick(i as u64 * 1000, f, None) {
                out.push((i, e));
            }
        }
        out
    }

    // ── Transitions ─────────────────────────────────────────────────

    #[test]
    fn starts_offline() {
        let t = PresenceTracker::default();
        assert_eq!(*t.state(), PresenceState::default());
        assert!(!t.state().is_online);
    }

    #[test]
    fn offline_after_threshold_then_back_online() {
        let mut t = PresenceTracker::new(PresenceConfig::new().with_miss_threshold(5));
        let events = run(&mut t, &[true, true, false, false, false, false, false, true]);
        let only: std::vec::Vec<PresenceEvent> = events.iter().map(|(_, e)| *e).collect();

        assert_eq!(count(&only, is_online), 2);
        assert_eq!(count(&only, is_offline), 1);

        let offline_at: std::vec::Vec<usize> = events.iter().filter(|(_, e)| is_offline(e)).map(|(i, _)| *i).collect();
        assert_eq!(offline_at, [6]);
        let online_at: std::vec::Vec<usize> = events.iter().filter(|(_, e)| is_online(e)).map(|(i, _)| *i).collect();
        assert_eq!(online_at, [0, 7]);

        assert_eq!(
            events.iter().find(|(_, e)| is_offline(e)).map(|(_, e)| *e),
            Some(PresenceEvent::BecameOffline {
                at: 6000,
                last_seen_at: Some(1000)
            })
        );
    }

    #[test]
    fn single_online_event_for_steady_sightings() {
        let mut t = PresenceTracker::default();
        let mut online_ticks = std::vec::Vec::new();
        for i in 0..6u64 {
            let events = t.tick(i * 1000, true, Some(Duration::from_millis(200)));
            if events.iter().any(is_online) {
                online_ticks.push(i + 1);
            }
            assert_eq!(count(&events, is_confirmed), 1);
        }
        assert_eq!(online_ticks, [1]);
        let s = t.state();
        assert!(s.is_online);
        assert_eq!(s.consecutive_misses, 0);
        assert_eq!(s.total_confirmed_ticks, 6);
        assert_eq!(s.last_seen_at, Some(5000));
    }

    #[test]
    fn transitions_alternate() {
        let pattern = [
            true, false, false, false, false, false, false, true, true, false, false, false, false,
            false, true, false, true,
        ];
        let mut t = PresenceTracker::default();
        let events = run(&mut t, &pattern);
        let mut last: Option<bool> = None;
        for (_, e) in events {
            let online = match e {
                PresenceEvent::BecameOnline { .. } => true,
                PresenceEvent::BecameOffline { .. } => false,
                PresenceEvent::Confirmed { .. } => continue,
            };
            assert_ne!(last, Some(online), "two consecutive identical transitions");
            last = Some(online);
        }
    }

    #[test]
    fn misses_while_offline_emit_nothing() {
        let mut t = PresenceTracker::default();
        for i in 0..20 {
            assert!(t.tick(i, false, None).is_empty());
        }
        assert_eq!(t.state().consecutive_misses, 20);
        assert!(!t.state().is_online);
    }

    #[test]
    fn online_implies_misses_below_threshold() {
        let mut t = PresenceTracker::new(PresenceConfig::new().with_miss_threshold(3));
        let pattern = [true, false, false, true, false, false, false, false, true, false];
        for (i, &f) in pattern.iter().enumerate() {
            t.tick(i as u64, f, None);
            let s = t.state();
            if s.is_online {
                assert!(s.consecutive_misses < 3);
            }
        }
    }

    #[test]
    fn miss_threshold_floor_is_one() {
        let mut t = PresenceTracker::new(PresenceConfig {
            miss_threshold: 0,
            ..PresenceConfig::new()
        });
        assert_eq!(t.config().miss_threshold, 1);
        t.tick(0, true, None);
        let events = t.tick(1, false, None);
        assert_eq!(count(&events, is_offline), 1);
    }

    // ── Freshness ───────────────────────────────────────────────────

    #[test]
    fn stale_sighting_is_a_miss() {
        let mut t = PresenceTracker::new(PresenceConfig::new().with_freshness(Duration::from_secs(3)));
        t.tick(0, true, None);
        t.tick(1000, false, None);
        assert_eq!(t.state().consecutive_misses, 1);

        let events = t.tick(2000, true, Some(Duration::from_secs(10)));
        assert!(events.is_empty());
        assert_eq!(t.state().consecutive_misses, 2);
        assert_eq!(t.state().total_confirmed_ticks, 1);
        assert_eq!(t.state().last_seen_at, Some(0));
    }

    #[test]
    fn stale_sighting_never_brings_target_online() {
        let mut t = PresenceTracker::default();
        for i in 0..10 {
            assert!(t.tick(i, true, Some(Duration::from_secs(60))).is_empty());
        }
        assert!(!t.state().is_online);
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let t = PresenceTracker::new(PresenceConfig::new().with_freshness(Duration::from_secs(3)));
        assert!(t.is_fresh(None));
        assert!(t.is_fresh(Some(Duration::from_secs(3))));
        assert!(!t.is_fresh(Some(Duration::from_millis(3001))));
    }

    // ── Counters ────────────────────────────────────────────────────

    #[test]
    fn detection_rate() {
        let mut t = PresenceTracker::default();
        assert_eq!(t.detection_rate(), 0.0);
        run(&mut t, &[true, false, true, false]);
        assert_eq!(t.ticks(), 4);
        assert!((t.detection_rate() - 0.5).abs() < f32::EPSILON);
    }
}

//! Cancelable timer handles.
//!
//! State machines never sleep. They ask the driver to schedule a timer and get
//! the [`TimerId`] back when it fires. Each owner keeps one [`TimerSlot`]; a
//! firing whose id is not the slot's live id is stale (canceled, superseded,
//! or fired after teardown) and must be ignored.

use std::time::Duration;

use streamline_proto::StreamId;

/// What a timer is for. Drivers route firings back by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Reconnect backoff.
    Reconnect,
    /// Slow-mode countdown tick for a stream's chat.
    SlowMode(StreamId),
}

/// Handle naming one scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerId {
    kind: TimerKind,
    generation: u64,
}

impl TimerId {
    /// Timer purpose.
    pub fn kind(&self) -> &TimerKind {
        &self.kind
    }

    /// Per-slot sequence number. Distinguishes re-armed timers of one kind.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Timer requests for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Fire `id` once after `delay`.
    Schedule {
        /// Timer handle
        id: TimerId,
        /// Delay before firing
        delay: Duration,
    },
    /// Drop `id` without firing.
    Cancel {
        /// Timer handle
        id: TimerId,
    },
}

/// Single-timer slot with liveness tracking.
///
/// # Invariants
///
/// - At most one live timer per slot.
/// - Generations strictly increase, so an old id never matches a new timer.
#[derive(Debug, Clone)]
pub struct TimerSlot {
    kind: TimerKind,
    next_generation: u64,
    live: Option<TimerId>,
}

impl TimerSlot {
    /// Create an empty slot.
    pub fn new(kind: TimerKind) -> Self {
        Self { kind, next_generation: 0, live: None }
    }

    /// Arm a new timer, replacing any live one.
    ///
    /// Returns the actions to cancel the previous timer (if any) and schedule
    /// the new one.
    pub fn arm(&mut self, delay: Duration) -> Vec<TimerAction> {
        let mut actions = Vec::with_capacity(2);
        if let Some(previous) = self.live.take() {
            actions.push(TimerAction::Cancel { id: previous });
        }

        let id = TimerId { kind: self.kind.clone(), generation: self.next_generation };
        self.next_generation += 1;
        self.live = Some(id.clone());

        actions.push(TimerAction::Schedule { id, delay });
        actions
    }

    /// Cancel the live timer. Returns `None` if nothing was armed.
    pub fn disarm(&mut self) -> Option<TimerAction> {
        self.live.take().map(|id| TimerAction::Cancel { id })
    }

    /// Consume a firing. Returns `true` only if `id` is the live timer.
    pub fn fire(&mut self, id: &TimerId) -> bool {
        if self.live.as_ref() == Some(id) {
            self.live = None;
            true
        } else {
            false
        }
    }

    /// Currently armed timer.
    pub fn live(&self) -> Option<&TimerId> {
        self.live.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearm_cancels_previous() {
        let mut slot = TimerSlot::new(TimerKind::Reconnect);
        let first = slot.arm(Duration::from_secs(1));
        assert_eq!(first.len(), 1);

        let second = slot.arm(Duration::from_secs(2));
        assert_eq!(second.len(), 2);
        assert!(matches!(second[0], TimerAction::Cancel { .. }));
        assert!(matches!(second[1], TimerAction::Schedule { .. }));
    }

    #[test]
    fn stale_firing_is_rejected() {
        let mut slot = TimerSlot::new(TimerKind::Reconnect);
        let TimerAction::Schedule { id: old, .. } = slot.arm(Duration::from_secs(1)).remove(0)
        else {
            panic!("expected schedule");
        };
        slot.arm(Duration::from_secs(1));

        assert!(!slot.fire(&old));
        assert!(slot.live().is_some());
    }

    #[test]
    fn fire_consumes_live_timer() {
        let mut slot = TimerSlot::new(TimerKind::SlowMode("s1".to_string()));
        slot.arm(Duration::from_secs(1));
        let id = slot.live().cloned().unwrap();

        assert!(slot.fire(&id));
        assert!(!slot.fire(&id));
        assert!(slot.disarm().is_none());
    }
}

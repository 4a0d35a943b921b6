//! Slow-mode backpressure gate.
//!
//! Local, advisory mirror of the server's slow-mode throttle for one chat
//! session. The server stays authoritative; the gate only avoids round trips
//! that would be rejected anyway.
//!
//! The countdown is driven by one-second ticks: each live tick decrements the
//! remaining cooldown and re-arms itself until it reaches zero.

use std::time::Duration;

use streamline_proto::StreamId;

use crate::{
    chat::DEFAULT_COOLDOWN_SECS,
    error::SendRejected,
    timer::{TimerAction, TimerId, TimerKind, TimerSlot},
};

const TICK: Duration = Duration::from_secs(1);

/// Snapshot of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlowModeState {
    /// Server has slow mode on
    pub enabled: bool,
    /// Seconds until the next send is allowed
    pub cooldown_remaining_secs: u32,
}

/// Cooldown gate in front of outbound chat for one stream.
#[derive(Debug, Clone)]
pub struct SlowModeGate {
    state: SlowModeState,
    cooldown_secs: u32,
    tick: TimerSlot,
}

impl SlowModeGate {
    /// Create a disabled gate with the default 30 s cooldown.
    pub fn new(stream_id: StreamId) -> Self {
        Self::with_cooldown(stream_id, DEFAULT_COOLDOWN_SECS)
    }

    /// Create a disabled gate that arms `cooldown_secs` after each local send.
    pub fn with_cooldown(stream_id: StreamId, cooldown_secs: u32) -> Self {
        Self {
            state: SlowModeState::default(),
            cooldown_secs,
            tick: TimerSlot::new(TimerKind::SlowMode(stream_id)),
        }
    }

    /// Current state.
    pub fn state(&self) -> SlowModeState {
        self.state
    }

    /// Seconds until sends are allowed again.
    pub fn remaining(&self) -> u32 {
        self.state.cooldown_remaining_secs
    }

    /// Live countdown tick, if any.
    pub fn pending_tick(&self) -> Option<&TimerId> {
        self.tick.live()
    }

    /// Reject while a cooldown is running.
    ///
    /// # Errors
    ///
    /// - `SendRejected::SlowMode` with the seconds left
    pub fn check(&self) -> Result<(), SendRejected> {
        match self.state.cooldown_remaining_secs {
            0 => Ok(()),
            remaining_secs => Err(SendRejected::SlowMode { remaining_secs }),
        }
    }

    /// A message was accepted for sending. Arms the fixed cooldown if
    /// enabled.
    pub fn on_sent(&mut self) -> Vec<TimerAction> {
        if !self.state.enabled {
            return Vec::new();
        }
        self.arm(self.cooldown_secs)
    }

    /// Server-pushed slow-mode directive.
    ///
    /// Enabling arms a countdown of `duration` seconds (the fixed cooldown
    /// when 0), replacing any running one. Disabling clears the countdown.
    pub fn toggle(&mut self, enabled: bool, duration: u32) -> Vec<TimerAction> {
        self.state.enabled = enabled;

        if enabled {
            let secs = if duration == 0 { self.cooldown_secs } else { duration };
            return self.arm(secs);
        }

        self.state.cooldown_remaining_secs = 0;
        self.tick.disarm().into_iter().collect()
    }

    /// Countdown tick fired. Stale ids are ignored.
    pub fn handle_tick(&mut self, id: &TimerId) -> Vec<TimerAction> {
        if !self.tick.fire(id) {
            return Vec::new();
        }

        self.state.cooldown_remaining_secs = self.state.cooldown_remaining_secs.saturating_sub(1);
        if self.state.cooldown_remaining_secs > 0 { self.tick.arm(TICK) } else { Vec::new() }
    }

    /// Cancel the pending tick. Remaining cooldown is left as is.
    pub fn teardown(&mut self) -> Option<TimerAction> {
        self.tick.disarm()
    }

    fn arm(&mut self, secs: u32) -> Vec<TimerAction> {
        self.state.cooldown_remaining_secs = secs;
        if secs == 0 {
            return self.tick.disarm().into_iter().collect();
        }
        self.tick.arm(TICK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_id(actions: &[TimerAction]) -> TimerId {
        actions
            .iter()
            .find_map(|a| match a {
                TimerAction::Schedule { id, .. } => Some(id.clone()),
                TimerAction::Cancel { .. } => None,
            })
            .unwrap()
    }

    fn enabled_gate(duration: u32) -> (SlowModeGate, Vec<TimerAction>) {
        let mut gate = SlowModeGate::new("s1".to_string());
        let actions = gate.toggle(true, duration);
        (gate, actions)
    }

    fn run_out(gate: &mut SlowModeGate, mut actions: Vec<TimerAction>) {
        while gate.remaining() > 0 {
            actions = gate.handle_tick(&tick_id(&actions));
        }
        assert!(actions.is_empty());
    }

    #[test]
    fn disabled_gate_never_blocks() {
        let mut gate = SlowModeGate::new("s1".to_string());
        assert!(gate.on_sent().is_empty());
        assert_eq!(gate.check(), Ok(()));
    }

    #[test]
    fn enabling_arms_server_duration() {
        let (mut gate, actions) = enabled_gate(3);
        assert!(matches!(&actions[..], [TimerAction::Schedule { delay, .. }] if *delay == TICK));
        assert_eq!(gate.check(), Err(SendRejected::SlowMode { remaining_secs: 3 }));

        let mut actions = actions;
        for expected in [2, 1] {
            actions = gate.handle_tick(&tick_id(&actions));
            assert_eq!(gate.remaining(), expected);
        }

        let last = gate.handle_tick(&tick_id(&actions));
        assert!(last.is_empty());
        assert_eq!(gate.remaining(), 0);
        assert!(gate.pending_tick().is_none());
        assert_eq!(gate.check(), Ok(()));
    }

    #[test]
    fn zero_duration_arms_thirty_seconds() {
        let (gate, actions) = enabled_gate(0);
        assert_eq!(gate.remaining(), 30);
        assert!(gate.pending_tick().is_some());
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn send_arms_fixed_cooldown_regardless_of_server_duration() {
        let (mut gate, actions) = enabled_gate(5);
        run_out(&mut gate, actions);

        let actions = gate.on_sent();
        assert_eq!(gate.remaining(), 30);
        assert_eq!(gate.check(), Err(SendRejected::SlowMode { remaining_secs: 30 }));
        assert!(matches!(&actions[..], [TimerAction::Schedule { .. }]));
    }

    #[test]
    fn toggle_replaces_running_countdown() {
        let (mut gate, first) = enabled_gate(30);
        let old = tick_id(&first);

        let actions = gate.toggle(true, 5);
        assert_eq!(gate.remaining(), 5);
        assert!(actions.contains(&TimerAction::Cancel { id: old.clone() }));
        assert_ne!(tick_id(&actions), old);
        assert!(gate.handle_tick(&old).is_empty());
    }

    #[test]
    fn disable_cancels_countdown() {
        let (mut gate, actions) = enabled_gate(10);
        let id = tick_id(&actions);

        let cancel = gate.toggle(false, 0);
        assert_eq!(cancel, vec![TimerAction::Cancel { id: id.clone() }]);
        assert_eq!(gate.check(), Ok(()));
        assert!(gate.handle_tick(&id).is_empty());

        // Disabled gates ignore local sends.
        assert!(gate.on_sent().is_empty());
    }

    #[test]
    fn stale_tick_after_teardown_is_noop() {
        let (mut gate, actions) = enabled_gate(5);
        let id = tick_id(&actions);
        assert!(gate.teardown().is_some());
        assert!(gate.handle_tick(&id).is_empty());
        assert_eq!(gate.remaining(), 5);
    }
}

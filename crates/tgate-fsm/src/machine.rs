//! The per-instrument transition algebra.
//!
//! One `InstrumentFsm` per symbol, mutated only by the runner that owns
//! the symbol. Signals arm a threshold; ticks evaluate it. A failed
//! evaluation parks the machine in `NOPOSITION_BLOCKED` until the first
//! second of a strictly later wall-clock minute.

use tgate_core::{
    is_minute_start, minute_index, FsmSnapshot, FsmState, Price, Side,
};

/// A single observed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: FsmState,
    pub to: FsmState,
}

/// Result of applying a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No armed threshold or signal time yet; only the cached price moved.
    MissingPrerequisite,
    /// Tick evaluated. Zero, one, or two state changes (two when a
    /// blocked machine re-arms and immediately re-evaluates).
    Applied(Vec<StateChange>),
}

impl TickOutcome {
    pub fn changes(&self) -> &[StateChange] {
        match self {
            Self::MissingPrerequisite => &[],
            Self::Applied(changes) => changes,
        }
    }
}

/// Per-symbol state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentFsm {
    pub state: FsmState,
    pub ltp: Option<Price>,
    pub threshold: Option<Price>,
    pub last_buy_threshold: Option<Price>,
    pub last_sell_threshold: Option<Price>,
    pub last_blocked_at_ms: Option<i64>,
    /// When the arming signal arrived.
    pub last_signal_at_ms: Option<i64>,
    /// When the armed threshold was last evaluated against a tick.
    pub last_checked_at_ms: Option<i64>,
    /// Direction of the most recent signal; picks the entry state for
    /// runners that can enter either side.
    pub last_signal: Option<Side>,
}

impl InstrumentFsm {
    /// Published view of this machine.
    pub fn snapshot(&self) -> FsmSnapshot {
        FsmSnapshot {
            state: self.state,
            ltp: self.ltp,
            threshold: self.threshold,
            last_buy_threshold: self.last_buy_threshold,
            last_sell_threshold: self.last_sell_threshold,
            last_blocked_at_ms: self.last_blocked_at_ms,
        }
    }

    /// Rebuild a machine from a persisted snapshot.
    ///
    /// The signal timestamp is not persisted; an armed state restores
    /// with epoch zero so the next tick can still evaluate it, and the
    /// signal direction is inferred from the position state.
    pub fn from_snapshot(snap: &FsmSnapshot) -> Self {
        let armed = snap.state != FsmState::NoSignal;
        Self {
            state: snap.state,
            ltp: snap.ltp,
            threshold: snap.threshold,
            last_buy_threshold: snap.last_buy_threshold,
            last_sell_threshold: snap.last_sell_threshold,
            last_blocked_at_ms: snap.last_blocked_at_ms,
            last_signal_at_ms: armed.then_some(0),
            last_checked_at_ms: None,
            last_signal: match snap.state {
                FsmState::BuyPosition => Some(Side::Buy),
                FsmState::SellPosition => Some(Side::Sell),
                _ => None,
            },
        }
    }

    /// Apply a webhook signal.
    ///
    /// BUY arms the stop price; SELL arms the last known traded price
    /// (which may still be unknown — the transition is recorded anyway
    /// and ticks no-op until a price arrives). With `retain_position`
    /// (broker behavior) a signal landing on an open position only moves
    /// the thresholds and leaves the position state alone.
    pub fn apply_signal(
        &mut self,
        direction: Side,
        stop_px: Option<Price>,
        last_ltp: Option<Price>,
        now_ms: i64,
        retain_position: bool,
    ) -> StateChange {
        let from = self.state;
        self.last_signal = Some(direction);

        let armed = match direction {
            Side::Buy => {
                self.last_buy_threshold = stop_px;
                stop_px
            }
            Side::Sell => {
                let ltp = self.ltp.or(last_ltp);
                self.last_sell_threshold = ltp;
                ltp
            }
        };
        self.threshold = armed;
        self.last_signal_at_ms = Some(now_ms);

        if retain_position && self.state.is_in_position() {
            return StateChange { from, to: self.state };
        }

        self.state = FsmState::NoPositionSignal;
        self.last_checked_at_ms = None;
        self.last_blocked_at_ms = None;

        StateChange {
            from,
            to: FsmState::NoPositionSignal,
        }
    }

    /// Apply a price tick. `entry` is the position state a favorable
    /// evaluation enters (long/short runners fix it; the broker runner
    /// follows the last signal direction).
    pub fn apply_tick(&mut self, ltp: Price, now_ms: i64, entry: Side) -> TickOutcome {
        self.ltp = Some(ltp);

        let (threshold, _signal_at) = match (self.threshold, self.last_signal_at_ms) {
            (Some(t), Some(s)) => (t, s),
            _ => return TickOutcome::MissingPrerequisite,
        };

        let mut changes = Vec::new();
        match self.state {
            FsmState::NoSignal => {}
            FsmState::BuyPosition => {
                if ltp < threshold {
                    self.block(now_ms, FsmState::BuyPosition, &mut changes);
                }
            }
            FsmState::SellPosition => {
                if ltp > threshold {
                    self.block(now_ms, FsmState::SellPosition, &mut changes);
                }
            }
            FsmState::NoPositionSignal => {
                self.evaluate_armed(ltp, threshold, now_ms, entry, &mut changes);
            }
            FsmState::NoPositionBlocked => {
                let blocked_at = self.last_blocked_at_ms.unwrap_or(0);
                let due = is_minute_start(now_ms) && minute_index(now_ms) > minute_index(blocked_at);
                if due {
                    // Re-arm, then evaluate in the same step.
                    changes.push(StateChange {
                        from: FsmState::NoPositionBlocked,
                        to: FsmState::NoPositionSignal,
                    });
                    self.state = FsmState::NoPositionSignal;
                    self.last_checked_at_ms = None;
                    self.last_blocked_at_ms = None;
                    self.evaluate_armed(ltp, threshold, now_ms, entry, &mut changes);
                }
            }
        }

        TickOutcome::Applied(changes)
    }

    /// Evaluate an armed threshold. One evaluation per signal: a machine
    /// already checked since the last signal no-ops.
    fn evaluate_armed(
        &mut self,
        ltp: Price,
        threshold: Price,
        now_ms: i64,
        entry: Side,
        changes: &mut Vec<StateChange>,
    ) {
        let signal_at = self.last_signal_at_ms.unwrap_or(0);
        if self.last_checked_at_ms.is_some_and(|c| c >= signal_at) {
            return;
        }
        self.last_checked_at_ms = Some(now_ms);

        let favorable = match entry {
            Side::Buy => ltp > threshold,
            Side::Sell => ltp < threshold,
        };

        if favorable {
            let to = match entry {
                Side::Buy => FsmState::BuyPosition,
                Side::Sell => FsmState::SellPosition,
            };
            changes.push(StateChange {
                from: FsmState::NoPositionSignal,
                to,
            });
            self.state = to;
        } else {
            self.block(now_ms, FsmState::NoPositionSignal, &mut *changes);
        }
    }

    fn block(&mut self, now_ms: i64, from: FsmState, changes: &mut Vec<StateChange>) {
        self.state = FsmState::NoPositionBlocked;
        self.last_blocked_at_ms = Some(now_ms);
        changes.push(StateChange {
            from,
            to: FsmState::NoPositionBlocked,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn px(v: rust_decimal::Decimal) -> Price {
        Price::new(v)
    }

    /// Minute-aligned base timestamp for blocked re-evaluation tests.
    const T0: i64 = 1_700_000_040_000;

    fn armed_buy(stop: rust_decimal::Decimal, at: i64) -> InstrumentFsm {
        let mut fsm = InstrumentFsm::default();
        fsm.apply_signal(Side::Buy, Some(px(stop)), None, at, false);
        fsm
    }

    #[test]
    fn test_buy_signal_arms_threshold() {
        let fsm = armed_buy(dec!(100), T0);
        assert_eq!(fsm.state, FsmState::NoPositionSignal);
        assert_eq!(fsm.threshold, Some(px(dec!(100))));
        assert_eq!(fsm.last_buy_threshold, Some(px(dec!(100))));
        assert_eq!(fsm.last_signal_at_ms, Some(T0));
        assert!(fsm.last_checked_at_ms.is_none());
        assert!(fsm.last_blocked_at_ms.is_none());
    }

    #[test]
    fn test_sell_signal_arms_last_known_price() {
        let mut fsm = InstrumentFsm::default();
        fsm.ltp = Some(px(dec!(100)));
        fsm.apply_signal(Side::Sell, None, None, T0, false);
        assert_eq!(fsm.state, FsmState::NoPositionSignal);
        assert_eq!(fsm.threshold, Some(px(dec!(100))));
        assert_eq!(fsm.last_sell_threshold, Some(px(dec!(100))));
    }

    #[test]
    fn test_sell_signal_without_price_still_recorded() {
        let mut fsm = InstrumentFsm::default();
        fsm.apply_signal(Side::Sell, None, None, T0, false);
        assert_eq!(fsm.state, FsmState::NoPositionSignal);
        assert!(fsm.threshold.is_none());

        // Tick cannot evaluate until the threshold is known.
        let outcome = fsm.apply_tick(px(dec!(99)), T0 + 1_000, Side::Sell);
        assert_eq!(outcome, TickOutcome::MissingPrerequisite);
        // But the price is cached for the next signal.
        assert_eq!(fsm.ltp, Some(px(dec!(99))));
    }

    // Scenario: long entry. BUY stop 100, tick 101 -> BUYPOSITION.
    #[test]
    fn test_long_entry() {
        let mut fsm = armed_buy(dec!(100), T0);
        let outcome = fsm.apply_tick(px(dec!(101)), T0 + 1_000, Side::Buy);
        assert_eq!(
            outcome.changes(),
            &[StateChange {
                from: FsmState::NoPositionSignal,
                to: FsmState::BuyPosition
            }]
        );
        assert_eq!(fsm.state, FsmState::BuyPosition);
    }

    // Scenario: long exit. BUYPOSITION at threshold 100, tick 99 -> blocked.
    #[test]
    fn test_long_exit_on_adverse_tick() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(101)), T0 + 1_000, Side::Buy);

        // Holding tick: no change.
        let hold = fsm.apply_tick(px(dec!(102)), T0 + 2_000, Side::Buy);
        assert!(hold.changes().is_empty());
        assert_eq!(fsm.state, FsmState::BuyPosition);

        let exit = fsm.apply_tick(px(dec!(99)), T0 + 3_000, Side::Buy);
        assert_eq!(
            exit.changes(),
            &[StateChange {
                from: FsmState::BuyPosition,
                to: FsmState::NoPositionBlocked
            }]
        );
        assert_eq!(fsm.last_blocked_at_ms, Some(T0 + 3_000));
    }

    // Scenario: blocked re-arm. Failed evaluation at :30, tick at :45
    // no-ops, tick at second 0 of the next minute re-arms and enters.
    #[test]
    fn test_blocked_rearm_at_minute_start() {
        let mut fsm = armed_buy(dec!(100), T0);

        let blocked = fsm.apply_tick(px(dec!(99)), T0 + 30_000, Side::Buy);
        assert_eq!(blocked.changes().last().unwrap().to, FsmState::NoPositionBlocked);

        // Same minute: no-op even though the price recovered.
        let same_minute = fsm.apply_tick(px(dec!(101)), T0 + 45_000, Side::Buy);
        assert!(same_minute.changes().is_empty());
        assert_eq!(fsm.state, FsmState::NoPositionBlocked);

        // Second 0 of the next minute: two transitions in one step.
        let rearm = fsm.apply_tick(px(dec!(101)), T0 + 60_000, Side::Buy);
        assert_eq!(
            rearm.changes(),
            &[
                StateChange {
                    from: FsmState::NoPositionBlocked,
                    to: FsmState::NoPositionSignal
                },
                StateChange {
                    from: FsmState::NoPositionSignal,
                    to: FsmState::BuyPosition
                }
            ]
        );
        assert_eq!(fsm.state, FsmState::BuyPosition);
    }

    #[test]
    fn test_blocked_rearm_can_reblock() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(99)), T0 + 30_000, Side::Buy);

        let rearm = fsm.apply_tick(px(dec!(98)), T0 + 60_000, Side::Buy);
        assert_eq!(rearm.changes().len(), 2);
        assert_eq!(fsm.state, FsmState::NoPositionBlocked);
        // The block window restarts from the re-evaluation.
        assert_eq!(fsm.last_blocked_at_ms, Some(T0 + 60_000));
    }

    #[test]
    fn test_blocked_ignores_mid_minute_of_later_minute() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(99)), T0 + 30_000, Side::Buy);

        // Later minute but not its first second: still blocked.
        let outcome = fsm.apply_tick(px(dec!(101)), T0 + 90_000, Side::Buy);
        assert!(outcome.changes().is_empty());
        assert_eq!(fsm.state, FsmState::NoPositionBlocked);
    }

    // Scenario: short. SELL with LTP 100 -> threshold 100; tick 99 enters
    // SELLPOSITION; tick 101 blocks.
    #[test]
    fn test_short_entry_and_exit() {
        let mut fsm = InstrumentFsm::default();
        fsm.ltp = Some(px(dec!(100)));
        fsm.apply_signal(Side::Sell, None, None, T0, false);
        assert_eq!(fsm.threshold, Some(px(dec!(100))));

        let entry = fsm.apply_tick(px(dec!(99)), T0 + 1_000, Side::Sell);
        assert_eq!(
            entry.changes(),
            &[StateChange {
                from: FsmState::NoPositionSignal,
                to: FsmState::SellPosition
            }]
        );

        let exit = fsm.apply_tick(px(dec!(101)), T0 + 2_000, Side::Sell);
        assert_eq!(
            exit.changes(),
            &[StateChange {
                from: FsmState::SellPosition,
                to: FsmState::NoPositionBlocked
            }]
        );
    }

    #[test]
    fn test_single_evaluation_per_signal() {
        let mut fsm = armed_buy(dec!(100), T0);

        // First evaluation fails and blocks.
        fsm.apply_tick(px(dec!(99)), T0 + 1_000, Side::Buy);
        assert_eq!(fsm.state, FsmState::NoPositionBlocked);

        // A fresh signal clears the check and block markers.
        fsm.apply_signal(Side::Buy, Some(px(dec!(98))), None, T0 + 2_000, false);
        assert!(fsm.last_checked_at_ms.is_none());
        assert!(fsm.last_blocked_at_ms.is_none());

        let outcome = fsm.apply_tick(px(dec!(99)), T0 + 3_000, Side::Buy);
        assert_eq!(outcome.changes().last().unwrap().to, FsmState::BuyPosition);
    }

    #[test]
    fn test_noop_tick_idempotent_except_cached_ltp() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(101)), T0 + 1_000, Side::Buy);

        let before = fsm.snapshot();
        let outcome = fsm.apply_tick(px(dec!(103)), T0 + 2_000, Side::Buy);
        assert!(outcome.changes().is_empty());

        let mut after = fsm.snapshot();
        assert_eq!(after.ltp, Some(px(dec!(103))));
        after.ltp = before.ltp;
        assert_eq!(after, before);
    }

    #[test]
    fn test_retain_position_updates_thresholds_only() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(101)), T0 + 1_000, Side::Buy);
        assert_eq!(fsm.state, FsmState::BuyPosition);

        // Mid-position BUY moves the stop, keeps the position.
        let change = fsm.apply_signal(Side::Buy, Some(px(dec!(100.5))), None, T0 + 2_000, true);
        assert_eq!(change.from, FsmState::BuyPosition);
        assert_eq!(change.to, FsmState::BuyPosition);
        assert_eq!(fsm.threshold, Some(px(dec!(100.5))));
        assert_eq!(fsm.last_buy_threshold, Some(px(dec!(100.5))));

        // Mid-position SELL re-anchors to the current price.
        fsm.apply_signal(Side::Sell, None, None, T0 + 3_000, true);
        assert_eq!(fsm.state, FsmState::BuyPosition);
        assert_eq!(fsm.threshold, Some(px(dec!(101))));
        assert_eq!(fsm.last_sell_threshold, Some(px(dec!(101))));
    }

    #[test]
    fn test_without_retain_signal_leaves_position() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(101)), T0 + 1_000, Side::Buy);

        let change = fsm.apply_signal(Side::Sell, None, None, T0 + 2_000, false);
        assert_eq!(change.from, FsmState::BuyPosition);
        assert_eq!(change.to, FsmState::NoPositionSignal);
    }

    #[test]
    fn test_armed_states_keep_invariants() {
        // Every transition into an armed state carries a threshold and a
        // signal timestamp.
        let mut fsm = armed_buy(dec!(100), T0);
        for (price, at) in [
            (dec!(101), T0 + 1_000),
            (dec!(99), T0 + 2_000),
            (dec!(102), T0 + 60_000),
            (dec!(98), T0 + 120_000),
        ] {
            fsm.apply_tick(px(price), at, Side::Buy);
            if fsm.state != FsmState::NoSignal {
                assert!(fsm.threshold.is_some());
                assert!(fsm.last_signal_at_ms.is_some());
            }
            if fsm.state == FsmState::NoPositionBlocked {
                assert!(fsm.last_blocked_at_ms.is_some());
            }
            if let Some(checked) = fsm.last_checked_at_ms {
                assert!(checked >= fsm.last_signal_at_ms.unwrap());
            }
        }
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut fsm = armed_buy(dec!(100), T0);
        fsm.apply_tick(px(dec!(99)), T0 + 1_000, Side::Buy);

        let restored = InstrumentFsm::from_snapshot(&fsm.snapshot());
        assert_eq!(restored.state, FsmState::NoPositionBlocked);
        assert_eq!(restored.threshold, fsm.threshold);
        assert_eq!(restored.last_blocked_at_ms, fsm.last_blocked_at_ms);
        // Restored machines can still evaluate.
        assert!(restored.last_signal_at_ms.is_some());
    }
}

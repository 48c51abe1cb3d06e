//! Simulated clock for the single-threaded game loop.
//!
//! Nothing runs concurrently: the host calls `advance` and every timer that
//! comes due is handed back one at a time, in due order, so each firing sees
//! the state left by the previous one. Timers carry the epoch of the context
//! that armed them; the receiver compares it with the live epoch and ignores
//! stale firings.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    TravelStep,
    StallSale,
    TradeRequest,
    NegotiationPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    kind: TimerKind,
    due_ms: u64,
    period_ms: Option<u64>,
    epoch: u64,
    seq: u64,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub kind: TimerKind,
    pub epoch: u64,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now_ms: u64,
    timers: Vec<Timer>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn once(&mut self, kind: TimerKind, delay_ms: u64, epoch: u64) {
        self.arm(kind, delay_ms, None, epoch);
    }

    /// Fire every `period_ms` until cancelled. A zero period is treated as 1ms.
    pub fn every(&mut self, kind: TimerKind, period_ms: u64, epoch: u64) {
        let period = period_ms.max(1);
        self.arm(kind, period, Some(period), epoch);
    }

    fn arm(&mut self, kind: TimerKind, delay_ms: u64, period_ms: Option<u64>, epoch: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer {
            kind,
            due_ms: self.now_ms + delay_ms,
            period_ms,
            epoch,
            seq,
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.timers.retain(|t| t.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock to
    /// its due time. Periodic timers are re-armed for their next period.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Fired> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.seq))
            .map(|(i, _)| i)?;

        let timer = self.timers[index];
        self.now_ms = self.now_ms.max(timer.due_ms);
        match timer.period_ms {
            Some(period) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.timers[index].due_ms += period;
                self.timers[index].seq = seq;
            }
            None => {
                self.timers.swap_remove(index);
            }
        }

        Some(Fired {
            kind: timer.kind,
            epoch: timer.epoch,
            at_ms: timer.due_ms,
        })
    }

    /// Move the clock to `until_ms` once every due timer has been popped.
    pub fn settle(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}

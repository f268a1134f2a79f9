//! Poll scheduling: the single in-flight request slot and the repeating timer.

use std::time::Duration;

use log::trace;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::EngineEvent;

/// Observable state of the poll slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    InFlight,
    InFlightPendingRefresh,
}

/// What to do with a finished poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result belongs to the current request and should be applied.
    /// `follow_up` is the id of the coalesced refresh to start right after.
    Apply { follow_up: Option<u64> },
    /// Superseded by a restart; drop it without touching any state
    Stale,
}

/// Request bookkeeping for status polls.
///
/// At most one poll is in flight. Refreshes requested meanwhile collapse into a
/// single follow-up poll. Request ids increase monotonically and only the
/// completion carrying the current id is applied.
#[derive(Debug, Default)]
pub struct PollCycle {
    current_id: u64,
    in_flight: bool,
    pending_refresh: bool,
}

impl PollCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PollState {
        match (self.in_flight, self.pending_refresh) {
            (false, _) => PollState::Idle,
            (true, false) => PollState::InFlight,
            (true, true) => PollState::InFlightPendingRefresh,
        }
    }

    /// Id of the most recently issued request
    pub fn current_id(&self) -> u64 {
        self.current_id
    }

    fn start(&mut self) -> u64 {
        self.current_id += 1;
        self.in_flight = true;
        self.current_id
    }

    /// Ask for a poll. Returns the id of the request to start, or `None` if a
    /// poll is already running and the refresh was queued behind it.
    pub fn request(&mut self) -> Option<u64> {
        if self.in_flight {
            self.pending_refresh = true;
            trace!("Poll {} in flight, refresh queued", self.current_id);
            return None;
        }
        Some(self.start())
    }

    /// Drop whatever is in flight or queued and start a fresh request
    pub fn restart(&mut self) -> u64 {
        self.pending_refresh = false;
        self.start()
    }

    /// Forget all outstanding work; later completions will be stale
    pub fn cancel(&mut self) {
        self.current_id += 1;
        self.in_flight = false;
        self.pending_refresh = false;
    }

    /// Record the completion of request `id`
    pub fn complete(&mut self, id: u64) -> Completion {
        if id != self.current_id || !self.in_flight {
            return Completion::Stale;
        }
        self.in_flight = false;
        let follow_up = if self.pending_refresh {
            self.pending_refresh = false;
            Some(self.start())
        } else {
            None
        };
        Completion::Apply { follow_up }
    }
}

/// Spawn the repeating poll timer. The first tick fires one `period` from now.
pub fn spawn_ticker(period: Duration, events: UnboundedSender<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if events.send(EngineEvent::Tick).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_request_starts_poll() {
        let mut cycle = PollCycle::new();
        assert_eq!(cycle.state(), PollState::Idle);
        assert_eq!(cycle.request(), Some(1));
        assert_eq!(cycle.state(), PollState::InFlight);
        assert_eq!(cycle.complete(1), Completion::Apply { follow_up: None });
        assert_eq!(cycle.state(), PollState::Idle);
    }

    #[test]
    fn test_burst_of_refreshes_yields_one_follow_up() {
        let mut cycle = PollCycle::new();
        let first = cycle.request().unwrap();
        for _ in 0..5 {
            assert_eq!(cycle.request(), None);
        }
        assert_eq!(cycle.state(), PollState::InFlightPendingRefresh);

        assert_eq!(cycle.complete(first), Completion::Apply { follow_up: Some(first + 1) });
        assert_eq!(cycle.state(), PollState::InFlight);
        assert_eq!(cycle.complete(first + 1), Completion::Apply { follow_up: None });
        assert_eq!(cycle.state(), PollState::Idle);
    }

    #[test]
    fn test_restart_supersedes_in_flight_request() {
        let mut cycle = PollCycle::new();
        let old = cycle.request().unwrap();
        assert_eq!(cycle.request(), None);

        let new = cycle.restart();
        assert!(new > old);
        assert_eq!(cycle.state(), PollState::InFlight);

        // The superseded response changes nothing
        assert_eq!(cycle.complete(old), Completion::Stale);
        assert_eq!(cycle.state(), PollState::InFlight);
        assert_eq!(cycle.complete(new), Completion::Apply { follow_up: None });
    }

    #[test]
    fn test_out_of_order_completions() {
        let mut cycle = PollCycle::new();
        let a = cycle.request().unwrap();
        let b = cycle.restart();
        let c = cycle.restart();

        assert_eq!(cycle.complete(b), Completion::Stale);
        assert_eq!(cycle.complete(c), Completion::Apply { follow_up: None });
        assert_eq!(cycle.complete(a), Completion::Stale);
    }

    #[test]
    fn test_cancel_makes_everything_stale() {
        let mut cycle = PollCycle::new();
        let id = cycle.request().unwrap();
        cycle.request();
        cycle.cancel();
        assert_eq!(cycle.state(), PollState::Idle);
        assert_eq!(cycle.complete(id), Completion::Stale);
        assert_eq!(cycle.request(), Some(id + 2));
    }

    #[test]
    fn test_duplicate_completion_is_stale() {
        let mut cycle = PollCycle::new();
        let id = cycle.request().unwrap();
        assert!(matches!(cycle.complete(id), Completion::Apply { .. }));
        assert_eq!(cycle.complete(id), Completion::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_after_each_period() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_ticker(Duration::from_secs(3), tx);

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Tick)));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Tick)));
        handle.abort();
    }
}

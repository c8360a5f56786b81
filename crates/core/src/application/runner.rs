//! Sequence Runner - the periodic caller of `execute_trajectory`
//!
//! Each tick steps every pending side once, concurrently. A side that
//! reports plan-complete drops out; the run ends when none are left, when
//! the optional tick budget runs out, or when an abort is signalled.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::abort::AbortToken;
use super::constants::DEFAULT_TICK_INTERVAL;
use super::executor::GraspExecutor;
use crate::domain::Side;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every active side completed its plan
    Completed { ticks: u64 },
    /// Abort signalled; `pending` sides had not finished
    Aborted { ticks: u64, pending: Vec<Side> },
    /// Tick budget spent with sides still pending
    BudgetExhausted { ticks: u64, pending: Vec<Side> },
}

pub struct SequenceRunner {
    executor: Arc<GraspExecutor>,
    tick_interval: Duration,
    max_ticks: Option<u64>,
}

impl SequenceRunner {
    pub fn new(executor: Arc<GraspExecutor>) -> Self {
        Self {
            executor,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_ticks: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Drive all active sides until their plans complete
    pub async fn run(&self, mut abort: AbortToken) -> Result<RunOutcome> {
        let mut pending = self.executor.active_sides();
        let mut ticks = 0u64;
        info!(sides = ?pending, "Sequence run started");

        loop {
            if abort.is_aborted() {
                return Ok(self.aborted(ticks, pending));
            }
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                warn!(ticks, pending = ?pending, "Tick budget exhausted");
                return Ok(RunOutcome::BudgetExhausted { ticks, pending });
            }

            let steps = pending.iter().map(|&side| self.executor.execute_trajectory(side));
            let results = join_all(steps).await;
            ticks += 1;

            let mut still_pending = Vec::with_capacity(pending.len());
            for (side, result) in pending.into_iter().zip(results) {
                if !result? {
                    still_pending.push(side);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                info!(ticks, "Sequence run completed");
                return Ok(RunOutcome::Completed { ticks });
            }

            tokio::select! {
                _ = sleep(self.tick_interval) => {},
                _ = abort.wait() => {
                    return Ok(self.aborted(ticks, pending));
                }
            }
        }
    }

    fn aborted(&self, ticks: u64, pending: Vec<Side>) -> RunOutcome {
        info!(ticks, pending = ?pending, "Sequence run aborted");
        self.executor.stop();
        RunOutcome::Aborted { ticks, pending }
    }
}

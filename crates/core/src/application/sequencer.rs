//! Sequencer - resumable waypoint state machine for one side
//!
//! Idle -> Approaching -> Lifting -> Retreating -> Homing -> Idle
//!
//! One waypoint per invocation: the caller asks for the current step,
//! performs it, then reports whether it was reached. An unreached step
//! keeps the cursor in place so the next invocation retries it.

use crate::domain::{ExecutionPlan, PlanStep, SequencerState};

/// Position in the current plan. None (-1 upstream) means not started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionCursor {
    index: Option<usize>,
}

impl ExecutionCursor {
    pub fn idle() -> Self {
        Self { index: None }
    }

    pub fn is_idle(&self) -> bool {
        self.index.is_none()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    fn start(&mut self) {
        self.index = Some(0);
    }

    fn advance(&mut self) {
        self.index = self.index.map(|i| i + 1);
    }

    fn reset(&mut self) {
        self.index = None;
    }
}

/// Discrete hand event tied to a plan index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandEvent {
    Grasp,
    Release,
}

#[derive(Debug, Default)]
pub struct Sequencer {
    cursor: ExecutionCursor,
    plan: Option<ExecutionPlan>,
    release_offset: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.cursor.is_idle()
    }

    pub fn cursor(&self) -> ExecutionCursor {
        self.cursor
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// Start walking a freshly assembled plan
    pub fn begin(&mut self, plan: ExecutionPlan, release_offset: usize) {
        self.plan = Some(plan);
        self.release_offset = release_offset;
        self.cursor.start();
    }

    /// Step under the cursor
    pub fn current(&self) -> Option<(usize, PlanStep)> {
        let index = self.cursor.index()?;
        let step = *self.plan.as_ref()?.step(index)?;
        Some((index, step))
    }

    /// Hand event to fire after reaching `index`, if any
    pub fn hand_event(&self, index: usize) -> Option<HandEvent> {
        let plan = self.plan.as_ref()?;
        if plan.grasp_index() == Some(index) {
            Some(HandEvent::Grasp)
        } else if plan.release_index(self.release_offset) == Some(index) {
            Some(HandEvent::Release)
        } else {
            None
        }
    }

    /// Mark the current step reached. Returns true when that completed the
    /// plan, in which case the sequencer is back to idle.
    pub fn complete_step(&mut self) -> bool {
        self.cursor.advance();
        let len = self.plan.as_ref().map_or(0, ExecutionPlan::len);
        match self.cursor.index() {
            Some(i) if i >= len => {
                self.cursor.reset();
                self.plan = None;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.current()
            .map(|(_, step)| step.phase.into())
            .unwrap_or(SequencerState::Idle)
    }
}

// Side Context - exclusive owner of one hand's device handles

use tracing::{info, warn};

use super::sequencer::Sequencer;
use crate::domain::Side;
use crate::error::{AppError, Result};
use crate::port::{ContextToken, GraspBackend, MotionBackend};

/// Handles, restore token and sequencer state for one active side.
///
/// Handles are taken out on release, so teardown happens exactly once.
pub struct SideContext {
    side: Side,
    motion: Option<Box<dyn MotionBackend>>,
    grasp: Option<Box<dyn GraspBackend>>,
    /// Controller context captured before configure touched it
    restore_token: ContextToken,
    pub(crate) sequencer: Sequencer,
}

impl SideContext {
    pub fn new(side: Side, motion: Box<dyn MotionBackend>, restore_token: ContextToken) -> Self {
        Self {
            side,
            motion: Some(motion),
            grasp: None,
            restore_token,
            sequencer: Sequencer::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn attach_grasp(&mut self, grasp: Box<dyn GraspBackend>) {
        self.grasp = Some(grasp);
    }

    pub fn motion(&self) -> Result<&dyn MotionBackend> {
        self.motion
            .as_deref()
            .ok_or_else(|| AppError::InvalidState(format!("{} arm already released", self.side)))
    }

    pub fn grasp(&self) -> Option<&dyn GraspBackend> {
        self.grasp.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.motion.is_none()
    }

    /// Stop the arm, restore the configure-time context and close every
    /// handle. Keeps going after a failure and returns the first one.
    pub async fn release(&mut self) -> Result<()> {
        let mut first_err: Option<AppError> = None;

        if let Some(motion) = self.motion.take() {
            let steps = [
                ("stop", motion.stop().await),
                ("restore_context", motion.restore_context(self.restore_token).await),
                ("close", motion.close().await),
            ];
            for (step, outcome) in steps {
                if let Err(e) = outcome {
                    warn!(side = %self.side, step, error = %e, "Motion teardown step failed");
                    first_err.get_or_insert(e.into());
                }
            }
        }

        if let Some(grasp) = self.grasp.take() {
            if let Err(e) = grasp.close().await {
                warn!(side = %self.side, error = %e, "Failed to close hand");
                first_err.get_or_insert(e.into());
            }
        }

        info!(side = %self.side, "Side released");
        first_err.map_or(Ok(()), Err)
    }
}

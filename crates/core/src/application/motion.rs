// Motion transaction
//
// Every discrete move is bracketed: save context, clamp translational
// limits, command, wait, read back, restore. The restore runs whether or
// not the move settled.

use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{CartesianPose, Side, Waypoint, WaypointReport};
use crate::error::{AppError, Result};
use crate::port::{BackendError, MotionBackend, TimeProvider};

/// Reach a single waypoint.
///
/// # Errors
/// - AppError::MotionNotReached if the controller did not settle in time
/// - AppError::Backend if the controller failed
pub async fn reach(
    backend: &dyn MotionBackend,
    side: Side,
    index: Option<usize>,
    waypoint: &Waypoint,
    timeout: Duration,
    time_provider: &dyn TimeProvider,
) -> Result<WaypointReport> {
    let commanded = waypoint.target();
    debug!(side = %side, index = ?index, target = %waypoint, "Commanding waypoint");

    let token = backend.save_context().await?;
    let outcome = bracketed_move(backend, &commanded, timeout).await;
    let restored = backend.restore_context(token).await;

    let reached = outcome?;
    if let Err(e) = restored {
        warn!(side = %side, error = %e, "Failed to restore motion context");
        return Err(e.into());
    }

    match reached {
        Some(pose) => Ok(WaypointReport::new(
            side,
            index,
            commanded,
            pose,
            time_provider.now_millis(),
        )),
        None => Err(AppError::MotionNotReached {
            side,
            target: waypoint.to_string(),
        }),
    }
}

/// Clamp, move and wait. None when the motion did not settle.
async fn bracketed_move(
    backend: &dyn MotionBackend,
    commanded: &CartesianPose,
    timeout: Duration,
) -> std::result::Result<Option<CartesianPose>, BackendError> {
    backend.restrict_to_point_to_point().await?;
    backend.move_to(commanded).await?;
    if !backend.wait_motion_done(timeout).await? {
        return Ok(None);
    }
    backend.current_pose().await.map(Some)
}

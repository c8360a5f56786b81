// Waypoint Report (outbound diagnostics)

use serde::{Deserialize, Serialize};

use super::pose::CartesianPose;
use super::side::Side;

/// Outcome of one reached waypoint. Observability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointReport {
    pub side: Side,
    /// Plan index; None for out-of-plan motions (homing, go-home)
    pub index: Option<usize>,
    pub commanded: CartesianPose,
    pub reached: CartesianPose,
    pub position_error: f64,
    pub orientation_error: f64,
    pub reported_at: i64, // epoch ms
}

impl WaypointReport {
    pub fn new(
        side: Side,
        index: Option<usize>,
        commanded: CartesianPose,
        reached: CartesianPose,
        reported_at: i64,
    ) -> Self {
        Self {
            side,
            index,
            position_error: commanded.position_error(&reached),
            orientation_error: commanded.orientation_error(&reached),
            commanded,
            reached,
            reported_at,
        }
    }
}

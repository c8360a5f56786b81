// Operating ranges and timing constants (no magic values)
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::domain::{ActiveSides, Robot};

/// Robot used when `robot` is absent or unknown
pub const DEFAULT_ROBOT: Robot = Robot::IcubSim;

/// Hands used when `hand` is absent or unknown
pub const DEFAULT_ACTIVE_SIDES: ActiveSides = ActiveSides::Both;

/// Trajectory time (s)
pub const TRAJ_TIME_RANGE: RangeInclusive<f64> = 0.5..=5.0;
pub const DEFAULT_TRAJ_TIME: f64 = 2.0;

/// In-target tolerance (m)
///
/// Known defect upstream: tolerance used to be clamped to the trajectory
/// time range [0.5, 5.0], which excluded its own 0.005 default. The range
/// below brackets the default instead.
pub const TRAJ_TOL_RANGE: RangeInclusive<f64> = 0.0005..=0.05;
pub const DEFAULT_TRAJ_TOL: f64 = 0.005;

/// Lift height (m)
pub const LIFT_Z_RANGE: RangeInclusive<f64> = 0.05..=0.3;
pub const DEFAULT_LIFT_Z: f64 = 0.15;

/// Plan steps between closing and opening the hand.
/// 1 releases at the raised point, 2 after descending back.
pub const RELEASE_OFFSET_RANGE: RangeInclusive<usize> = 1..=2;
pub const DEFAULT_RELEASE_OFFSET: usize = 2;

/// Settle timeout = traj_time * FACTOR + MARGIN
pub const MOTION_TIMEOUT_FACTOR: f64 = 3.0;
pub const MOTION_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

/// Default interval between sequencer ticks (100ms)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Settle timeout for a given trajectory time
pub fn motion_timeout(traj_time: f64) -> Duration {
    Duration::from_secs_f64(traj_time * MOTION_TIMEOUT_FACTOR) + MOTION_TIMEOUT_MARGIN
}

//! Configuration Resolver
//!
//! Turns the inbound options bag into an [`OperatingConfig`]. Every field
//! that is absent, malformed or out of range falls back to its documented
//! default; resolution never fails.
//!
//! ```text
//! {
//!   "robot": "icubSim",            // "icub" | "icubSim"
//!   "hand": "both",                // "left" | "right" | "both"
//!   "traj_time": 2.0,              // [0.5, 5.0] s
//!   "traj_tol": 0.005,             // [0.0005, 0.05] m
//!   "lift_z": 0.15,                // [0.05, 0.3] m
//!   "shift": [0.0, 0.0, 0.0],      // non-zero norm or zeros
//!   "home_right": [x, y, z, ax, ay, az, theta],
//!   "home_left":  [x, y, z, ax, ay, az, theta],
//!   "release_offset": 2            // [1, 2] plan steps
//! }
//! ```

use serde_json::{json, Value};
use std::ops::RangeInclusive;
use tracing::debug;

use super::constants::*;
use crate::domain::{ActiveSides, HomePose, OperatingConfig, Robot};

/// Resolve raw options into a range-safe configuration
pub fn resolve(raw: &Value) -> OperatingConfig {
    OperatingConfig {
        robot: resolve_robot(raw.get("robot")),
        active_sides: resolve_hand(raw.get("hand")),
        traj_time: bounded("traj_time", raw.get("traj_time"), TRAJ_TIME_RANGE, DEFAULT_TRAJ_TIME),
        traj_tol: bounded("traj_tol", raw.get("traj_tol"), TRAJ_TOL_RANGE, DEFAULT_TRAJ_TOL),
        lift_z: bounded("lift_z", raw.get("lift_z"), LIFT_Z_RANGE, DEFAULT_LIFT_Z),
        shift: non_zero::<3>("shift", raw.get("shift")).unwrap_or([0.0; 3]),
        home_right: non_zero::<7>("home_right", raw.get("home_right"))
            .map(HomePose)
            .unwrap_or(HomePose::RIGHT_DEFAULT),
        home_left: non_zero::<7>("home_left", raw.get("home_left"))
            .map(HomePose)
            .unwrap_or(HomePose::LEFT_DEFAULT),
        release_offset: resolve_release_offset(raw.get("release_offset")),
    }
}

/// Render a configuration back into the options bag it resolves from
pub fn to_options(config: &OperatingConfig) -> Value {
    json!({
        "robot": config.robot.as_str(),
        "hand": config.active_sides.as_str(),
        "traj_time": config.traj_time,
        "traj_tol": config.traj_tol,
        "lift_z": config.lift_z,
        "shift": config.shift,
        "home_right": config.home_right.values(),
        "home_left": config.home_left.values(),
        "release_offset": config.release_offset,
    })
}

fn resolve_robot(value: Option<&Value>) -> Robot {
    match value.and_then(Value::as_str) {
        Some("icub") => Robot::Icub,
        Some("icubSim") => Robot::IcubSim,
        other => {
            debug!(value = ?other, "robot: using default");
            DEFAULT_ROBOT
        }
    }
}

fn resolve_hand(value: Option<&Value>) -> ActiveSides {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            debug!(value = ?value, "hand: using default");
            DEFAULT_ACTIVE_SIDES
        })
}

fn bounded(key: &str, value: Option<&Value>, range: RangeInclusive<f64>, default: f64) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(v) if range.contains(&v) => v,
        other => {
            debug!(key, value = ?other, default, "out of range: using default");
            default
        }
    }
}

/// Exactly N numbers with a non-zero norm
fn non_zero<const N: usize>(key: &str, value: Option<&Value>) -> Option<[f64; N]> {
    let parsed = value
        .and_then(Value::as_array)
        .filter(|items| items.len() == N)
        .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>())
        .and_then(|v| <[f64; N]>::try_from(v).ok())
        .filter(|v| v.iter().map(|x| x * x).sum::<f64>() > 0.0);

    if parsed.is_none() {
        debug!(key, "malformed or zero vector: using default");
    }
    parsed
}

fn resolve_release_offset(value: Option<&Value>) -> usize {
    value
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .filter(|v| RELEASE_OFFSET_RANGE.contains(v))
        .unwrap_or(DEFAULT_RELEASE_OFFSET)
}

// Operating Configuration Domain Model

use serde::{Deserialize, Serialize};

use super::pose::{HomePose, Position};
use super::side::{ActiveSides, Side};

/// Robot the controllers belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Robot {
    #[serde(rename = "icub")]
    Icub,
    #[serde(rename = "icubSim")]
    IcubSim,
}

impl Robot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Robot::Icub => "icub",
            Robot::IcubSim => "icubSim",
        }
    }
}

impl std::fmt::Display for Robot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, range-safe operating parameters.
///
/// Produced only by the configuration resolver, which guarantees every
/// bounded field sits inside its documented range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingConfig {
    pub robot: Robot,
    pub active_sides: ActiveSides,
    /// Point-to-point trajectory time (s)
    pub traj_time: f64,
    /// In-target tolerance (m)
    pub traj_tol: f64,
    /// Height of the injected lift waypoint (m)
    pub lift_z: f64,
    pub shift: Position,
    pub home_right: HomePose,
    pub home_left: HomePose,
    /// Plan steps between the grasp and the release event
    pub release_offset: usize,
}

impl OperatingConfig {
    pub fn home(&self, side: Side) -> HomePose {
        match side {
            Side::Right => self.home_right,
            Side::Left => self.home_left,
        }
    }
}

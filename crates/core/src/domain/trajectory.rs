// Trajectory Domain Model

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::pose::Waypoint;

/// Ordered approach waypoints for one side. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory(Vec<Waypoint>);

impl Trajectory {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self(waypoints)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.0
    }

    pub fn last(&self) -> Option<&Waypoint> {
        self.0.last()
    }
}

impl From<Vec<Waypoint>> for Trajectory {
    fn from(waypoints: Vec<Waypoint>) -> Self {
        Self(waypoints)
    }
}

/// Inbound trajectory feed written by the external planner
///
/// ```text
/// {
///   "trajectory_right": [[x, y, z, a, b, c], ...],
///   "trajectory_left":  [[x, y, z, a, b, c], ...]
/// }
/// ```
///
/// An absent group clears that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryFeed {
    #[serde(default)]
    pub trajectory_right: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub trajectory_left: Option<Vec<Vec<f64>>>,
}

impl TrajectoryFeed {
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Convert both groups, failing on the first malformed tuple.
    /// Returns (right, left).
    pub fn into_trajectories(self) -> Result<(Trajectory, Trajectory)> {
        Ok((
            convert_group(self.trajectory_right)?,
            convert_group(self.trajectory_left)?,
        ))
    }
}

fn convert_group(group: Option<Vec<Vec<f64>>>) -> Result<Trajectory> {
    group
        .unwrap_or_default()
        .iter()
        .map(|tuple| Waypoint::from_slice(tuple))
        .collect::<Result<Vec<_>>>()
        .map(Trajectory::new)
}

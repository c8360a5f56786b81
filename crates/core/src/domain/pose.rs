// Pose Domain Model
//
// Positions are metres in the robot root frame. Orientations reach the
// controller as axis-angle (unit axis + angle in radians); Euler input is
// ZYZ and converted on demand.

use nalgebra::{Rotation3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

pub type Position = [f64; 3];

/// Unit axis (x, y, z) followed by the rotation angle
pub type AxisAngle = [f64; 4];

/// Waypoint orientation as supplied by the planner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// ZYZ Euler angles
    Euler([f64; 3]),
    AxisAngle(AxisAngle),
}

impl Orientation {
    pub fn to_axis_angle(&self) -> AxisAngle {
        match *self {
            Orientation::AxisAngle(o) => o,
            Orientation::Euler(e) => euler_zyz_to_axis_angle(e),
        }
    }
}

/// Convert ZYZ Euler angles to axis-angle.
///
/// A null rotation has no defined axis; it is reported about +Z with a zero
/// angle so the controller always receives a unit axis.
pub fn euler_zyz_to_axis_angle(euler: [f64; 3]) -> AxisAngle {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), euler[0])
        * Rotation3::from_axis_angle(&Vector3::y_axis(), euler[1])
        * Rotation3::from_axis_angle(&Vector3::z_axis(), euler[2]);

    match rotation.axis_angle() {
        Some((axis, angle)) => [axis.x, axis.y, axis.z, angle],
        None => [0.0, 0.0, 1.0, 0.0],
    }
}

/// A single target pose. Immutable once stored; identified by its index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Position,
    pub orientation: Orientation,
}

impl Waypoint {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Build from a feed tuple: 6 values (position + Euler) or
    /// 7 values (position + axis-angle)
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let position = [
            *values.first().ok_or(DomainError::InvalidWaypoint(values.len()))?,
            *values.get(1).ok_or(DomainError::InvalidWaypoint(values.len()))?,
            *values.get(2).ok_or(DomainError::InvalidWaypoint(values.len()))?,
        ];
        let orientation = match values.len() {
            6 => Orientation::Euler([values[3], values[4], values[5]]),
            7 => Orientation::AxisAngle([values[3], values[4], values[5], values[6]]),
            n => return Err(DomainError::InvalidWaypoint(n)),
        };
        Ok(Self::new(position, orientation))
    }

    /// Same pose shifted up by `dz` along the root z axis
    pub fn raised(&self, dz: f64) -> Self {
        let mut position = self.position;
        position[2] += dz;
        Self::new(position, self.orientation)
    }

    /// Pose as commanded to the controller
    pub fn target(&self) -> CartesianPose {
        CartesianPose {
            position: self.position,
            orientation: self.orientation.to_axis_angle(),
        }
    }
}

impl std::fmt::Display for Waypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [x, y, z] = self.position;
        match self.orientation {
            Orientation::Euler([a, b, c]) => {
                write!(f, "{x:.4} {y:.4} {z:.4} | euler {a:.4} {b:.4} {c:.4}")
            }
            Orientation::AxisAngle([ax, ay, az, th]) => {
                write!(f, "{x:.4} {y:.4} {z:.4} | axis {ax:.4} {ay:.4} {az:.4} {th:.4}")
            }
        }
    }
}

/// Pose in controller terms (position + axis-angle)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPose {
    pub position: Position,
    pub orientation: AxisAngle,
}

impl CartesianPose {
    pub fn new(position: Position, orientation: AxisAngle) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Euclidean distance between positions
    pub fn position_error(&self, other: &CartesianPose) -> f64 {
        (Vector3::from(self.position) - Vector3::from(other.position)).norm()
    }

    /// Norm of the difference of the raw axis-angle vectors
    pub fn orientation_error(&self, other: &CartesianPose) -> f64 {
        (Vector4::from(self.orientation) - Vector4::from(other.orientation)).norm()
    }
}

/// Resting pose of one arm: position followed by axis-angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomePose(pub [f64; 7]);

impl HomePose {
    pub const RIGHT_DEFAULT: HomePose =
        HomePose([-0.35, 0.25, 0.2, -0.035166, -0.67078, 0.734835, 2.46923]);
    pub const LEFT_DEFAULT: HomePose =
        HomePose([-0.35, -0.25, 0.2, -0.35166, 0.697078, -0.624835, 3.106923]);

    pub fn values(&self) -> &[f64; 7] {
        &self.0
    }

    pub fn norm(&self) -> f64 {
        self.0.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn waypoint(&self) -> Waypoint {
        let v = self.0;
        Waypoint::new(
            [v[0], v[1], v[2]],
            Orientation::AxisAngle([v[3], v[4], v[5], v[6]]),
        )
    }
}

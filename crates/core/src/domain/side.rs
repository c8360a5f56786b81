// Side Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::DomainError;

/// One of the two independently controlled end-effectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Right => "right",
            Side::Left => "left",
        }
    }

    /// Arm part name used by controller and hand-action devices
    pub fn arm_part(&self) -> &'static str {
        match self {
            Side::Right => "right_arm",
            Side::Left => "left_arm",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right" => Ok(Side::Right),
            "left" => Ok(Side::Left),
            other => Err(DomainError::InvalidSide(other.to_string())),
        }
    }
}

/// Which hands take part in the task. Resolved once at configure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveSides {
    Right,
    Left,
    Both,
}

impl ActiveSides {
    /// Sides to open, in configure order (right first, as the arms are homed)
    pub fn sides(&self) -> &'static [Side] {
        match self {
            ActiveSides::Right => &[Side::Right],
            ActiveSides::Left => &[Side::Left],
            ActiveSides::Both => &[Side::Right, Side::Left],
        }
    }

    pub fn contains(&self, side: Side) -> bool {
        self.sides().contains(&side)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveSides::Right => "right",
            ActiveSides::Left => "left",
            ActiveSides::Both => "both",
        }
    }
}

impl std::fmt::Display for ActiveSides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActiveSides {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right" => Ok(ActiveSides::Right),
            "left" => Ok(ActiveSides::Left),
            "both" => Ok(ActiveSides::Both),
            other => Err(DomainError::InvalidSide(other.to_string())),
        }
    }
}

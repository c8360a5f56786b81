// Execution Plan Domain Model

use serde::{Deserialize, Serialize};

use super::pose::{HomePose, Waypoint};
use super::trajectory::Trajectory;

/// Plan identifier (UUID v4, for log correlation)
pub type PlanId = String;

/// Phase a plan step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Approaching,
    Lifting,
    Retreating,
    Homing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Approaching => write!(f, "APPROACHING"),
            Phase::Lifting => write!(f, "LIFTING"),
            Phase::Retreating => write!(f, "RETREATING"),
            Phase::Homing => write!(f, "HOMING"),
        }
    }
}

/// Sequencer state for one side as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencerState {
    Idle,
    Approaching,
    Lifting,
    Retreating,
    Homing,
}

impl From<Phase> for SequencerState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Approaching => SequencerState::Approaching,
            Phase::Lifting => SequencerState::Lifting,
            Phase::Retreating => SequencerState::Retreating,
            Phase::Homing => SequencerState::Homing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub waypoint: Waypoint,
    pub phase: Phase,
}

/// The side-specific path actually walked:
/// approach (N) + lift (2) + retreat (N-1) + home (1).
///
/// With no approach waypoints the lift is anchored on the home pose,
/// which yields exactly three steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    id: PlanId,
    steps: Vec<PlanStep>,
    approach_len: usize,
}

impl ExecutionPlan {
    pub fn assemble(
        id: impl Into<PlanId>,
        approach: &Trajectory,
        home: &HomePose,
        lift_z: f64,
    ) -> Self {
        let home_waypoint = home.waypoint();
        let anchor = approach.last().copied().unwrap_or(home_waypoint);
        let approach_len = approach.len();

        let mut steps = Vec::with_capacity(2 * approach_len + 2);
        steps.extend(approach.waypoints().iter().map(|w| PlanStep {
            waypoint: *w,
            phase: Phase::Approaching,
        }));

        steps.push(PlanStep {
            waypoint: anchor.raised(lift_z),
            phase: Phase::Lifting,
        });
        steps.push(PlanStep {
            waypoint: anchor,
            phase: Phase::Lifting,
        });

        // Walk back, skipping the last approach point (already there)
        steps.extend(
            approach
                .waypoints()
                .iter()
                .rev()
                .skip(1)
                .map(|w| PlanStep {
                    waypoint: *w,
                    phase: Phase::Retreating,
                }),
        );

        steps.push(PlanStep {
            waypoint: home_waypoint,
            phase: Phase::Homing,
        });

        Self {
            id: id.into(),
            steps,
            approach_len,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    pub fn phase_of(&self, index: usize) -> Option<Phase> {
        self.step(index).map(|s| s.phase)
    }

    pub fn approach_len(&self) -> usize {
        self.approach_len
    }

    /// Index of the last approach waypoint, where the hand closes.
    /// None when there is nothing to approach.
    pub fn grasp_index(&self) -> Option<usize> {
        self.approach_len.checked_sub(1)
    }

    /// Index at which the hand opens: `offset` steps past the grasp index
    pub fn release_index(&self, offset: usize) -> Option<usize> {
        self.grasp_index()
            .map(|g| g + offset)
            .filter(|&i| i < self.steps.len())
    }
}

// Pose/Trajectory Store
//
// Shared between the external planner (writer) and the sequencer tick
// (reader). A single lock guards the configuration and both trajectories;
// every accessor takes it for the copy only, so it is never held across a
// motion call.

use std::sync::Mutex;

use crate::domain::{HomePose, OperatingConfig, Side, Trajectory};
use crate::error::Result;

struct StoreInner {
    config: OperatingConfig,
    right: Trajectory,
    left: Trajectory,
}

/// Everything the sequencer needs to assemble a plan for one side
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub approach: Trajectory,
    pub home: HomePose,
    pub lift_z: f64,
    pub release_offset: usize,
}

pub struct PoseStore {
    inner: Mutex<StoreInner>,
}

impl PoseStore {
    pub fn new(config: OperatingConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                config,
                right: Trajectory::empty(),
                left: Trajectory::empty(),
            }),
        }
    }

    pub fn operating_config(&self) -> Result<OperatingConfig> {
        Ok(self.inner.lock()?.config.clone())
    }

    pub fn set_operating_config(&self, config: OperatingConfig) -> Result<()> {
        self.inner.lock()?.config = config;
        Ok(())
    }

    /// Replace both trajectories wholesale
    pub fn set_trajectories(&self, right: Trajectory, left: Trajectory) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.right = right;
        inner.left = left;
        Ok(())
    }

    pub fn trajectory(&self, side: Side) -> Result<Trajectory> {
        let inner = self.inner.lock()?;
        Ok(match side {
            Side::Right => inner.right.clone(),
            Side::Left => inner.left.clone(),
        })
    }

    /// Consistent snapshot taken under one lock acquisition
    pub fn plan_inputs(&self, side: Side) -> Result<PlanInputs> {
        let inner = self.inner.lock()?;
        let approach = match side {
            Side::Right => inner.right.clone(),
            Side::Left => inner.left.clone(),
        };
        Ok(PlanInputs {
            approach,
            home: inner.config.home(side),
            lift_z: inner.config.lift_z,
            release_offset: inner.config.release_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::resolve;
    use crate::domain::Waypoint;
    use std::sync::Arc;

    fn one_point(x: f64) -> Trajectory {
        Trajectory::new(vec![Waypoint::from_slice(&[x, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap()])
    }

    #[test]
    fn test_set_trajectories_replaces_both_sides() {
        let store = PoseStore::new(resolve(&serde_json::json!({})));
        store.set_trajectories(one_point(1.0), one_point(2.0)).unwrap();
        store.set_trajectories(Trajectory::empty(), one_point(3.0)).unwrap();

        assert!(store.trajectory(Side::Right).unwrap().is_empty());
        assert_eq!(store.trajectory(Side::Left).unwrap(), one_point(3.0));
    }

    #[test]
    fn test_plan_inputs_follow_config() {
        let store = PoseStore::new(resolve(&serde_json::json!({ "lift_z": 0.2 })));
        store.set_trajectories(one_point(1.0), Trajectory::empty()).unwrap();

        let inputs = store.plan_inputs(Side::Left).unwrap();
        assert!(inputs.approach.is_empty());
        assert_eq!(inputs.home, HomePose::LEFT_DEFAULT);
        assert_eq!(inputs.lift_z, 0.2);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = Arc::new(PoseStore::new(resolve(&serde_json::json!({}))));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.set_trajectories(one_point(i as f64), one_point(i as f64)).unwrap();
                        let inputs = store.plan_inputs(Side::Right).unwrap();
                        assert_eq!(inputs.approach.len(), 1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }
}

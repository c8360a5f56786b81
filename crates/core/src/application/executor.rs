//! Grasp Executor - lifecycle and per-tick stepping for one or two arms
//!
//! `configure` opens and homes every active side, `execute_trajectory`
//! advances one side by a single waypoint, `release` tears everything down.
//! Each side sits behind its own async mutex, so the two arms can be driven
//! concurrently while commands on the same arm stay serialized.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::config::{resolve, to_options};
use super::constants::motion_timeout;
use super::motion::reach;
use super::pose_store::PoseStore;
use super::sequencer::HandEvent;
use super::side_context::SideContext;
use crate::domain::{
    ExecutionPlan, OperatingConfig, PlanStep, SequencerState, Side, Trajectory, TrajectoryFeed,
};
use crate::error::{AppError, Result};
use crate::port::{
    BackendError, FingerSelector, GraspBackend, GraspBackendFactory, GraspParams, IdProvider,
    MotionBackendFactory, ReportSink, TimeProvider, CLOSE_HAND, OPEN_HAND,
};

/// Collaborators injected at construction
#[derive(Clone)]
pub struct ExecutorPorts {
    pub motion: Arc<dyn MotionBackendFactory>,
    /// Required only when grasping is enabled
    pub grasp: Option<Arc<dyn GraspBackendFactory>>,
    pub reports: Arc<dyn ReportSink>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub id_provider: Arc<dyn IdProvider>,
}

/// Hand-action settings
#[derive(Debug, Clone, Default)]
pub struct GraspSettings {
    pub enabled: bool,
    pub params: GraspParams,
    pub model_file_right: Option<String>,
    pub model_file_left: Option<String>,
}

impl GraspSettings {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(params: GraspParams) -> Self {
        Self {
            enabled: true,
            params,
            ..Self::default()
        }
    }

    fn model_file(&self, side: Side) -> Option<&str> {
        match side {
            Side::Right => self.model_file_right.as_deref(),
            Side::Left => self.model_file_left.as_deref(),
        }
    }
}

struct SideSlot {
    side: Side,
    /// Set by `stop`; consumed by the next step of this side
    skip: AtomicBool,
    context: Mutex<SideContext>,
}

pub struct GraspExecutor {
    ports: ExecutorPorts,
    grasp: GraspSettings,
    store: Arc<PoseStore>,
    sides: Vec<SideSlot>,
}

impl GraspExecutor {
    pub fn new(ports: ExecutorPorts, grasp: GraspSettings) -> Self {
        Self {
            ports,
            grasp,
            store: Arc::new(PoseStore::new(resolve(&Value::Null))),
            sides: Vec::new(),
        }
    }

    /// Store shared with the external planner
    pub fn pose_store(&self) -> Arc<PoseStore> {
        Arc::clone(&self.store)
    }

    pub fn is_configured(&self) -> bool {
        !self.sides.is_empty()
    }

    pub fn active_sides(&self) -> Vec<Side> {
        self.sides.iter().map(|s| s.side).collect()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Resolve options, open and home every active arm, open and calibrate
    /// the hands when grasping is enabled.
    ///
    /// On failure every side opened so far is released again.
    pub async fn configure(&mut self, raw_options: &Value) -> Result<()> {
        if self.is_configured() {
            return Err(AppError::InvalidState("executor already configured".into()));
        }

        let config = resolve(raw_options);
        self.store.set_operating_config(config.clone())?;

        info!(
            robot = %config.robot,
            hand = %config.active_sides,
            traj_time = config.traj_time,
            traj_tol = config.traj_tol,
            lift_z = config.lift_z,
            grasp = self.grasp.enabled,
            "Configuring grasp execution"
        );

        let mut opened: Vec<SideContext> = Vec::new();
        for &side in config.active_sides.sides() {
            match self.open_side(side, &config).await {
                Ok(context) => opened.push(context),
                Err(e) => {
                    error!(side = %side, error = %e, "Configuration failed");
                    for context in opened.iter_mut() {
                        if let Err(release_err) = context.release().await {
                            warn!(side = %context.side(), error = %release_err, "Rollback incomplete");
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.sides = opened
            .into_iter()
            .map(|context| SideSlot {
                side: context.side(),
                skip: AtomicBool::new(false),
                context: Mutex::new(context),
            })
            .collect();

        info!(sides = ?self.active_sides(), "Grasp execution configured");
        Ok(())
    }

    async fn open_side(&self, side: Side, config: &OperatingConfig) -> Result<SideContext> {
        let motion = self
            .ports
            .motion
            .open(config.robot, side)
            .await
            .map_err(|e| AppError::DeviceUnavailable {
                side,
                reason: e.to_string(),
            })?;

        let restore_token = match motion.save_context().await {
            Ok(token) => token,
            Err(e) => {
                let _ = motion.close().await;
                return Err(e.into());
            }
        };

        let mut context = SideContext::new(side, motion, restore_token);
        match self.prepare_side(&mut context, config).await {
            Ok(()) => Ok(context),
            Err(e) => {
                if let Err(release_err) = context.release().await {
                    warn!(side = %side, error = %release_err, "Rollback incomplete");
                }
                Err(e)
            }
        }
    }

    async fn prepare_side(&self, context: &mut SideContext, config: &OperatingConfig) -> Result<()> {
        let side = context.side();
        {
            let motion = context.motion()?;
            motion.set_trajectory_time(config.traj_time).await?;
            motion.set_in_target_tolerance(config.traj_tol).await?;

            info!(side = %side, "Homing arm");
            let report = reach(
                motion,
                side,
                None,
                &config.home(side).waypoint(),
                motion_timeout(config.traj_time),
                self.ports.time_provider.as_ref(),
            )
            .await?;
            self.ports.reports.publish(&report);
        }

        if self.grasp.enabled {
            let hand = self.open_hand(side).await?;
            context.attach_grasp(hand);
        }
        Ok(())
    }

    async fn open_hand(&self, side: Side) -> Result<Box<dyn GraspBackend>> {
        let factory = self.ports.grasp.as_ref().ok_or_else(|| {
            AppError::Config("grasping enabled without a grasp backend".into())
        })?;

        let params = self.grasp.params.for_side(side, self.grasp.model_file(side));
        let hand = factory.open(&params).await.map_err(|e| match e {
            BackendError::InvalidModel(reason) => AppError::InvalidGraspModel { side, reason },
            other => AppError::DeviceUnavailable {
                side,
                reason: other.to_string(),
            },
        })?;

        debug!(side = %side, keys = ?hand.hand_sequence_keys(), "Available hand sequences");

        if let Err(e) = calibrate_model(side, hand.as_ref()).await {
            let _ = hand.close().await;
            return Err(e);
        }
        Ok(hand)
    }

    // ------------------------------------------------------------------
    // Parameters and trajectories
    // ------------------------------------------------------------------

    pub fn operating_config(&self) -> Result<OperatingConfig> {
        self.store.operating_config()
    }

    /// Current parameters as an options bag
    pub fn pose_parameters(&self) -> Result<Value> {
        Ok(to_options(&self.store.operating_config()?))
    }

    /// Re-resolve options after configure. Robot and hands stay as opened;
    /// the rest applies to the next motion or plan.
    pub fn set_pose_parameters(&self, raw_options: &Value) -> Result<()> {
        let current = self.store.operating_config()?;
        let mut updated = resolve(raw_options);

        if self.is_configured()
            && (updated.robot != current.robot || updated.active_sides != current.active_sides)
        {
            warn!(
                robot = %current.robot,
                hand = %current.active_sides,
                "Robot and hand are fixed once configured; keeping current values"
            );
            updated.robot = current.robot;
            updated.active_sides = current.active_sides;
        }

        self.store.set_operating_config(updated)
    }

    pub fn set_trajectories(&self, right: Trajectory, left: Trajectory) -> Result<()> {
        self.store.set_trajectories(right, left)
    }

    pub fn set_trajectory_feed(&self, feed: TrajectoryFeed) -> Result<()> {
        let (right, left) = feed.into_trajectories()?;
        info!(right = right.len(), left = left.len(), "Trajectories updated");
        self.store.set_trajectories(right, left)
    }

    // ------------------------------------------------------------------
    // Sequencing
    // ------------------------------------------------------------------

    /// Advance `side` by one waypoint. Returns true once the whole plan
    /// (approach, lift, retreat, home) has completed.
    ///
    /// A waypoint that is not reached, or a hand action that does not
    /// complete, leaves the cursor in place; calling again retries it.
    ///
    /// # Errors
    /// - AppError::InvalidState if `side` is not configured or was released
    pub async fn execute_trajectory(&self, side: Side) -> Result<bool> {
        let slot = self.slot(side)?;
        let mut context = slot.context.lock().await;
        if context.is_released() {
            return Err(AppError::InvalidState(format!("{} arm already released", side)));
        }

        if context.sequencer.is_idle() {
            let inputs = self.store.plan_inputs(side)?;
            let plan = ExecutionPlan::assemble(
                self.ports.id_provider.generate_id(),
                &inputs.approach,
                &inputs.home,
                inputs.lift_z,
            );
            log_plan(side, &plan);
            context.sequencer.begin(plan, inputs.release_offset);
            // A stop issued while idle has nothing to skip
            slot.skip.store(false, Ordering::SeqCst);
        }

        let (index, step) = context
            .sequencer
            .current()
            .ok_or_else(|| AppError::Internal("sequencer started without a step".into()))?;

        let reached = if slot.skip.swap(false, Ordering::SeqCst) {
            info!(side = %side, index, "Waypoint skipped on stop request");
            true
        } else {
            let event = context.sequencer.hand_event(index);
            // A stop that arrived mid-motion applies to this step only
            let outcome = self.perform_step(&context, index, &step, event).await;
            let stopped = slot.skip.swap(false, Ordering::SeqCst);
            match outcome {
                Ok(()) => true,
                Err(e) => {
                    warn!(side = %side, index, error = %e, "Waypoint not reached, will retry");
                    stopped
                }
            }
        };

        if !reached {
            return Ok(false);
        }

        let complete = context.sequencer.complete_step();
        if complete {
            info!(side = %side, "Plan completed");
        }
        Ok(complete)
    }

    async fn perform_step(
        &self,
        context: &SideContext,
        index: usize,
        step: &PlanStep,
        event: Option<HandEvent>,
    ) -> Result<()> {
        let side = context.side();
        let traj_time = self.store.operating_config()?.traj_time;

        debug!(side = %side, index, phase = %step.phase, "Executing waypoint");
        let report = reach(
            context.motion()?,
            side,
            Some(index),
            &step.waypoint,
            motion_timeout(traj_time),
            self.ports.time_provider.as_ref(),
        )
        .await?;
        self.ports.reports.publish(&report);

        if let (Some(event), Some(hand)) = (event, context.grasp()) {
            run_hand_event(side, hand, event).await?;
        }
        Ok(())
    }

    /// Close the hand on `side` and wait for completion
    pub async fn grasp_object(&self, side: Side) -> Result<()> {
        self.hand_action(side, HandEvent::Grasp).await
    }

    /// Open the hand on `side` and wait for completion
    pub async fn release_object(&self, side: Side) -> Result<()> {
        self.hand_action(side, HandEvent::Release).await
    }

    async fn hand_action(&self, side: Side, event: HandEvent) -> Result<()> {
        let context = self.slot(side)?.context.lock().await;
        let hand = context
            .grasp()
            .ok_or_else(|| AppError::InvalidState(format!("no hand open on {} side", side)))?;
        run_hand_event(side, hand, event).await
    }

    /// Out-of-plan move to the home pose; leaves the cursor untouched
    pub async fn go_home(&self, side: Side) -> Result<()> {
        let config = self.store.operating_config()?;
        let context = self.slot(side)?.context.lock().await;
        let home = config.home(side);

        info!(side = %side, home = %home.waypoint(), "Going back home");
        let report = reach(
            context.motion()?,
            side,
            None,
            &home.waypoint(),
            motion_timeout(config.traj_time),
            self.ports.time_provider.as_ref(),
        )
        .await?;
        self.ports.reports.publish(&report);
        Ok(())
    }

    /// Treat the in-flight step of every side as reached: the next call
    /// advances past it instead of retrying. Motion is not interrupted.
    pub fn stop(&self) {
        for slot in &self.sides {
            slot.skip.store(true, Ordering::SeqCst);
        }
        info!("Stop requested: current waypoints will be skipped");
    }

    /// Cursor of `side`; None when idle
    pub async fn cursor(&self, side: Side) -> Result<Option<usize>> {
        let context = self.slot(side)?.context.lock().await;
        Ok(context.sequencer.cursor().index())
    }

    /// Phase of the step `side` is on; Idle between plans
    pub async fn phase(&self, side: Side) -> Result<SequencerState> {
        let context = self.slot(side)?.context.lock().await;
        Ok(context.sequencer.state())
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Stop motion, restore the configure-time contexts and close every
    /// handle. Sides already released are skipped.
    pub async fn release(&self) -> Result<()> {
        let mut first_err = None;
        for slot in &self.sides {
            let mut context = slot.context.lock().await;
            if context.is_released() {
                continue;
            }
            if let Err(e) = context.release().await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn slot(&self, side: Side) -> Result<&SideSlot> {
        self.sides
            .iter()
            .find(|s| s.side == side)
            .ok_or_else(|| AppError::InvalidState(format!("{} side not configured", side)))
    }
}

/// Configure-time calibration protocol.
///
/// No model: nothing to calibrate. Uncalibrated: calibrate all fingers.
/// Already calibrated: refused, matching the controller software this
/// replaces; see DESIGN.md.
async fn calibrate_model(side: Side, hand: &dyn GraspBackend) -> Result<()> {
    match hand.model() {
        None => {
            debug!(side = %side, "No grasp model, skipping calibration");
            Ok(())
        }
        Some(model) if !model.is_calibrated() => {
            info!(side = %side, "Calibrating grasp model");
            model
                .calibrate(FingerSelector::All)
                .await
                .map_err(|e| AppError::InvalidGraspModel {
                    side,
                    reason: e.to_string(),
                })
        }
        Some(_) => {
            warn!(side = %side, "Grasp model already calibrated; configuration refused");
            Err(AppError::InvalidGraspModel {
                side,
                reason: "model already calibrated".into(),
            })
        }
    }
}

async fn run_hand_event(side: Side, hand: &dyn GraspBackend, event: HandEvent) -> Result<()> {
    let action = match event {
        HandEvent::Grasp => CLOSE_HAND,
        HandEvent::Release => OPEN_HAND,
    };
    info!(side = %side, action, "Running hand action");

    hand.push_action(action).await?;
    if !hand.wait_actions_done().await? {
        return Err(AppError::ActionNotCompleted {
            side,
            action: action.to_string(),
        });
    }
    Ok(())
}

fn log_plan(side: Side, plan: &ExecutionPlan) {
    debug!(side = %side, plan_id = %plan.id(), steps = plan.len(), "Complete trajectory");
    for (k, step) in plan.steps().iter().enumerate() {
        debug!(side = %side, index = k, phase = %step.phase, waypoint = %step.waypoint, "Plan waypoint");
    }
}

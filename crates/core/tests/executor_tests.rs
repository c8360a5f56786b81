// Executor Tests
// Sequencing, hand events and lifecycle against the port mocks

use graspexec_core::application::{ExecutorPorts, GraspExecutor, GraspSettings};
use graspexec_core::domain::{HomePose, SequencerState, Side, Trajectory, Waypoint};
use graspexec_core::error::AppError;
use graspexec_core::port::grasp_backend::mocks::{MockGraspFactory, ModelSetup};
use graspexec_core::port::id_provider::mocks::SequentialIdProvider;
use graspexec_core::port::motion_backend::mocks::{MockMotionFactory, MotionCall};
use graspexec_core::port::report_sink::mocks::CollectingReportSink;
use graspexec_core::port::time_provider::mocks::FixedTimeProvider;
use graspexec_core::port::{
    ContextToken, FingerSelector, GraspBackend, GraspParams, MotionBackend, CLOSE_HAND, OPEN_HAND,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    executor: GraspExecutor,
    motion: Arc<MockMotionFactory>,
    hands: Arc<MockGraspFactory>,
    reports: Arc<CollectingReportSink>,
}

fn rig_with(grasp: bool, hands: MockGraspFactory) -> Rig {
    let motion = Arc::new(MockMotionFactory::new());
    let hands = Arc::new(hands);
    let reports = Arc::new(CollectingReportSink::new());

    let ports = ExecutorPorts {
        motion: motion.clone(),
        grasp: Some(hands.clone()),
        reports: reports.clone(),
        time_provider: Arc::new(FixedTimeProvider::new(1_000)),
        id_provider: Arc::new(SequentialIdProvider::new()),
    };
    let settings = if grasp {
        GraspSettings {
            model_file_right: Some("grasp_model_right.ini".to_string()),
            model_file_left: Some("grasp_model_left.ini".to_string()),
            ..GraspSettings::enabled(GraspParams::default())
        }
    } else {
        GraspSettings::disabled()
    };

    Rig {
        executor: GraspExecutor::new(ports, settings),
        motion,
        hands,
        reports,
    }
}

fn rig(grasp: bool) -> Rig {
    rig_with(grasp, MockGraspFactory::new())
}

fn trajectory(points: &[[f64; 6]]) -> Trajectory {
    points
        .iter()
        .map(|p| Waypoint::from_slice(p).unwrap())
        .collect::<Vec<_>>()
        .into()
}

/// The two-point right trajectory [(0,0,0,0,0,0), (1,0,0,0,0,0)]
fn two_points() -> Trajectory {
    trajectory(&[[0.0; 6], [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]])
}

async fn configured(grasp: bool, hand: &str) -> Rig {
    let mut rig = rig(grasp);
    rig.executor.configure(&json!({ "hand": hand })).await.unwrap();
    rig
}

#[tokio::test]
async fn test_configure_homes_inside_a_motion_transaction() {
    let rig = configured(false, "right").await;
    let right = rig.motion.backend(Side::Right);

    let home = HomePose::RIGHT_DEFAULT.waypoint().target();
    assert_eq!(
        right.calls(),
        vec![
            MotionCall::SaveContext(ContextToken(1)),
            MotionCall::SetTrajectoryTime(2.0),
            MotionCall::SetInTargetTolerance(0.005),
            MotionCall::SaveContext(ContextToken(2)),
            MotionCall::Restrict,
            MotionCall::MoveTo(home),
            MotionCall::WaitMotionDone,
            MotionCall::CurrentPose,
            MotionCall::RestoreContext(ContextToken(2)),
        ]
    );
    assert_eq!(rig.executor.active_sides(), vec![Side::Right]);
    assert!(!rig.motion.backend(Side::Left).is_open());
    assert_eq!(rig.reports.reports().len(), 1);
    assert_eq!(rig.reports.reports()[0].index, None);
}

#[tokio::test]
async fn test_two_point_plan_completes_in_six_calls() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();

    let mut calls = 0;
    while !rig.executor.execute_trajectory(Side::Right).await.unwrap() {
        calls += 1;
        assert!(calls < 20, "plan never completed");
    }
    calls += 1;

    assert_eq!(calls, 6);
    // Homing + six plan steps
    assert_eq!(rig.motion.backend(Side::Right).targets().len(), 7);
}

#[tokio::test]
async fn test_cursor_increases_by_one_then_resets() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();

    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), None);

    for expected in 1..6 {
        assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
        assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(expected));
    }

    assert!(rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), None);
    assert_eq!(rig.executor.phase(Side::Right).await.unwrap(), SequencerState::Idle);
}

#[tokio::test]
async fn test_failed_move_stalls_and_retries_same_waypoint() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(2));

    right.clear_calls();
    right.fail_next_moves(3);
    for _ in 0..3 {
        assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
        assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(2));
    }

    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(3));

    // Every attempt targeted the raised lift point
    let lift = two_points().last().unwrap().raised(0.15).target();
    assert_eq!(right.targets(), vec![lift; 4]);
}

#[tokio::test]
async fn test_grasp_at_last_approach_and_release_after_descent() {
    let rig = configured(true, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let hand = rig.hands.backend(Side::Right);

    let mut actions_after_step = Vec::new();
    loop {
        let step = rig.executor.cursor(Side::Right).await.unwrap().unwrap_or(0);
        let done = rig.executor.execute_trajectory(Side::Right).await.unwrap();
        actions_after_step.push((step, hand.actions()));
        if done {
            break;
        }
    }

    let close = vec![CLOSE_HAND.to_string()];
    let both = vec![CLOSE_HAND.to_string(), OPEN_HAND.to_string()];
    assert_eq!(actions_after_step[0], (0, vec![]));
    assert_eq!(actions_after_step[1], (1, close.clone()));
    assert_eq!(actions_after_step[2], (2, close));
    assert_eq!(actions_after_step[3], (3, both.clone()));
    assert_eq!(actions_after_step[5], (5, both));
}

#[tokio::test]
async fn test_failed_grasp_keeps_cursor_and_retries() {
    let rig = configured(true, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let hand = rig.hands.backend(Side::Right);

    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    hand.fail_next_actions(1);

    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(1));

    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(2));
    assert_eq!(hand.actions(), vec![CLOSE_HAND, CLOSE_HAND]);
}

#[tokio::test]
async fn test_empty_trajectory_runs_three_steps_without_hand_events() {
    let rig = configured(true, "right").await;

    let mut calls = 1;
    while !rig.executor.execute_trajectory(Side::Right).await.unwrap() {
        calls += 1;
    }

    assert_eq!(calls, 3);
    assert!(rig.hands.backend(Side::Right).actions().is_empty());
}

#[tokio::test]
async fn test_completed_plan_restarts_identically() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    right.clear_calls();
    while !rig.executor.execute_trajectory(Side::Right).await.unwrap() {}
    let first = right.targets();

    right.clear_calls();
    while !rig.executor.execute_trajectory(Side::Right).await.unwrap() {}

    assert_eq!(right.targets(), first);
}

#[tokio::test]
async fn test_trajectory_update_applies_to_next_plan_only() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    rig.executor
        .set_trajectories(trajectory(&[[5.0, 0.0, 0.0, 0.0, 0.0, 0.0]]), Trajectory::empty())
        .unwrap();

    right.clear_calls();
    while !rig.executor.execute_trajectory(Side::Right).await.unwrap() {}

    // Remaining five steps of the original six-step plan
    assert_eq!(right.targets().len(), 5);
    assert_eq!(right.targets()[0].position, [1.0, 0.0, 0.0]);
}

#[tokio::test]
async fn test_stop_skips_current_waypoint() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    right.clear_calls();

    rig.executor.stop();
    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());

    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(2));
    assert!(right.targets().is_empty());
}

#[tokio::test]
async fn test_stop_advances_past_a_stalled_waypoint() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    right.set_unreachable(true);
    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(0));

    rig.executor.stop();
    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_stop_during_a_settling_move_does_not_skip_the_next_waypoint() {
    let rig = configured(true, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);
    right.set_settle_delay(Duration::from_millis(200));

    let (step, ()) = tokio::join!(rig.executor.execute_trajectory(Side::Right), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        rig.executor.stop();
    });
    assert!(!step.unwrap());
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(1));

    right.set_settle_delay(Duration::ZERO);
    right.clear_calls();
    assert!(!rig.executor.execute_trajectory(Side::Right).await.unwrap());

    // Last approach point is still commanded and grasped
    assert_eq!(right.targets().len(), 1);
    assert_eq!(right.targets()[0].position, [1.0, 0.0, 0.0]);
    assert_eq!(rig.hands.backend(Side::Right).actions(), vec![CLOSE_HAND]);
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_stop_while_idle_is_discarded() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);
    right.clear_calls();

    rig.executor.stop();
    rig.executor.execute_trajectory(Side::Right).await.unwrap();

    assert_eq!(right.targets().len(), 1);
}

#[tokio::test]
async fn test_go_home_leaves_cursor_untouched() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    let right = rig.motion.backend(Side::Right);

    rig.executor.execute_trajectory(Side::Right).await.unwrap();
    right.clear_calls();
    rig.executor.go_home(Side::Right).await.unwrap();

    assert_eq!(
        right.targets(),
        vec![HomePose::RIGHT_DEFAULT.waypoint().target()]
    );
    assert_eq!(right.calls().first(), Some(&MotionCall::SaveContext(ContextToken(4))));
    assert_eq!(rig.executor.cursor(Side::Right).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_go_home_reports_unreached_motion() {
    let rig = configured(false, "left").await;
    rig.motion.backend(Side::Left).fail_next_moves(1);

    let err = rig.executor.go_home(Side::Left).await.unwrap_err();
    assert!(matches!(err, AppError::MotionNotReached { side: Side::Left, .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_release_restores_saved_context_and_closes_handles() {
    let rig = configured(true, "both").await;
    let right = rig.motion.backend(Side::Right);
    let left = rig.motion.backend(Side::Left);

    tokio_test::assert_ok!(rig.executor.release().await);

    for arm in [&right, &left] {
        let calls = arm.calls();
        assert_eq!(
            calls[calls.len() - 3..],
            [
                MotionCall::Stop,
                MotionCall::RestoreContext(ContextToken(1)),
                MotionCall::Close,
            ]
        );
        assert!(!arm.is_open());
    }
    assert!(!rig.hands.backend(Side::Right).is_open());
    assert!(!rig.hands.backend(Side::Left).is_open());

    // Second release is a no-op
    tokio_test::assert_ok!(rig.executor.release().await);
    assert_eq!(right.calls().last(), Some(&MotionCall::Close));

    let err = rig.executor.execute_trajectory(Side::Right).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_both_sides_run_concurrently() {
    let rig = configured(true, "both").await;
    rig.executor
        .set_trajectories(two_points(), trajectory(&[[-0.3, -0.1, 0.0, 0.0, 0.0, 0.0]]))
        .unwrap();

    let drive = |side: Side| {
        let executor = &rig.executor;
        async move {
            let mut calls = 1;
            while !executor.execute_trajectory(side).await.unwrap() {
                calls += 1;
            }
            calls
        }
    };
    let (right_calls, left_calls) = tokio::join!(drive(Side::Right), drive(Side::Left));

    assert_eq!(right_calls, 6);
    assert_eq!(left_calls, 4);
    // Left plan: 1 approach + 2 lift + 0 retreat + home
    assert_eq!(rig.motion.backend(Side::Left).targets().len(), 1 + 4);
    assert_eq!(rig.hands.backend(Side::Left).actions(), vec![CLOSE_HAND, OPEN_HAND]);
}

#[tokio::test]
async fn test_unconfigured_side_is_rejected() {
    let rig = configured(false, "left").await;

    let err = rig.executor.execute_trajectory(Side::Right).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_configure_twice_is_rejected() {
    let mut rig = configured(false, "right").await;
    let err = rig.executor.configure(&json!({})).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_unavailable_arm_fails_configure_and_rolls_back() {
    let mut rig = rig(false);
    rig.motion.make_unavailable(Side::Left);

    let err = rig.executor.configure(&json!({ "hand": "both" })).await.unwrap_err();

    assert!(matches!(err, AppError::DeviceUnavailable { side: Side::Left, .. }));
    let right = rig.motion.backend(Side::Right);
    assert!(!right.is_open());
    assert!(right.calls().contains(&MotionCall::RestoreContext(ContextToken(1))));
    assert!(!rig.executor.is_configured());
}

#[tokio::test]
async fn test_uncalibrated_model_is_calibrated_with_all_fingers() {
    let rig = configured(true, "right").await;

    let model = rig.hands.backend(Side::Right).mock_model().unwrap();
    assert_eq!(model.calibrations(), vec![FingerSelector::All]);
}

#[tokio::test]
async fn test_missing_model_configures_without_calibration() {
    let mut rig = rig_with(
        true,
        MockGraspFactory::new().with_model(Side::Right, ModelSetup::Missing),
    );
    rig.executor.configure(&json!({ "hand": "right" })).await.unwrap();
    assert!(rig.hands.backend(Side::Right).is_open());
}

#[tokio::test]
async fn test_already_calibrated_model_fails_configure() {
    let mut rig = rig_with(
        true,
        MockGraspFactory::new().with_model(Side::Left, ModelSetup::Calibrated),
    );

    let err = rig.executor.configure(&json!({ "hand": "both" })).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidGraspModel { side: Side::Left, .. }));
    assert!(!rig.hands.backend(Side::Left).is_open());
    assert!(!rig.hands.backend(Side::Right).is_open());
    assert!(!rig.motion.backend(Side::Right).is_open());
    assert!(!rig.motion.backend(Side::Left).is_open());
}

#[tokio::test]
async fn test_rejected_grasp_params_fail_configure() {
    let mut rig = rig_with(true, MockGraspFactory::new().rejecting(Side::Right));

    let err = rig.executor.configure(&json!({ "hand": "right" })).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidGraspModel { side: Side::Right, .. }));
}

#[tokio::test]
async fn test_each_hand_gets_its_own_part_and_model_file() {
    let rig = configured(true, "both").await;

    let opened = rig.hands.opened_params();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].part, "right_arm");
    assert_eq!(opened[0].grasp_model_file.as_deref(), Some("grasp_model_right.ini"));
    assert_eq!(opened[1].part, "left_arm");
    assert_eq!(opened[1].grasp_model_file.as_deref(), Some("grasp_model_left.ini"));
}

#[tokio::test]
async fn test_reports_carry_plan_index_and_errors() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();

    rig.executor.execute_trajectory(Side::Right).await.unwrap();

    let reports = rig.reports.reports();
    let last = reports.last().unwrap();
    assert_eq!(last.side, Side::Right);
    assert_eq!(last.index, Some(0));
    assert_eq!(last.position_error, 0.0);
    assert_eq!(last.reported_at, 1_000);
}

#[tokio::test]
async fn test_pose_parameters_keep_robot_and_hand_after_configure() {
    let rig = configured(false, "right").await;

    rig.executor
        .set_pose_parameters(&json!({ "robot": "icub", "hand": "both", "lift_z": 0.25 }))
        .unwrap();

    let params = rig.executor.pose_parameters().unwrap();
    assert_eq!(params["robot"], "icubSim");
    assert_eq!(params["hand"], "right");
    assert_eq!(params["lift_z"], 0.25);
}

#[tokio::test]
async fn test_lift_height_change_applies_to_next_plan() {
    let rig = configured(false, "right").await;
    rig.executor.set_trajectories(two_points(), Trajectory::empty()).unwrap();
    rig.executor.set_pose_parameters(&json!({ "lift_z": 0.3 })).unwrap();
    let right = rig.motion.backend(Side::Right);
    right.clear_calls();

    for _ in 0..3 {
        rig.executor.execute_trajectory(Side::Right).await.unwrap();
    }

    assert_eq!(right.targets()[2].position, [1.0, 0.0, 0.3]);
}

#[tokio::test]
async fn test_grasp_object_requires_open_hand() {
    let rig = configured(false, "right").await;

    let err = rig.executor.grasp_object(Side::Right).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_release_object_reports_incomplete_action() {
    let rig = configured(true, "left").await;
    rig.hands.backend(Side::Left).fail_next_actions(1);

    let err = rig.executor.release_object(Side::Left).await.unwrap_err();
    assert!(matches!(err, AppError::ActionNotCompleted { side: Side::Left, .. }));
    rig.executor.release_object(Side::Left).await.unwrap();
}

//! Docking controller driven by hand-fed marker sequences.

mod common;

use std::f32::consts::PI;

use common::{MarkerFeed, TICK};
use dhruva_dock::config::DockingConfig;
use dhruva_dock::control::{DockState, DockStatus, DockTarget, DockingController, DockingStep};
use dhruva_dock::sensors::{MarkerBatch, MarkerDetection, SensorSnapshot};
use dhruva_dock::types::Pose2D;

fn start(is_home: bool) -> (DockingController, MarkerFeed) {
    let feed = MarkerFeed::new(1);
    let mut dock = DockingController::new(DockingConfig::default());
    dock.start(
        DockTarget {
            marker_id: 1,
            is_home,
            dock_pose: Some(Pose2D::new(2.77, 1.0, 0.0)),
        },
        feed.now,
    );
    (dock, feed)
}

fn step(
    dock: &mut DockingController,
    feed: &mut MarkerFeed,
    marker: Option<(f32, f32)>,
) -> DockingStep {
    dock.update(&feed.next(marker))
}

/// Head-on, aligned: straight through to MOVE_PERF.
fn into_move_perf(dock: &mut DockingController, feed: &mut MarkerFeed) {
    for _ in 0..3 {
        step(dock, feed, Some((0.0, 1.2)));
    }
    assert_eq!(dock.state(), DockState::MovePerf);
}

#[test]
fn test_straight_approach_reaches_sleeping() {
    let (mut dock, mut feed) = start(false);
    let states: Vec<DockState> = [1.2, 0.9, 0.6, 0.3, 0.2]
        .into_iter()
        .map(|z| step(&mut dock, &mut feed, Some((0.0, z))).state)
        .collect();

    assert_eq!(
        states,
        vec![
            DockState::ZeroX,
            DockState::TurnAlpha,
            DockState::MovePerf,
            DockState::MovePerf,
            DockState::Sleeping,
        ]
    );
    assert_eq!(states.iter().filter(|s| **s == DockState::ZeroX).count(), 1);
    assert_eq!(dock.status(), DockStatus::InProgress);
}

#[test]
fn test_home_contact_finishes_without_dwell() {
    let (mut dock, mut feed) = start(true);
    into_move_perf(&mut dock, &mut feed);
    let out = step(&mut dock, &mut feed, Some((0.0, 0.2)));
    assert_eq!(out.state, DockState::DoneParking);
    assert_eq!(out.status, DockStatus::Docked);
}

#[test]
fn test_short_loss_recovers_without_failure() {
    let (mut dock, mut feed) = start(false);
    into_move_perf(&mut dock, &mut feed);

    // 3s without the marker
    let mut states = Vec::new();
    for _ in 0..15 {
        let out = step(&mut dock, &mut feed, None);
        assert_eq!(out.status, DockStatus::InProgress);
        states.push(out.state);
    }
    assert!(states.contains(&DockState::SearchingLost));
    assert_eq!(dock.state(), DockState::SearchingLost);

    let mut reacquired = false;
    for _ in 0..5 {
        let out = step(&mut dock, &mut feed, Some((0.05, 1.0)));
        assert_eq!(out.status, DockStatus::InProgress);
        if out.state == DockState::ZeroX {
            reacquired = true;
            break;
        }
    }
    assert!(reacquired);
}

#[test]
fn test_long_loss_fails_after_timeout() {
    let (mut dock, mut feed) = start(false);
    into_move_perf(&mut dock, &mut feed);

    // Timeout is 5s from the last sighting: 25 ticks is exactly 5s
    for _ in 0..25 {
        let out = step(&mut dock, &mut feed, None);
        assert_eq!(out.status, DockStatus::InProgress);
    }
    let out = step(&mut dock, &mut feed, None);
    assert_eq!(out.status, DockStatus::Failed);
    assert_eq!(out.velocity.linear, 0.0);
    assert_eq!(out.velocity.angular, 0.0);

    // Stays failed and still
    let out = step(&mut dock, &mut feed, Some((0.0, 1.0)));
    assert_eq!(out.status, DockStatus::Failed);
}

#[test]
fn test_only_searching_lost_reports_failure() {
    let (mut dock, mut feed) = start(false);
    into_move_perf(&mut dock, &mut feed);

    // Intermittent marker: never five stale ticks in a row
    for i in 0..60 {
        let marker = (i % 4 != 0).then_some((0.0, 1.0));
        let out = step(&mut dock, &mut feed, marker);
        assert_ne!(out.state, DockState::SearchingLost);
        assert_eq!(out.status, DockStatus::InProgress);
    }
}

#[test]
fn test_lost_search_oscillates_in_place() {
    let (mut dock, mut feed) = start(false);
    into_move_perf(&mut dock, &mut feed);

    let mut angular = Vec::new();
    for _ in 0..20 {
        let out = step(&mut dock, &mut feed, None);
        assert_eq!(out.velocity.linear, 0.0);
        if out.state == DockState::SearchingLost {
            angular.push(out.velocity.angular);
        }
    }
    assert!(angular.iter().any(|w| *w > 0.0));
    assert!(angular.iter().any(|w| *w < 0.0));
}

/// Snapshot with marker 1 at `depth`, its normal swung `beta` to the left.
fn skewed(feed: &mut MarkerFeed, depth: f32, beta: f32) -> SensorSnapshot {
    feed.now += TICK;
    let half = (beta - PI) / 2.0;
    let fresh = feed.filter.apply(&MarkerBatch {
        detections: vec![MarkerDetection {
            id: 1,
            position: [0.0, 0.0, depth],
            orientation: [0.0, half.sin(), 0.0, half.cos()],
        }],
    });
    SensorSnapshot {
        markers: feed.filter.memory().clone(),
        fresh,
        ..SensorSnapshot::new(feed.now)
    }
}

#[test]
fn test_off_axis_start_triangulates_and_turns() {
    let (mut dock, mut feed) = start(false);

    for _ in 0..2 {
        dock.update(&skewed(&mut feed, 1.4, 0.3));
    }
    assert_eq!(dock.state(), DockState::TurnAlpha);
    let plan = dock.plan().unwrap();
    assert!(plan.alpha > 0.05);
    assert!(plan.distance > 0.0 && plan.distance < 1.4);

    let out = dock.update(&skewed(&mut feed, 1.4, 0.3));
    assert_eq!(out.state, DockState::TurnAlpha);
    // Counter-clockwise, toward the side the normal swung to
    assert!(out.velocity.angular > 0.0);

    let (mut dock, mut feed) = start(false);
    for _ in 0..3 {
        dock.update(&skewed(&mut feed, 1.4, -0.3));
    }
    assert_eq!(dock.state(), DockState::TurnAlpha);
    assert!(dock.update(&skewed(&mut feed, 1.4, -0.3)).velocity.angular < 0.0);
}

/// Off-axis start turned through alpha; returns the heading pose MOVE_ALPHA
/// starts from.
fn into_move_alpha(dock: &mut DockingController, feed: &mut MarkerFeed) -> Pose2D {
    for _ in 0..3 {
        dock.update(&skewed(feed, 1.4, 0.3));
    }
    let plan = dock.plan().unwrap();
    let heading = Pose2D::new(0.0, 0.0, plan.alpha);
    let out = dock.update(&SensorSnapshot {
        pose: heading,
        ..skewed(feed, 1.4, 0.3)
    });
    assert_eq!(out.state, DockState::MoveAlpha);
    heading
}

/// Withholds the marker until failure; returns (ticks before searching,
/// angular rates while searching).
fn lose_marker(
    dock: &mut DockingController,
    feed: &mut MarkerFeed,
    pose: Pose2D,
) -> (usize, Vec<f32>) {
    let mut before = 0;
    let mut searching = Vec::new();
    for _ in 0..80 {
        let out = dock.update(&SensorSnapshot {
            pose,
            ..feed.next(None)
        });
        if out.status == DockStatus::Failed {
            return (before, searching);
        }
        if out.state == DockState::SearchingLost {
            searching.push(out.velocity.angular);
        } else {
            before += 1;
        }
    }
    panic!("never failed");
}

#[test]
fn test_loss_while_moving_off_axis_still_searches() {
    let (mut dock, mut feed) = start(false);
    let heading = into_move_alpha(&mut dock, &mut feed);

    let (before, searching) = lose_marker(&mut dock, &mut feed, heading);
    // Out of view is expected here: 25 ticks of driving before giving up on it
    assert_eq!(before, 25);
    // Lost timer starts at confirmation, so the full 5s search still runs
    assert_eq!(searching.len(), 26);
    assert!(searching.iter().any(|w| *w > 0.0));
    assert!(searching.iter().any(|w| *w < 0.0));
}

#[test]
fn test_loss_while_realigning_still_searches() {
    let (mut dock, mut feed) = start(false);
    let heading = into_move_alpha(&mut dock, &mut feed);
    let distance = dock.plan().unwrap().distance;
    let out = dock.update(&SensorSnapshot {
        pose: heading,
        ..feed.next(None)
    });
    assert_eq!(out.state, DockState::MoveAlpha);

    // Arrives at the standoff point with the marker out of view
    let arrived = Pose2D::new(
        distance * heading.theta.cos(),
        distance * heading.theta.sin(),
        heading.theta,
    );
    let out = dock.update(&SensorSnapshot {
        pose: arrived,
        ..feed.next(None)
    });
    assert_eq!(out.state, DockState::ZeroX);

    let (before, searching) = lose_marker(&mut dock, &mut feed, arrived);
    assert_eq!(before, 25);
    assert_eq!(searching.len(), 26);
    assert!(searching.iter().any(|w| *w > 0.0));
    assert!(searching.iter().any(|w| *w < 0.0));
}

#[test]
fn test_stale_run_must_exceed_confirm_length() {
    let (mut dock, mut feed) = start(false);
    into_move_perf(&mut dock, &mut feed);

    for _ in 0..5 {
        assert_eq!(step(&mut dock, &mut feed, None).state, DockState::MovePerf);
    }
    assert_eq!(
        step(&mut dock, &mut feed, None).state,
        DockState::SearchingLost
    );
}

mod common;

use common::FakeHost;
use scrape_batch_runner::error::JobError;
use scrape_batch_runner::infrastructure::{LaneId, SurfaceId, WorkerLane};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_release_without_lane_is_noop() {
    let host = FakeHost::new();
    let lane = WorkerLane::new(host.clone());

    lane.release().await;
    lane.release().await;

    assert_eq!(host.state.lock().lanes_closed, 0);
    assert!(lane.current().await.is_none());
}

#[tokio::test]
async fn test_acquire_reuses_live_lane() {
    let host = FakeHost::new();
    let lane = WorkerLane::new(host.clone());

    let first = assert_ok!(lane.acquire().await);
    let second = assert_ok!(lane.acquire().await);

    assert_eq!(first, second);
    assert_eq!(host.state.lock().lanes_created, 1);
}

#[tokio::test]
async fn test_stale_lane_is_recreated() {
    let host = FakeHost::new();
    let lane = WorkerLane::new(host.clone());

    let first = assert_ok!(lane.acquire().await);
    host.kill_lane();
    let second = assert_ok!(lane.acquire().await);

    assert_ne!(first, second);
    assert_eq!(host.state.lock().lanes_created, 2);
    assert_eq!(lane.current().await, Some(second));
}

#[tokio::test]
async fn test_release_closes_and_clears() {
    let host = FakeHost::new();
    let lane = WorkerLane::new(host.clone());

    assert_ok!(lane.acquire().await);
    lane.release().await;

    assert!(lane.current().await.is_none());
    let state = host.state.lock();
    assert_eq!(state.lanes_closed, 1);
    assert!(state.live_lane.is_none());
}

#[tokio::test]
async fn test_focus_restored_after_lane_creation() {
    let host = FakeHost::new();
    host.steal_focus_on_lane_creation("user-tab");
    let lane = WorkerLane::new(host.clone());

    assert_ok!(lane.acquire().await);

    let state = host.state.lock();
    assert_eq!(state.focus_calls, vec![SurfaceId::new("user-tab")]);
    assert_eq!(state.foreground, Some(SurfaceId::new("user-tab")));
}

#[tokio::test]
async fn test_focus_untouched_when_unchanged() {
    let host = FakeHost::new();
    host.state.lock().foreground = Some(SurfaceId::new("user-tab"));
    let lane = WorkerLane::new(host.clone());

    assert_ok!(lane.acquire().await);

    assert!(host.state.lock().focus_calls.is_empty());
}

#[tokio::test]
async fn test_creation_failure_is_lane_unavailable() {
    let host = FakeHost::new();
    host.fail_lane_creation();
    let lane = WorkerLane::new(host.clone());

    let err = assert_err!(lane.acquire().await);

    assert!(matches!(err, JobError::LaneUnavailable { .. }));
    assert!(err.is_fatal());
    assert!(lane.current().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lane_created_while_caller_cancelled_is_still_released() {
    let host = FakeHost::new();
    host.slow_lane_creation(Duration::from_millis(100));
    let lane = WorkerLane::new(host.clone());

    // 调用方在创建完成前放弃等待
    assert_err!(timeout(Duration::from_millis(10), lane.acquire()).await);
    sleep(Duration::from_millis(200)).await;

    assert_eq!(lane.current().await, Some(LaneId::new("lane-1")));
    lane.release().await;

    let state = host.state.lock();
    assert_eq!(state.lanes_created, 1);
    assert_eq!(state.lanes_closed, 1);
    assert!(state.live_lane.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_release_waits_for_pending_creation() {
    let host = FakeHost::new();
    host.slow_lane_creation(Duration::from_millis(100));
    let lane = WorkerLane::new(host.clone());

    assert_err!(timeout(Duration::from_millis(10), lane.acquire()).await);
    lane.release().await;

    assert!(lane.current().await.is_none());
    assert_eq!(host.state.lock().lanes_closed, 1);
}

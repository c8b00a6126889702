use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{HideReason, ToastCenter, ToastLevel, dedup_key, route_for};
use crate::realtime::{Identity, RealtimeManager, Topic};
use crate::testing::{
    FakeConnector, FakeDirectory, RecordingNavigator, RecordingPresenter, event, test_options,
    wait_until,
};

fn hw1() -> serde_json::Value {
    json!({
        "type": "CREATED",
        "classId": 42,
        "title": "HW1",
        "dueDate": "2025-01-01",
        "message": "New assignment"
    })
}

fn center(
    presenter: &Arc<RecordingPresenter>,
    navigator: &Arc<RecordingNavigator>,
) -> ToastCenter {
    ToastCenter::new(
        Duration::from_secs(6),
        presenter.clone(),
        navigator.clone(),
    )
}

#[test]
fn test_dedup_key_and_route_for_class_event() {
    let event = event("class/42/assignments", hw1());
    assert_eq!(dedup_key(&event), "class:42:created:HW1");
    assert_eq!(route_for(&event).as_deref(), Some("/classes/42/assignments"));
}

#[test]
fn test_dedup_key_ignores_delivery_metadata() {
    let payload = hw1().to_string();
    let first =
        crate::realtime::RealtimeEvent::parse("class/42/assignments", &payload, "a", 1).unwrap();
    let second =
        crate::realtime::RealtimeEvent::parse("class/42/assignments", &payload, "b", 99).unwrap();
    assert_eq!(dedup_key(&first), dedup_key(&second));
}

#[test]
fn test_payload_scope_wins_over_topic_id() {
    let event = event(
        "class/1/assignments",
        json!({"type": "UPDATED", "classId": 42, "title": "HW1"}),
    );
    assert_eq!(dedup_key(&event), "class:42:updated:HW1");
}

#[test]
fn test_private_queue_change_uses_payload_scope() {
    let event = event(
        "user/7/queue/notifications",
        json!({"type": "UPDATED", "assignmentId": 37, "title": "Essay"}),
    );
    assert_eq!(dedup_key(&event), "assignment:37:updated:Essay");
    assert_eq!(route_for(&event).as_deref(), Some("/assignments/37"));
}

#[test]
fn test_change_kind_keeps_updates_apart() {
    let created = event("class/42/assignments", hw1());
    let mut payload = hw1();
    payload["type"] = json!("UPDATED");
    let updated = event("class/42/assignments", payload);
    assert_ne!(dedup_key(&created), dedup_key(&updated));
}

#[tokio::test(start_paused = true)]
async fn test_same_payload_on_class_topic_and_queue_shows_once() {
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let center = center(&presenter, &navigator);
    let on_class = event("class/42/assignments", hw1());
    let on_queue = event("user/7/queue/notifications", hw1());

    assert_eq!(dedup_key(&on_class), dedup_key(&on_queue));
    assert_eq!(route_for(&on_queue).as_deref(), Some("/classes/42"));

    assert!(center.offer(&on_class).is_some());
    assert!(center.offer(&on_queue).is_none());
    assert_eq!(presenter.shown().len(), 1);
    assert_eq!(
        presenter.shown()[0].route.as_deref(),
        Some("/classes/42/assignments")
    );
}

#[test]
fn test_approval_toast() {
    let event = event(
        "user/7/queue/approvals",
        json!({"requestId": 5, "approved": false, "message": "Class is full"}),
    );
    assert_eq!(dedup_key(&event), "approval:5");
    assert_eq!(route_for(&event).as_deref(), Some("/requests/5"));

    let toast = super::Toast::from_event(
        &event,
        tokio::time::Instant::now(),
        tokio::time::Instant::now(),
    );
    assert_eq!(toast.title, "Request declined");
    assert_eq!(toast.message, "Class is full");
    assert_eq!(toast.level, ToastLevel::Warning);
}

#[test]
fn test_headline_without_title() {
    let event = event(
        "class/42/quizzes",
        json!({"type": "CREATED", "classId": 42, "description": "Chapter 3", "dueDate": "2025-02-01"}),
    );
    let now = tokio::time::Instant::now();
    let toast = super::Toast::from_event(&event, now, now);
    assert_eq!(toast.title, "Quiz created");
    assert_eq!(toast.message, "Chapter 3 · due 2025-02-01");
    assert_eq!(toast.level, ToastLevel::Info);
}

#[tokio::test(start_paused = true)]
async fn test_huge_display_time_does_not_overflow() {
    let presenter = Arc::new(RecordingPresenter::default());
    let center = ToastCenter::new(
        Duration::MAX,
        presenter.clone(),
        Arc::new(RecordingNavigator::default()),
    );
    let toast = center
        .offer(&event("class/42/assignments", hw1()))
        .unwrap();

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(center.is_visible(&toast.key));
    assert!(presenter.hidden().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_suppressed_until_expiry() {
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let center = center(&presenter, &navigator);
    let event = event("class/42/assignments", hw1());

    assert!(center.offer(&event).is_some());
    assert!(center.offer(&event).is_none());

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(center.offer(&event).is_none());
    assert_eq!(center.active().len(), 1);

    tokio::time::advance(Duration::from_secs(4)).await;
    tokio::task::yield_now().await;
    assert!(!center.is_visible("class:42:created:HW1"));
    assert!(center.offer(&event).is_some());

    assert_eq!(presenter.shown().len(), 2);
    assert_eq!(
        presenter.hidden(),
        vec![("class:42:created:HW1".to_string(), HideReason::Expired)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_allows_key_again() {
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let center = center(&presenter, &navigator);
    let event = event("class/42/assignments", hw1());

    let toast = center.offer(&event).unwrap();
    assert!(center.dismiss(&toast.key));
    assert!(!center.dismiss(&toast.key));
    assert_eq!(
        presenter.hidden(),
        vec![(toast.key.clone(), HideReason::Dismissed)]
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    let again = center.offer(&event).unwrap();
    assert_ne!(again.id, toast.id);

    // the first toast's timer must not close the second one
    tokio::time::advance(Duration::from_millis(5500)).await;
    tokio::task::yield_now().await;
    assert!(center.is_visible(&again.key));
}

#[tokio::test(start_paused = true)]
async fn test_click_navigates_and_keeps_toast() {
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let center = center(&presenter, &navigator);
    let toast = center
        .offer(&event("class/42/assignments", hw1()))
        .unwrap();

    assert!(center.click(&toast.key));
    assert!(!center.click("class:1:assignments:missing"));
    assert_eq!(navigator.routes(), vec!["/classes/42/assignments".to_string()]);
    assert!(center.is_visible(&toast.key));
}

#[tokio::test(start_paused = true)]
async fn test_click_navigation_failure_is_swallowed() {
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::failing());
    let center = center(&presenter, &navigator);
    let toast = center
        .offer(&event("class/42/assignments", hw1()))
        .unwrap();

    assert!(center.click(&toast.key));
    assert_eq!(navigator.routes().len(), 1);

    // expiry still runs
    tokio::time::advance(Duration::from_secs(7)).await;
    tokio::task::yield_now().await;
    assert!(center.active().is_empty());
}

#[tokio::test]
async fn test_class_assignment_scenario() {
    let connector = Arc::new(FakeConnector::new());
    let manager = RealtimeManager::new(
        connector.clone(),
        Arc::new(FakeDirectory::new(vec![])),
        test_options(),
    );
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let center = center(&presenter, &navigator);
    let subscription = center.attach(manager.bus());

    let lease = manager.watch(Topic::class(42, "assignments"));
    manager.connect(Identity::new(7)).await;
    let remote = connector.remote(0);
    assert!(
        remote
            .subscribed_topics()
            .contains(&"class/42/assignments".to_string())
    );

    // same notification twice, then an unrelated one to know both were handled
    remote.push_event("class/42/assignments", hw1(), 0);
    remote.push_event("class/42/assignments", hw1(), 0);
    remote.push_event(
        "user/7/queue/approvals",
        json!({"requestId": 9, "approved": true}),
        0,
    );
    wait_until(|| presenter.shown().len() == 2).await;

    let matching: Vec<_> = center
        .active()
        .into_iter()
        .filter(|toast| toast.key.contains("42") && toast.key.contains("HW1"))
        .collect();
    assert_eq!(matching.len(), 1);

    assert!(center.click(&matching[0].key));
    assert!(navigator.routes()[0].contains("/classes/42"));

    lease.release();
    assert!(subscription.unsubscribe());
    manager.disconnect();
}

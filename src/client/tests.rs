use std::sync::Arc;

use serde_json::json;

use super::Classlink;
use crate::comments::ParentKey;
use crate::config::Settings;
use crate::persistence::{Persistence, UserProfile};
use crate::realtime::{Identity, Phase};
use crate::testing::{RecordingNavigator, RecordingPresenter, event};

fn offline_settings() -> Settings {
    let mut settings = Settings::default();
    settings.api.base_url = "http://127.0.0.1:9/api".to_string();
    settings.api.request_timeout_secs = 1;
    settings.realtime.url = "ws://127.0.0.1:9/ws".to_string();
    settings.realtime.reconnect = false;
    settings
}

fn client() -> (Classlink, Arc<RecordingPresenter>) {
    let presenter = Arc::new(RecordingPresenter::default());
    let client = Classlink::with_persistence(
        offline_settings(),
        Persistence::temporary().unwrap(),
        presenter.clone(),
        Arc::new(RecordingNavigator::default()),
    )
    .unwrap();
    (client, presenter)
}

#[tokio::test]
async fn test_start_without_session_stays_idle() {
    let (client, _) = client();
    assert!(!client.start().await.unwrap());
    assert_eq!(client.realtime().phase(), Phase::Idle);
}

#[tokio::test]
async fn test_sign_in_and_out() {
    let (client, _) = client();
    let profile = UserProfile {
        id: 7,
        username: "ada".to_string(),
        roles: vec!["STUDENT".to_string()],
    };
    client.sign_in("jwt", &profile).unwrap();
    assert_eq!(
        Identity::from_session(client.session()).unwrap(),
        Some(Identity::new(7).with_token("jwt"))
    );

    client.sign_out().unwrap();
    assert_eq!(client.session().token().unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_backend_leaves_realtime_idle() {
    let (client, _) = client();
    client.connect_as(Identity::new(7)).await;
    assert_eq!(client.realtime().phase(), Phase::Idle);
}

#[tokio::test]
async fn test_bus_feeds_toasts_and_comment_cache() {
    let (client, presenter) = client();
    let key: ParentKey = "assignment:37".parse().unwrap();
    // no thread cached yet: nothing to invalidate
    assert!(!client.comments().invalidate(&key));

    let delivered = client.realtime().bus().broadcast(&event(
        "assignment/37/comments",
        json!({"type": "CREATED", "assignmentId": 37, "title": "New comment"}),
    ));
    assert_eq!(delivered, 2);
    assert_eq!(presenter.shown().len(), 1);
    assert_eq!(client.toasts().active().len(), 1);

    client.shutdown();
    assert_eq!(client.realtime().bus().listener_count(), 0);
    assert_eq!(client.realtime().phase(), Phase::Idle);
}

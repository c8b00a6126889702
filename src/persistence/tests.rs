use super::sled_store::{Draft, Persistence, UserProfile};
use serde_json::json;
use tempfile::tempdir;

fn profile() -> UserProfile {
    UserProfile {
        id: 7,
        username: "ada".to_string(),
        roles: vec!["STUDENT".to_string()],
    }
}

#[test]
fn test_session_round_trip_and_clear() {
    let persistence = Persistence::temporary().unwrap();
    let session = persistence.sessions().unwrap();
    assert_eq!(session.token().unwrap(), None);

    session.set_token("jwt-abc").unwrap();
    session.set_profile(&profile()).unwrap();
    assert_eq!(session.token().unwrap().as_deref(), Some("jwt-abc"));
    assert_eq!(session.profile().unwrap(), Some(profile()));
    assert!(session.profile().unwrap().unwrap().has_role("student"));

    session.clear().unwrap();
    assert_eq!(session.token().unwrap(), None);
    assert_eq!(session.profile().unwrap(), None);
}

#[test]
fn test_session_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_str().unwrap();
    {
        let persistence = Persistence::open(path).unwrap();
        persistence.sessions().unwrap().set_token("persisted").unwrap();
    }
    let persistence = Persistence::open(path).unwrap();
    assert_eq!(
        persistence.sessions().unwrap().token().unwrap().as_deref(),
        Some("persisted")
    );
}

#[test]
fn test_draft_is_stored_as_key_value_pairs() {
    let mut draft = Draft::new("assignment-edit-37");
    draft.set("title", json!("Essay"));
    draft.set("points", json!(20));

    let encoded = serde_json::to_value(&draft).unwrap();
    assert_eq!(
        encoded["changes"],
        json!([["points", 20], ["title", "Essay"]])
    );

    let decoded: Draft = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, draft);
}

#[test]
fn test_draft_store_save_load_discard() {
    let persistence = Persistence::temporary().unwrap();
    let drafts = persistence.drafts().unwrap();

    let mut draft = Draft::new("quiz-3");
    draft.set("dueDate", json!("2025-01-01"));
    drafts.save(&mut draft).unwrap();
    assert!(draft.updated_at > 0);

    let loaded = drafts.load("quiz-3").unwrap().unwrap();
    assert_eq!(loaded.changes.get("dueDate"), Some(&json!("2025-01-01")));
    assert_eq!(drafts.forms().unwrap(), vec!["quiz-3".to_string()]);

    drafts.discard("quiz-3").unwrap();
    assert!(drafts.load("quiz-3").unwrap().is_none());
}

#[test]
fn test_saving_an_empty_draft_removes_it() {
    let persistence = Persistence::temporary().unwrap();
    let drafts = persistence.drafts().unwrap();

    let mut draft = Draft::new("class-settings");
    draft.set("name", json!("Physics"));
    drafts.save(&mut draft).unwrap();

    draft.remove("name");
    drafts.save(&mut draft).unwrap();
    assert!(drafts.load("class-settings").unwrap().is_none());
}

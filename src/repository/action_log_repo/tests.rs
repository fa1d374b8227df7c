use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::class_item::ClassRef;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()))
}

fn make_test_log(module_id: i64, actor: &str) -> ActionLog {
    ActionLog::new(ActionType::ReorderModule, actor)
        .with_module(module_id)
        .with_subjects(&[ClassRef::video(1), ClassRef::questionnaire(2)])
        .with_payload(&serde_json::json!({ "applied": 2 }))
        .with_detail("Test log")
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = make_test_log(3, "admin1");
    let action_id = repo.insert(&log).unwrap();
    assert_eq!(action_id, log.action_id);

    let found = repo.find_by_id(&action_id).unwrap().unwrap();
    assert_eq!(found.actor, "admin1");
    assert_eq!(found.module_id, Some(3));
    assert_eq!(found.subject_ids, vec!["VIDEO#1", "QUESTIONNAIRE#2"]);
    assert_eq!(found.action_type(), Some(ActionType::ReorderModule));
    assert_eq!(found.payload_json.unwrap()["applied"], 2);
}

#[test]
fn test_find_by_module_and_actor() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&make_test_log(1, "admin1")).unwrap();
    repo.insert(&make_test_log(1, "admin2")).unwrap();
    repo.insert(&make_test_log(2, "admin1")).unwrap();

    assert_eq!(repo.find_by_module_id(1).unwrap().len(), 2);
    assert_eq!(repo.count_by_module(2).unwrap(), 1);
    assert_eq!(repo.find_by_actor("admin1", 10).unwrap().len(), 2);
    assert_eq!(repo.find_recent(2).unwrap().len(), 2);
}

#[test]
fn test_find_missing_returns_none() {
    let repo = ActionLogRepository::new(setup_test_db());
    assert!(repo.find_by_id("missing").unwrap().is_none());
}

use crate::db::connection::Database;
use crate::db::recipients::list_destinations;
use crate::domain::PreviousCycleState;
use crate::errors::AppError;
use crate::reconcile::{Reconciler, VanishPolicy};
use crate::router::handle;
use crate::tests::utils::{feed, init_test_db, msk_at};
use astra::{Body, Response};
use http::{Method, Request};
use serde_json::Value;
use std::io::Read;

fn request(method: Method, uri: &str, db: &Database) -> Result<Response, AppError> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    handle(req, db)
}

fn json_body(resp: Response) -> Value {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    serde_json::from_str(&body).expect("response is JSON")
}

/// "a" is active; "b" came and went.
fn seed(db: &Database) {
    let reconciler = Reconciler::new(db.clone(), VanishPolicy::default());
    let mut previous = PreviousCycleState::default();
    for (keys, now) in [
        (vec!["a", "b"], msk_at(2025, 6, 1, 12)),
        (vec!["a"], msk_at(2025, 6, 3, 12)),
    ] {
        let raw = feed(&keys);
        let effective = raw.effective(now);
        previous = reconciler
            .reconcile(&previous, &raw, &effective, now)
            .previous;
    }
}

#[test]
fn active_lists_only_open_entries() {
    let (_dir, db) = init_test_db();
    seed(&db);

    let resp = request(Method::GET, "/active", &db).expect("Handler failed");
    assert_eq!(resp.status(), 200);

    let body = json_body(resp);
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["a"]);
}

#[test]
fn history_includes_closed_periods_with_their_length() {
    let (_dir, db) = init_test_db();
    seed(&db);

    let body = json_body(request(Method::GET, "/history", &db).unwrap());
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let b = rows.iter().find(|r| r["key"] == "b").unwrap();
    assert_eq!(b["days_active"], 2);
    assert_eq!(b["label"], "server b");
    let a = rows.iter().find(|r| r["key"] == "a").unwrap();
    assert!(a["end"].is_null());
    assert_eq!(a["open"], true);
}

#[test]
fn single_entry_history_and_unknown_key() {
    let (_dir, db) = init_test_db();
    seed(&db);

    let body = json_body(request(Method::GET, "/history/b", &db).unwrap());
    assert_eq!(body["entry"]["is_active"], false);
    assert_eq!(body["periods"].as_array().unwrap().len(), 1);

    assert!(matches!(
        request(Method::GET, "/history/10.9.9.9", &db),
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        request(Method::GET, "/nope", &db),
        Err(AppError::NotFound)
    ));
}

#[test]
fn cycles_endpoint_answers_on_an_empty_ledger() {
    let (_dir, db) = init_test_db();
    let body = json_body(request(Method::GET, "/cycles", &db).unwrap());
    assert_eq!(body, Value::Array(Vec::new()));
}

#[test]
fn recipients_can_register_and_leave() {
    let (_dir, db) = init_test_db();

    let resp = request(Method::POST, "/users?id=42&username=alice", &db).unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp)["changed"], true);
    let same = json_body(request(Method::POST, "/users?id=42&username=alice", &db).unwrap());
    assert_eq!(same["changed"], false);
    let renamed = json_body(request(Method::POST, "/users?id=42&username=alice2", &db).unwrap());
    assert_eq!(renamed["changed"], true);

    let body = json_body(request(Method::POST, "/chats?id=-1001&type=supergroup&title=Ops%20room", &db).unwrap());
    assert_eq!(body["changed"], true);
    let again = json_body(request(Method::POST, "/chats?id=-1001", &db).unwrap());
    assert_eq!(again["changed"], false);

    assert_eq!(
        db.with_conn(|conn| list_destinations(conn)).unwrap(),
        vec![-1001, 42]
    );

    let removed = json_body(request(Method::POST, "/chats/remove?id=-1001", &db).unwrap());
    assert_eq!(removed["changed"], true);
    assert_eq!(db.with_conn(|conn| list_destinations(conn)).unwrap(), vec![42]);
}

#[test]
fn registration_requires_a_numeric_id() {
    let (_dir, db) = init_test_db();

    assert!(matches!(
        request(Method::POST, "/users", &db),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        request(Method::POST, "/chats?id=abc", &db),
        Err(AppError::BadRequest(_))
    ));
}

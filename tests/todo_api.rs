//! Todo API behavior: auth, CRUD, reminders, health.

use serde_json::{json, Value};
use uuid::Uuid;

use todo_service::config::SamplingMode;
use todo_service::store::now_ms;

mod common;
use common::{spawn_service, ALICE_TOKEN, BOB_TOKEN};

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    let res = client.get(service.url("/todos")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(service.url("/todos"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    service.stop().await;
}

#[tokio::test]
async fn test_crud_flow() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    // Create
    let res = client
        .post(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .json(&json!({ "name": "write the report", "priority": "high" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["priority"], "high");

    // List
    let res = client
        .get(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let list: Value = res.json().await.unwrap();
    assert_eq!(list["todos"].as_array().unwrap().len(), 1);
    assert_eq!(list["user"]["user_id"], "user-alice");
    assert_eq!(list["user"]["username"], "alice");

    // Update
    let res = client
        .put(service.url(&format!("/todos/{id}")))
        .bearer_auth(ALICE_TOKEN)
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["completed"], true);

    // Delete
    let res = client
        .delete(service.url(&format!("/todos/{id}")))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();
    let list: Value = res.json().await.unwrap();
    assert!(list["todos"].as_array().unwrap().is_empty());

    service.stop().await;
}

#[tokio::test]
async fn test_create_requires_name() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    let res = client
        .post(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    service.stop().await;
}

#[tokio::test]
async fn test_users_cannot_touch_each_others_todos() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    let res = client
        .post(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .json(&json!({ "name": "private" }))
        .send()
        .await
        .unwrap();
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .put(service.url(&format!("/todos/{id}")))
        .bearer_auth(BOB_TOKEN)
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .delete(service.url(&format!("/todos/{id}")))
        .bearer_auth(BOB_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    service.stop().await;
}

#[tokio::test]
async fn test_reminder_reschedule_keeps_one_pending_timer() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    let first_fire = now_ms() + 60_000;
    let res = client
        .post(service.url("/todos"))
        .bearer_auth(ALICE_TOKEN)
        .json(&json!({ "name": "with reminder", "reminder_date_ms": first_fire }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let created: Value = res.json().await.unwrap();
    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(service.scheduler.pending_count(), 1);

    // Reschedule twice; exactly one pending timer remains, at the latest time.
    let second_fire = now_ms() + 120_000;
    let third_fire = now_ms() + 180_000;
    for fire in [second_fire, third_fire] {
        let res = client
            .put(service.url(&format!("/todos/{id}")))
            .bearer_auth(ALICE_TOKEN)
            .json(&json!({ "reminder_date_ms": fire }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }
    assert_eq!(service.scheduler.pending_count(), 1);
    assert_eq!(service.scheduler.pending_fire_time(id), Some(third_fire));

    // Deleting the todo cancels its timer.
    let res = client
        .delete(service.url(&format!("/todos/{id}")))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(service.scheduler.pending_count(), 0);

    service.stop().await;
}

#[tokio::test]
async fn test_health_endpoint_shape() {
    let service = spawn_service(SamplingMode::AlwaysOn).await;
    let client = reqwest::Client::new();

    let res = client.get(service.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["store"], "connected");
    assert_eq!(health["pending_reminders"], 0);

    service.stop().await;
}

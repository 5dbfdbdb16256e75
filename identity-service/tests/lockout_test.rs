mod common;

use axum::http::StatusCode;
use common::{post, register_active_user, spawn_app};
use serde_json::json;

async fn fail_login(app: &common::TestApp, username: &str) -> (StatusCode, serde_json::Value) {
    post(
        app,
        "/auth/login",
        None,
        json!({ "username": username, "password": "definitely-wrong" }),
    )
    .await
}

#[tokio::test]
async fn five_failures_lock_the_account_even_for_the_correct_password() {
    let app = spawn_app().await;
    register_active_user(&app, "henry", "henry@example.com", "henrys-password").await;

    for _ in 0..5 {
        let (status, body) = fail_login(&app, "henry").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        // a failed attempt never reveals whether it triggered the lock
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    // 6th attempt with the CORRECT password: locked, distinct code
    let (status, body) = post(
        &app,
        "/auth/login",
        None,
        json!({ "username": "henry", "password": "henrys-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");

    assert!(app.audit.count_action("user.locked") >= 1);
}

#[tokio::test]
async fn successful_login_resets_the_failure_counter() {
    let app = spawn_app().await;
    register_active_user(&app, "iris", "iris@example.com", "iris-password").await;

    // 4 failures, then a success, then 4 more failures: never locks,
    // because the success reset the counter.
    for _ in 0..4 {
        fail_login(&app, "iris").await;
    }
    let (status, _) = post(
        &app,
        "/auth/login",
        None,
        json!({ "username": "iris", "password": "iris-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..4 {
        let (status, body) = fail_login(&app, "iris").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    let (status, _) = post(
        &app,
        "/auth/login",
        None,
        json!({ "username": "iris", "password": "iris-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_username_gets_the_same_error_as_a_wrong_password() {
    let app = spawn_app().await;
    register_active_user(&app, "judy", "judy@example.com", "judys-password").await;

    let (status_unknown, body_unknown) = fail_login(&app, "no-such-user").await;
    let (status_known, body_known) = fail_login(&app, "judy").await;

    assert_eq!(status_unknown, status_known);
    assert_eq!(body_unknown["code"], body_known["code"]);
}

#[tokio::test]
async fn concurrent_failures_do_not_lose_increments() {
    let app = spawn_app().await;
    register_active_user(&app, "kate", "kate@example.com", "kates-password").await;

    // 5 concurrent wrong-password attempts; the atomic increment means
    // they count to exactly the threshold and the account locks.
    let mut handles = Vec::new();
    for _ in 0..5 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            use axum::{body::Body, http::Request};
            use tower::util::ServiceExt;

            let request = Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "username": "kate", "password": "wrong" }).to_string(),
                ))
                .unwrap();
            router.oneshot(request).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::UNAUTHORIZED);
    }

    let (status, body) = post(
        &app,
        "/auth/login",
        None,
        json!({ "username": "kate", "password": "kates-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");
}

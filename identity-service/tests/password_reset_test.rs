mod common;

use axum::http::StatusCode;
use common::{login, post, register_active_user, spawn_app};
use identity_service::services::EmailKind;
use serde_json::json;

#[tokio::test]
async fn forgot_password_never_discloses_account_existence() {
    let app = spawn_app().await;
    register_active_user(&app, "pam", "pam@example.com", "pams-password").await;

    let (status, _) = post(
        &app,
        "/auth/forgot-password",
        None,
        json!({ "email": "pam@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        "/auth/forgot-password",
        None,
        json!({ "email": "nobody@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // only the real account got an email
    assert!(app
        .email
        .last_token_for("pam@example.com", EmailKind::PasswordReset)
        .is_some());
    assert!(app
        .email
        .last_token_for("nobody@example.com", EmailKind::PasswordReset)
        .is_none());
}

#[tokio::test]
async fn reset_replaces_the_password_and_kills_sessions() {
    let app = spawn_app().await;
    register_active_user(&app, "quinn", "quinn@example.com", "old-password-1").await;
    let (_access, refresh) = login(&app, "quinn", "old-password-1").await;

    post(
        &app,
        "/auth/forgot-password",
        None,
        json!({ "email": "quinn@example.com" }),
    )
    .await;
    let token = app
        .email
        .last_token_for("quinn@example.com", EmailKind::PasswordReset)
        .unwrap();

    let (status, _) = post(
        &app,
        "/auth/reset-password",
        None,
        json!({ "token": token, "newPassword": "new-password-22" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // old password dead, new password live
    let (status, _) = post(
        &app,
        "/auth/login",
        None,
        json!({ "username": "quinn", "password": "old-password-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "quinn", "new-password-22").await;

    // pre-reset refresh token was revoked with the sessions
    let (status, body) = post(
        &app,
        "/auth/refresh",
        None,
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = spawn_app().await;
    register_active_user(&app, "rita", "rita@example.com", "ritas-password").await;

    post(
        &app,
        "/auth/forgot-password",
        None,
        json!({ "email": "rita@example.com" }),
    )
    .await;
    let token = app
        .email
        .last_token_for("rita@example.com", EmailKind::PasswordReset)
        .unwrap();

    let (status, _) = post(
        &app,
        "/auth/reset-password",
        None,
        json!({ "token": token, "newPassword": "first-new-pass" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/auth/reset-password",
        None,
        json!({ "token": token, "newPassword": "second-new-pass" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    // the first reset, not the second, is what stuck
    login(&app, "rita", "first-new-pass").await;
}

#[tokio::test]
async fn bogus_reset_token_is_rejected() {
    let app = spawn_app().await;

    let (status, body) = post(
        &app,
        "/auth/reset-password",
        None,
        json!({ "token": "never-issued", "newPassword": "whatever-pass" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

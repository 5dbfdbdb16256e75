mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, get, login, post, register_active_user, request, spawn_app};
use serde_json::{Value, json};
use uuid::Uuid;

/// Register + verify a user and log them in, returning (user_id, access
/// token).
async fn make_user(app: &TestApp, name: &str) -> (Uuid, String) {
    let email = format!("{}@example.com", name);
    let password = format!("{}-password", name);
    let user_id = register_active_user(app, name, &email, &password).await;
    let (access, _) = login(app, name, &password).await;
    (user_id, access)
}

async fn make_team(app: &TestApp, token: &str, name: &str) -> Uuid {
    let (status, body) = post(
        app,
        "/teams",
        Some(token),
        json!({ "name": name, "maxMembers": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create team failed: {}", body);
    Uuid::parse_str(body["team_id"].as_str().unwrap()).unwrap()
}

/// Invite by email and accept as the invitee, returning the member id.
async fn add_member(
    app: &TestApp,
    team_id: Uuid,
    inviter_token: &str,
    invitee_name: &str,
    invitee_token: &str,
    role: &str,
) -> Uuid {
    let (status, body) = post(
        app,
        &format!("/teams/{}/invite", team_id),
        Some(inviter_token),
        json!({ "email": format!("{}@example.com", invitee_name), "role": role }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "invite failed: {}", body);
    let member_id = Uuid::parse_str(body["member_id"].as_str().unwrap()).unwrap();

    let (status, _) = post(
        app,
        &format!("/teams/{}/accept", team_id),
        Some(invitee_token),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    member_id
}

fn members_by_role<'a>(members: &'a Value, role: &str) -> Vec<&'a Value> {
    members
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == role)
        .collect()
}

#[tokio::test]
async fn creating_a_team_makes_the_creator_its_only_owner() {
    let app = spawn_app().await;
    let (alice_id, alice) = make_user(&app, "alice").await;
    let team_id = make_team(&app, &alice, "platform").await;

    let (status, team) = get(&app, &format!("/teams/{}", team_id), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["owner_id"], alice_id.to_string());
    assert_eq!(team["status"], "active");

    let (_, members) = get(&app, &format!("/teams/{}/members", team_id), Some(&alice)).await;
    let owners = members_by_role(&members, "owner");
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0]["user_id"], alice_id.to_string());
    assert_eq!(owners[0]["status"], "active");
}

#[tokio::test]
async fn duplicate_team_name_conflicts() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    make_team(&app, &alice, "platform").await;

    let (status, body) = post(
        &app,
        "/teams",
        Some(&alice),
        json!({ "name": "platform" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn invitation_rules() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let (_, carol) = make_user(&app, "carol").await;
    let team_id = make_team(&app, &alice, "platform").await;

    // inviting a nonexistent user
    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "ghost@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    // inviting as owner role is structurally disallowed
    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "bob@example.com", "role": "owner" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // proper invite; a second invite while pending conflicts
    let (status, _) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "bob@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "bob@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_MEMBER");

    // a plain member cannot invite
    let (status, _) = post(&app, &format!("/teams/{}/accept", team_id), Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&bob),
        json!({ "email": "carol@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCESS_DENIED");

    // an outsider is not even a member
    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&carol),
        json!({ "email": "bob@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_MEMBER");
}

#[tokio::test]
async fn role_mutation_rules() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let (_, carol) = make_user(&app, "carol").await;
    let team_id = make_team(&app, &alice, "platform").await;

    let bob_member = add_member(&app, team_id, &alice, "bob", &bob, "admin").await;
    let carol_member = add_member(&app, team_id, &alice, "carol", &carol, "member").await;

    // the owner's own row is immutable through this path
    let (_, members) = get(&app, &format!("/teams/{}/members", team_id), Some(&alice)).await;
    let owner_member = members_by_role(&members, "owner")[0]["member_id"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, owner_member),
        Some(&alice),
        Some(json!({ "role": "member" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // nobody is assigned ownership through a role update
    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, carol_member),
        Some(&alice),
        Some(json!({ "role": "owner" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // an admin may demote/raise within member/viewer
    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, carol_member),
        Some(&bob),
        Some(json!({ "role": "viewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "viewer");

    // but only the owner may promote to admin
    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, carol_member),
        Some(&bob),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCESS_DENIED");

    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, carol_member),
        Some(&alice),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "admin");

    let _ = bob_member;
}

#[tokio::test]
async fn removal_and_leave_rules() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let (_, carol) = make_user(&app, "carol").await;
    let team_id = make_team(&app, &alice, "platform").await;

    add_member(&app, team_id, &alice, "bob", &bob, "member").await;
    let carol_member = add_member(&app, team_id, &alice, "carol", &carol, "viewer").await;

    // the owner cannot be removed by anyone
    let (_, members) = get(&app, &format!("/teams/{}/members", team_id), Some(&alice)).await;
    let owner_member = members_by_role(&members, "owner")[0]["member_id"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = request(
        &app,
        Method::DELETE,
        &format!("/teams/{}/members/{}", team_id, owner_member),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // a viewer may remove themselves even without management rights
    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/teams/{}/members/{}", team_id, carol_member),
        Some(&carol),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // removal is a tombstone: carol is no longer listed
    let (_, members) = get(&app, &format!("/teams/{}/members", team_id), Some(&alice)).await;
    assert!(members_by_role(&members, "viewer").is_empty());

    // and she can be invited again (the row is revived)
    let (status, _) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "carol@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // the owner cannot leave
    let (status, body) = post(
        &app,
        &format!("/teams/{}/leave", team_id),
        Some(&alice),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // a member can
    let (status, _) = post(
        &app,
        &format!("/teams/{}/leave", team_id),
        Some(&bob),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // leaving twice: no active membership left
    let (status, body) = post(
        &app,
        &format!("/teams/{}/leave", team_id),
        Some(&bob),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_MEMBER");
}

#[tokio::test]
async fn reinviting_a_removed_user_keeps_the_original_member_id() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let team_id = make_team(&app, &alice, "platform").await;

    let original_member = add_member(&app, team_id, &alice, "bob", &bob, "member").await;

    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/teams/{}/members/{}", team_id, original_member),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // re-inviting revives the tombstoned row, so the response must carry
    // the id the store actually kept
    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "bob@example.com", "role": "viewer" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let revived_member = Uuid::parse_str(body["member_id"].as_str().unwrap()).unwrap();
    assert_eq!(revived_member, original_member);

    let (status, _) = post(
        &app,
        &format!("/teams/{}/accept", team_id),
        Some(&bob),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // and the returned id addresses the stored row in follow-up calls
    let (status, body) = request(
        &app,
        Method::PUT,
        &format!("/teams/{}/members/{}/role", team_id, revived_member),
        Some(&alice),
        Some(json!({ "role": "member" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "member");
}

#[tokio::test]
async fn ownership_transfer() {
    let app = spawn_app().await;
    let (alice_id, alice) = make_user(&app, "alice").await;
    let (bob_id, bob) = make_user(&app, "bob").await;
    let (_, carol) = make_user(&app, "carol").await;
    let team_id = make_team(&app, &alice, "platform").await;

    add_member(&app, team_id, &alice, "bob", &bob, "member").await;

    // only the owner may transfer
    let (status, body) = post(
        &app,
        &format!("/teams/{}/transfer-ownership", team_id),
        Some(&bob),
        json!({ "newOwnerUserId": bob_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    // the target must be an active member
    let (status, body) = post(
        &app,
        &format!("/teams/{}/transfer-ownership", team_id),
        Some(&alice),
        json!({ "newOwnerUserId": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    // self-transfer is meaningless
    let (status, _) = post(
        &app,
        &format!("/teams/{}/transfer-ownership", team_id),
        Some(&alice),
        json!({ "newOwnerUserId": alice_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the real transfer
    let (status, _) = post(
        &app,
        &format!("/teams/{}/transfer-ownership", team_id),
        Some(&alice),
        json!({ "newOwnerUserId": bob_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, team) = get(&app, &format!("/teams/{}", team_id), Some(&bob)).await;
    assert_eq!(team["owner_id"], bob_id.to_string());

    // still exactly one owner; the old owner is now an admin
    let (_, members) = get(&app, &format!("/teams/{}/members", team_id), Some(&bob)).await;
    let owners = members_by_role(&members, "owner");
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0]["user_id"], bob_id.to_string());
    let admins = members_by_role(&members, "admin");
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0]["user_id"], alice_id.to_string());

    // and the former owner may now leave
    let (status, _) = post(
        &app,
        &format!("/teams/{}/leave", team_id),
        Some(&alice),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let _ = carol;
}

#[tokio::test]
async fn soft_deleted_team_disappears_from_reads() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let team_id = make_team(&app, &alice, "platform").await;
    add_member(&app, team_id, &alice, "bob", &bob, "member").await;

    // only the owner may delete
    let (status, body) = request(
        &app,
        Method::DELETE,
        &format!("/teams/{}", team_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/teams/{}", team_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, &format!("/teams/{}", team_id), Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, teams) = get(&app, "/teams", Some(&alice)).await;
    assert_eq!(teams.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn member_limit_is_enforced_on_invite() {
    let app = spawn_app().await;
    let (_, alice) = make_user(&app, "alice").await;
    let (_, bob) = make_user(&app, "bob").await;
    let (_, carol) = make_user(&app, "carol").await;

    let (status, body) = post(
        &app,
        "/teams",
        Some(&alice),
        json!({ "name": "tiny", "maxMembers": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = Uuid::parse_str(body["team_id"].as_str().unwrap()).unwrap();

    add_member(&app, team_id, &alice, "bob", &bob, "member").await;

    let (status, body) = post(
        &app,
        &format!("/teams/{}/invite", team_id),
        Some(&alice),
        json!({ "email": "carol@example.com", "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");

    let _ = carol;
}

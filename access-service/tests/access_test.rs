mod common;

use access_service::{
    dtos::auth::{LoginRequest, RegisterRequest},
    dtos::policy::{PermissionRequest, ResourceRequest},
    models::{ServiceType, UserStatus},
    services::{CredentialStore, ServiceError, SessionStore},
};
use common::{TestApp, ADMIN_EMAIL, ADMIN_ID, MEMBER_EMAIL, MEMBER_ID};

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_member_can_read_granted_routes() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    let header = bearer(&login.access_token);

    let user_id = app.state.access.authorize(&header, "GET|/user/me").await.unwrap();
    assert_eq!(user_id, MEMBER_ID);

    let user_id = app.state.access.authorize(&header, "GET|/user/42").await.unwrap();
    assert_eq!(user_id, MEMBER_ID);
}

#[tokio::test]
async fn test_member_denied_outside_grants() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    let header = bearer(&login.access_token);

    for element in ["POST|/user/me", "GET|/user/42/extra", "POST|/policy/reload"] {
        let err = app.state.access.authorize(&header, element).await.unwrap_err();
        assert!(
            matches!(&err, ServiceError::AccessDenied { user_id, element_id }
                if *user_id == MEMBER_ID && element_id == element),
            "{} should be denied, got {:?}",
            element,
            err
        );
    }
}

#[tokio::test]
async fn test_superadmin_bypasses_policy() {
    let app = TestApp::spawn().await;
    let login = app.login(ADMIN_EMAIL).await;

    let user_id = app
        .state
        .access
        .authorize(&bearer(&login.access_token), "DELETE|/policy/role/7")
        .await
        .unwrap();
    assert_eq!(user_id, ADMIN_ID);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;

    let err = app
        .state
        .access
        .authorize(&bearer(&login.refresh_token), "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken(_)));
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let err = app
        .state
        .access
        .authorize("Bearer not.a.jwt", "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken(_)));
}

#[tokio::test]
async fn test_token_for_deleted_session_is_forbidden() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    app.sessions.delete_session(&login.session_id).await.unwrap();

    let err = app
        .state
        .access
        .authorize(&bearer(&login.access_token), "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound));
}

#[tokio::test]
async fn test_blocked_user_loses_access_immediately() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    app.users
        .update_user_status(MEMBER_ID, UserStatus::Blocked)
        .await
        .unwrap();

    let err = app
        .state
        .access
        .authorize(&bearer(&login.access_token), "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccountBlocked));
}

#[tokio::test]
async fn test_malformed_element_id() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    let header = bearer(&login.access_token);

    for element in ["GET/user/me", "|/user/me", "GET|"] {
        let err = app.state.access.authorize(&header, element).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidElementId(_)), "{}", element);
    }
}

#[tokio::test]
async fn test_logout_ends_session_and_is_idempotent() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;
    let header = bearer(&login.access_token);

    app.state.auth.logout(&header).await.unwrap();
    assert!(app
        .sessions
        .find_session_by_id(&login.session_id)
        .await
        .unwrap()
        .is_none());

    app.state.auth.logout(&header).await.unwrap();

    let err = app
        .state
        .access
        .authorize(&header, "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound));
}

#[tokio::test]
async fn test_logout_rejects_forged_token() {
    let app = TestApp::spawn().await;

    let err = app.state.auth.logout("Bearer forged.token.value").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken(_)));
}

#[tokio::test]
async fn test_tampered_signature_is_unauthorized() {
    let app = TestApp::spawn().await;
    let login = app.login(MEMBER_EMAIL).await;

    let (unsigned, signature) = login.access_token.rsplit_once('.').unwrap();
    let mut chars: Vec<char> = signature.chars().collect();
    let middle = chars.len() / 2;
    chars[middle] = if chars[middle] == 'A' { 'B' } else { 'A' };
    let tampered = format!("{}.{}", unsigned, chars.into_iter().collect::<String>());

    let err = app
        .state
        .access
        .authorize(&bearer(&tampered), "GET|/user/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken(_)));
}

#[tokio::test]
async fn test_register_login_authorize_scenario() {
    let app = TestApp::spawn().await;

    let users = app
        .state
        .policy
        .add_resource(ResourceRequest {
            name: String::new(),
            description: String::new(),
            service_type: ServiceType::Http,
            method: "GET".to_string(),
            path: "/v1/users".to_string(),
        })
        .await
        .unwrap();
    let list = app
        .state
        .policy
        .add_permission(PermissionRequest {
            name: "users.list".to_string(),
            description: String::new(),
            resource_ids: vec![users.resource_id],
        })
        .await
        .unwrap();
    app.state
        .policy
        .bulk_assign_permissions(app.member_role_id, &[list.permission_id])
        .await
        .unwrap();

    let profile = app
        .state
        .auth
        .register(RegisterRequest {
            name: "A".to_string(),
            phone: "081111".to_string(),
            email: "a@x.com".to_string(),
            password: "a-long-password".to_string(),
        })
        .await
        .unwrap();

    let login = app
        .state
        .auth
        .login(
            LoginRequest {
                identity: "a@x.com".to_string(),
                password: "a-long-password".to_string(),
            },
            &common::client(),
        )
        .await
        .unwrap();
    let claims = app.jwt.verify_token(&login.refresh_token).unwrap();
    assert_eq!(claims.jti, login.session_id);

    let header = bearer(&login.access_token);
    let user_id = app
        .state
        .access
        .authorize(&header, "GET|/v1/users")
        .await
        .unwrap();
    assert_eq!(user_id, profile.user_id);

    let err = app
        .state
        .access
        .authorize(&header, "GET|/v1/orders")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccessDenied { .. }));
}

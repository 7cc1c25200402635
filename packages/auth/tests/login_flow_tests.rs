// End-to-end login / refresh / logout flows over in-memory stores and
// recording mocks.

use std::sync::Arc;

use auth_core::kernel::test_dependencies::{MockOtpDelivery, MockUserDirectory};
use auth_core::{AuthConfig, AuthDeps, AuthError, AuthService};

struct Harness {
    service: AuthService,
    delivery: Arc<MockOtpDelivery>,
    users: Arc<MockUserDirectory>,
}

fn harness(users: MockUserDirectory) -> Harness {
    let mut config = AuthConfig::new("integration-secret", "integration-issuer");
    // Keep the limiter out of the way unless a test opts back in
    config.rate_limit_max_requests = 100;

    let delivery = Arc::new(MockOtpDelivery::new());
    let users = Arc::new(users);
    let deps = AuthDeps::in_memory(delivery.clone(), users.clone(), config);
    Harness {
        service: AuthService::new(deps),
        delivery,
        users,
    }
}

async fn request_code(h: &Harness, phone: &str) -> String {
    h.service.request_otp(phone).await.unwrap();
    h.delivery.last_code_for(phone).unwrap()
}

#[tokio::test]
async fn login_with_brand_new_phone_number_reports_new_user() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;

    let outcome = h.service.login("+15551234567", &code).await.unwrap();
    assert!(outcome.is_new_user);
    assert!(!outcome.profile_exists);
    assert!(!outcome.tokens.access_token.is_empty());
    assert!(!outcome.tokens.refresh_token.is_empty());
    assert_eq!(outcome.tokens.token_type, "bearer");
    assert_eq!(outcome.tokens.expires_in, 30 * 60);
}

#[tokio::test]
async fn login_with_known_phone_number_reports_existing_profile() {
    let h = harness(
        MockUserDirectory::new()
            .with_user("+15551234567")
            .with_profile("+15551234567"),
    );
    let code = request_code(&h, "+15551234567").await;

    let outcome = h.service.login("+15551234567", &code).await.unwrap();
    assert!(!outcome.is_new_user);
    assert!(outcome.profile_exists);
    assert_eq!(
        outcome.user_id,
        h.users.user_id_for("+15551234567").unwrap()
    );
}

#[tokio::test]
async fn wrong_code_then_correct_code_scenario() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let err = h.service.verify_otp("+15551234567", wrong).await.unwrap_err();
    match err {
        AuthError::InvalidOtp { attempts_remaining } => assert_eq!(attempts_remaining, 2),
        other => panic!("expected INVALID_OTP, got {}", other.code()),
    }

    h.service.verify_otp("+15551234567", &code).await.unwrap();

    // Record deleted on success: the same code no longer verifies
    let err = h.service.verify_otp("+15551234567", &code).await.unwrap_err();
    assert_eq!(err.code(), "OTP_EXPIRED");
}

#[tokio::test]
async fn login_code_is_single_use() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;

    h.service.login("+15551234567", &code).await.unwrap();
    let err = h.service.login("+15551234567", &code).await.unwrap_err();
    assert_eq!(err.code(), "OTP_EXPIRED");
}

#[tokio::test]
async fn second_request_within_cooldown_is_rate_limited() {
    let mut config = AuthConfig::new("integration-secret", "integration-issuer");
    config.rate_limit_max_requests = 1;
    let delivery = Arc::new(MockOtpDelivery::new());
    let users = Arc::new(MockUserDirectory::new());
    let service = AuthService::new(AuthDeps::in_memory(
        delivery.clone(),
        users,
        config,
    ));

    service.request_otp("+15551234567").await.unwrap();
    let err = service.request_otp("+15551234567").await.unwrap_err();
    assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_presented_token() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;
    let login = h.service.login("+15551234567", &code).await.unwrap();

    let refreshed = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap();
    assert_eq!(refreshed.user_id, login.user_id);

    // The old refresh token's fingerprint was overwritten
    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFRESH_TOKEN");

    // The rotated token keeps working
    h.service
        .refresh(&refreshed.tokens.refresh_token)
        .await
        .unwrap();
}

#[tokio::test]
async fn logout_with_refresh_token_revokes_that_session() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;
    let login = h.service.login("+15551234567", &code).await.unwrap();

    h.service
        .logout(Some(&login.tokens.refresh_token), None)
        .await
        .unwrap();

    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFRESH_TOKEN");

    // Idempotent
    h.service
        .logout(Some(&login.tokens.refresh_token), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn logout_with_bearer_access_token_revokes_all_sessions() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;
    let login = h.service.login("+15551234567", &code).await.unwrap();

    let header = format!("Bearer {}", login.tokens.access_token);
    h.service.logout(None, Some(&header)).await.unwrap();

    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFRESH_TOKEN");
}

#[tokio::test]
async fn logout_without_credentials_fails_with_missing_auth() {
    let h = harness(MockUserDirectory::new());
    let err = h.service.logout(None, None).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_AUTH");
}

#[tokio::test]
async fn logout_with_malformed_header_fails_with_invalid_auth_header() {
    let h = harness(MockUserDirectory::new());
    let err = h
        .service
        .logout(None, Some("Token abc"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_AUTH_HEADER");
}

#[tokio::test]
async fn logout_with_garbage_bearer_token_fails_unauthorized() {
    let h = harness(MockUserDirectory::new());
    let err = h
        .service
        .logout(None, Some("Bearer not.a.jwt"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn user_directory_failure_surfaces_as_user_creation_failed() {
    let h = harness(MockUserDirectory::new().with_failure());
    let code = request_code(&h, "+15551234567").await;

    let err = h.service.login("+15551234567", &code).await.unwrap_err();
    assert_eq!(err.code(), "USER_CREATION_FAILED");
}

#[tokio::test]
async fn delivery_failure_still_allows_login() {
    let mut config = AuthConfig::new("integration-secret", "integration-issuer");
    config.rate_limit_max_requests = 100;
    let delivery = Arc::new(MockOtpDelivery::new().with_send_failure());
    let users = Arc::new(MockUserDirectory::new());
    let service = AuthService::new(AuthDeps::in_memory(
        delivery.clone(),
        users,
        config,
    ));

    service.request_otp("+15551234567").await.unwrap();
    let code = delivery.last_code_for("+15551234567").unwrap();
    service.login("+15551234567", &code).await.unwrap();
}

#[tokio::test]
async fn purge_never_disturbs_a_live_challenge() {
    let h = harness(MockUserDirectory::new());
    h.service.purge_expired().await.unwrap();

    let code = request_code(&h, "+15551234567").await;
    h.service.purge_expired().await.unwrap();

    h.service.login("+15551234567", &code).await.unwrap();
}

#[tokio::test]
async fn access_token_verifies_while_refresh_record_controls_refresh() {
    let h = harness(MockUserDirectory::new());
    let code = request_code(&h, "+15551234567").await;
    let login = h.service.login("+15551234567", &code).await.unwrap();

    // Logout revokes the refresh record but cannot recall the stateless
    // access token; the bearer header keeps resolving until expiry.
    let header = format!("Bearer {}", login.tokens.access_token);
    h.service.logout(None, Some(&header)).await.unwrap();
    h.service.logout(None, Some(&header)).await.unwrap();

    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFRESH_TOKEN");
}

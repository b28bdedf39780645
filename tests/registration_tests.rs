use careportal::{
    error::AuthError,
    models::{OtpPurpose, Profile, UserType},
    repositories::{
        AccountRepository, PendingRepository, SqliteAccountRepository, SqliteOtpRepository,
        SqlitePendingRepository,
    },
    services::{
        registration_service::RegisterRequest, IdAllocator, MockEmailService, OtpService,
        RegistrationService, PENDING_TTL_MINUTES,
    },
    test_utils::test_helpers,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

fn build_registration_service(pool: &SqlitePool) -> RegistrationService {
    let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let pending: Arc<dyn PendingRepository> = Arc::new(SqlitePendingRepository::new(pool.clone()));
    let otp_service = Arc::new(OtpService::new(
        Arc::new(SqliteOtpRepository::new(pool.clone())),
        accounts.clone(),
        pending.clone(),
        Arc::new(MockEmailService::new()),
    ));
    let allocator = IdAllocator::new(accounts.clone(), pending.clone());
    RegistrationService::new(accounts, pending, allocator, otp_service)
}

fn patient_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        mobile: "555-0100".to_string(),
        password: "correct-horse".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Ames".to_string(),
        user_type: "patient".to_string(),
        is_pregnant: Some(true),
        specialization: None,
    }
}

/// The verification code lands in the store even when email delivery is
/// mocked; tests read it back directly.
async fn stored_otp(pool: &SqlitePool, email: &str, purpose: OtpPurpose) -> String {
    sqlx::query_scalar("SELECT code FROM otp_codes WHERE email = ? AND purpose = ?")
        .bind(email)
        .bind(purpose.as_str())
        .fetch_one(pool)
        .await
        .expect("an OTP code should be stored")
}

#[tokio::test]
async fn test_full_registration_flow() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);
    let accounts = SqliteAccountRepository::new(pool.clone());

    let receipt = service
        .register(patient_request("alice", "alice@example.com"))
        .await
        .unwrap();

    assert!(receipt.user_id.starts_with("PAT"));
    assert_eq!(receipt.user_id.len(), 11);
    assert_eq!(receipt.expires_in_minutes, PENDING_TTL_MINUTES);

    // No account exists until the OTP is confirmed
    assert!(accounts
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .is_none());

    let code = stored_otp(&pool, "alice@example.com", OtpPurpose::Verify).await;
    let verified = service.verify("alice@example.com", &code).await.unwrap();

    assert_eq!(verified.user_id, receipt.user_id);
    assert_eq!(verified.user_type, UserType::Patient);

    let account = accounts
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .expect("account should exist after verification");
    assert!(account.verified_at.is_some());
    assert_eq!(account.profile, Profile::Patient { is_pregnant: true });

    // The pending record is gone
    let pending = SqlitePendingRepository::new(pool.clone());
    assert!(pending
        .find_by_user_id(&receipt.user_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_registration_reports_countdown() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    service
        .register(patient_request("alice", "alice@example.com"))
        .await
        .unwrap();

    let result = service
        .register(patient_request("alice2", "alice@example.com"))
        .await;

    match result {
        Err(AuthError::AlreadyExists {
            minutes_remaining: Some(minutes),
            ..
        }) => assert!(minutes > 0 && minutes <= PENDING_TTL_MINUTES),
        other => panic!("expected AlreadyExists with countdown, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_against_verified_account_has_no_countdown() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    test_helpers::insert_test_account(
        &pool,
        "PAT00000001",
        "alice",
        "alice@example.com",
        "correct-horse",
        test_helpers::sample_patient_profile(),
        true,
    )
    .await;

    let result = service
        .register(patient_request("alice", "other@example.com"))
        .await;

    match result {
        Err(AuthError::AlreadyExists {
            user_id,
            minutes_remaining: None,
            ..
        }) => assert_eq!(user_id, "PAT00000001"),
        other => panic!("expected AlreadyExists without countdown, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_pending_is_replaced() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    test_helpers::insert_test_pending(
        &pool,
        "PAT99999999",
        "alice",
        "alice@example.com",
        test_helpers::sample_patient_profile(),
        Utc::now() - Duration::minutes(1),
    )
    .await;

    let receipt = service
        .register(patient_request("alice", "alice@example.com"))
        .await
        .unwrap();

    assert_ne!(receipt.user_id, "PAT99999999");

    let pending = SqlitePendingRepository::new(pool.clone());
    assert!(pending
        .find_by_user_id("PAT99999999")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_doctor_profile_carries_specialization() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    let request = RegisterRequest {
        username: "drbob".to_string(),
        email: "bob@example.com".to_string(),
        mobile: "555-0101".to_string(),
        password: "correct-horse".to_string(),
        first_name: "Bob".to_string(),
        last_name: "Barnes".to_string(),
        user_type: "doctor".to_string(),
        is_pregnant: None,
        specialization: Some("cardiology".to_string()),
    };

    let receipt = service.register(request).await.unwrap();
    assert!(receipt.user_id.starts_with("DOC"));

    let code = stored_otp(&pool, "bob@example.com", OtpPurpose::Verify).await;
    service.verify("bob@example.com", &code).await.unwrap();

    let account = SqliteAccountRepository::new(pool.clone())
        .find_by_email("bob@example.com")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        account.profile,
        Profile::Doctor {
            specialization: Some("cardiology".to_string())
        }
    );

    // The serialized form exposes only doctor fields
    let json = serde_json::to_value(&account).unwrap();
    assert_eq!(json["user_type"], "doctor");
    assert_eq!(json["specialization"], "cardiology");
    assert!(json.get("is_pregnant").is_none());
    assert!(json.get("password_hash").is_none());
}

#[tokio::test]
async fn test_verify_after_pending_expiry_fails() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    test_helpers::insert_test_pending(
        &pool,
        "PAT12345678",
        "alice",
        "alice@example.com",
        test_helpers::sample_patient_profile(),
        Utc::now() - Duration::minutes(1),
    )
    .await;
    test_helpers::insert_test_otp(
        &pool,
        "alice@example.com",
        "123456",
        OtpPurpose::Verify,
        Utc::now() + Duration::minutes(5),
    )
    .await;

    let result = service.verify("alice@example.com", "123456").await;
    assert!(matches!(result, Err(AuthError::NotFound(_))));

    // No account was created from the expired registration
    assert!(SqliteAccountRepository::new(pool.clone())
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .is_none());

    // The failed verify did not spend the still-valid code; a fresh
    // registration can be confirmed with it.
    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM otp_codes WHERE email = ? AND purpose = 'verify'",
    )
    .bind("alice@example.com")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    test_helpers::insert_test_account(
        &pool,
        "PAT00000001",
        "alice",
        "alice@example.com",
        "old-password-1",
        test_helpers::sample_patient_profile(),
        true,
    )
    .await;

    service
        .request_password_reset("alice@example.com")
        .await
        .unwrap();

    let code = stored_otp(&pool, "alice@example.com", OtpPurpose::Reset).await;
    service
        .reset_password("alice@example.com", &code, "new-password-1")
        .await
        .unwrap();

    // The same code cannot reset twice
    let result = service
        .reset_password("alice@example.com", &code, "another-password")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOtp)));
}

#[tokio::test]
async fn test_register_verify_login_validate_logout() {
    use careportal::repositories::SqliteSessionRepository;
    use careportal::services::{SessionService, TokenService, SESSION_TTL_MINUTES};

    let pool = test_helpers::create_test_db().await.unwrap();
    let registration = build_registration_service(&pool);
    let sessions = SessionService::new(
        Arc::new(SqliteAccountRepository::new(pool.clone())),
        Arc::new(SqliteSessionRepository::new(pool.clone())),
        Arc::new(TokenService::new("e2e-secret", SESSION_TTL_MINUTES)),
    );

    registration
        .register(patient_request("alice", "alice@example.com"))
        .await
        .unwrap();
    let code = stored_otp(&pool, "alice@example.com", OtpPurpose::Verify).await;
    let verified = registration
        .verify("alice@example.com", &code)
        .await
        .unwrap();

    let login = sessions.login("alice", "correct-horse").await.unwrap();
    assert_eq!(login.user_id, verified.user_id);

    let context = sessions.validate(&login.token).await.unwrap();
    assert_eq!(context.user_id, verified.user_id);

    assert!(sessions.logout(&login.session_id).await.unwrap());
    assert!(matches!(
        sessions.validate(&login.token).await,
        Err(AuthError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_reset_against_vanished_account_keeps_code() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    test_helpers::insert_test_account(
        &pool,
        "PAT00000001",
        "alice",
        "alice@example.com",
        "old-password-1",
        test_helpers::sample_patient_profile(),
        true,
    )
    .await;
    service
        .request_password_reset("alice@example.com")
        .await
        .unwrap();
    let code = stored_otp(&pool, "alice@example.com", OtpPurpose::Reset).await;

    // Account removed between code issuance and the reset attempt
    sqlx::query("DELETE FROM accounts WHERE user_id = 'PAT00000001'")
        .execute(&pool)
        .await
        .unwrap();

    let result = service
        .reset_password("alice@example.com", &code, "new-password-1")
        .await;
    assert!(matches!(result, Err(AuthError::NotFound(_))));

    // The code was not spent by the failed attempt
    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM otp_codes WHERE email = ? AND purpose = 'reset'")
            .bind("alice@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_password_reset_unknown_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_registration_service(&pool);

    let result = service.request_password_reset("ghost@example.com").await;
    assert!(matches!(result, Err(AuthError::NotFound(_))));
}

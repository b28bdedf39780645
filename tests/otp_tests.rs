use careportal::{
    error::AuthError,
    models::OtpPurpose,
    repositories::{
        AccountRepository, PendingRepository, SqliteAccountRepository, SqliteOtpRepository,
        SqlitePendingRepository,
    },
    services::{MockEmailService, OtpService},
    test_utils::test_helpers,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

fn build_otp_service(pool: &SqlitePool) -> OtpService {
    let accounts: Arc<dyn AccountRepository> = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let pending: Arc<dyn PendingRepository> = Arc::new(SqlitePendingRepository::new(pool.clone()));
    OtpService::new(
        Arc::new(SqliteOtpRepository::new(pool.clone())),
        accounts,
        pending,
        Arc::new(MockEmailService::new()),
    )
}

async fn plant_pending(pool: &SqlitePool, email: &str) {
    test_helpers::insert_test_pending(
        pool,
        "PAT10000001",
        "alice",
        email,
        test_helpers::sample_patient_profile(),
        Utc::now() + Duration::minutes(30),
    )
    .await;
}

#[tokio::test]
async fn test_code_is_single_use() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);
    plant_pending(&pool, "alice@example.com").await;

    let code = service
        .issue("alice@example.com", OtpPurpose::Verify)
        .await
        .unwrap();

    service
        .consume("alice@example.com", &code, OtpPurpose::Verify)
        .await
        .unwrap();

    let second = service
        .consume("alice@example.com", &code, OtpPurpose::Verify)
        .await;
    assert!(matches!(second, Err(AuthError::InvalidOtp)));
}

#[tokio::test]
async fn test_expired_code_rejected() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);

    test_helpers::insert_test_otp(
        &pool,
        "alice@example.com",
        "123456",
        OtpPurpose::Verify,
        Utc::now() - Duration::minutes(1),
    )
    .await;

    let result = service
        .consume("alice@example.com", "123456", OtpPurpose::Verify)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOtp)));
}

#[tokio::test]
async fn test_codes_are_purpose_scoped() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);

    test_helpers::insert_test_otp(
        &pool,
        "alice@example.com",
        "123456",
        OtpPurpose::Verify,
        Utc::now() + Duration::minutes(5),
    )
    .await;

    // A verification code cannot be spent on a password reset
    let wrong_purpose = service
        .consume("alice@example.com", "123456", OtpPurpose::Reset)
        .await;
    assert!(matches!(wrong_purpose, Err(AuthError::InvalidOtp)));

    // But it still works for its own purpose
    service
        .consume("alice@example.com", "123456", OtpPurpose::Verify)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reissue_invalidates_prior_code() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);
    plant_pending(&pool, "alice@example.com").await;

    let first = service
        .issue("alice@example.com", OtpPurpose::Verify)
        .await
        .unwrap();
    let second = service
        .issue("alice@example.com", OtpPurpose::Verify)
        .await
        .unwrap();

    if first != second {
        let stale = service
            .consume("alice@example.com", &first, OtpPurpose::Verify)
            .await;
        assert!(matches!(stale, Err(AuthError::InvalidOtp)));
    }

    service
        .consume("alice@example.com", &second, OtpPurpose::Verify)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reissue_leaves_other_purpose_alone() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);
    plant_pending(&pool, "alice@example.com").await;

    test_helpers::insert_test_otp(
        &pool,
        "alice@example.com",
        "654321",
        OtpPurpose::Reset,
        Utc::now() + Duration::minutes(5),
    )
    .await;

    service
        .issue("alice@example.com", OtpPurpose::Verify)
        .await
        .unwrap();

    // The reset code survives a verification reissue
    service
        .consume("alice@example.com", "654321", OtpPurpose::Reset)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_issue_requires_known_recipient() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = build_otp_service(&pool);

    let result = service.issue("ghost@example.com", OtpPurpose::Verify).await;
    assert!(matches!(result, Err(AuthError::NotFound(_))));
}

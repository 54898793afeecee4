use crate::db;
use crate::services::mailer::Mailer;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

pub const CODE_EXPIRY_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Invalid or expired verification code.")]
    InvalidOrExpired,
    #[error("Invalid verification code.")]
    InvalidCode,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Uniform 6-digit numeric code, 100000-999999.
pub fn generate_code(rng: &mut impl Rng) -> String {
    rng.gen_range(100_000..1_000_000).to_string()
}

pub fn hash_code(code: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash code: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn code_matches(code: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(code.as_bytes(), &parsed)
        .is_ok()
}

/// Issue a fresh code for the email. A prior pending request is
/// overwritten, so only the latest requested code remains valid. The
/// request succeeds once the row is persisted; email delivery failure is
/// logged and swallowed, leaving the stored code usable.
pub async fn request_code(pool: &PgPool, mailer: &Mailer, email: &str) -> anyhow::Result<()> {
    let code = generate_code(&mut rand::thread_rng());
    let token_hash = hash_code(&code)?;
    let expires = Utc::now() + Duration::minutes(CODE_EXPIRY_MINUTES);

    db::upsert_verification_request(pool, email, &token_hash, expires).await?;

    if let Err(e) = mailer.send_verification_code(email, &code).await {
        tracing::error!("Failed to send verification email to {}: {}", email, e);
    }
    Ok(())
}

/// Check a submitted code and consume the request. The consume is a
/// conditional update, so of two concurrent verifications exactly one
/// succeeds; the loser sees InvalidOrExpired. On success the anonymous
/// user for the email is resolved or created and its id returned.
pub async fn verify_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, VerifyError> {
    let request = db::find_active_verification_request(pool, email)
        .await?
        .ok_or(VerifyError::InvalidOrExpired)?;

    if !code_matches(code, &request.token_hash) {
        return Err(VerifyError::InvalidCode);
    }

    let consumed = db::mark_verification_consumed(pool, request.id).await?;
    if !consumed {
        return Err(VerifyError::InvalidOrExpired);
    }

    let anonymous_user_id = db::upsert_anonymous_user_by_email(pool, email).await?;
    Ok(anonymous_user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&value));
        }
    }

    #[test]
    fn hash_verifies_matching_code_only() {
        let hash = hash_code("483920").unwrap();
        assert!(code_matches("483920", &hash));
        assert!(!code_matches("483921", &hash));
        assert!(!code_matches("", &hash));
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!code_matches("123456", "not-a-phc-string"));
    }

    #[test]
    fn fresh_salts_produce_distinct_hashes() {
        let a = hash_code("555555").unwrap();
        let b = hash_code("555555").unwrap();
        assert_ne!(a, b);
        assert!(code_matches("555555", &a));
        assert!(code_matches("555555", &b));
    }
}

//! One-time email verification codes for first-time password setup.
//!
//! A code is 6 digits, lives 10 minutes and allows 3 wrong guesses. Issuing
//! a new code replaces any earlier one for the same user.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// How long an issued code stays valid.
pub const CODE_TTL_SECS: u64 = 10 * 60;

/// Wrong guesses allowed before the code is locked.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingCode {
    code: String,
    attempts: u32,
    /// Unix seconds.
    expires_at: i64,
}

fn code_key(user_id: i32) -> String {
    format!("timetable:verify:{user_id}")
}

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Create and store a fresh code for `user_id`, replacing any previous one.
pub async fn issue_code(kv: &dyn KeyValueStore, user_id: i32) -> Result<String, ApiError> {
    let pending = PendingCode {
        code: generate_code(),
        attempts: 0,
        expires_at: Utc::now().timestamp() + CODE_TTL_SECS as i64,
    };
    store(kv, user_id, &pending, CODE_TTL_SECS).await?;
    Ok(pending.code)
}

/// Check `code` against the pending one. A match consumes it; a miss counts
/// as an attempt.
pub async fn check_code(kv: &dyn KeyValueStore, user_id: i32, code: &str) -> Result<(), ApiError> {
    let key = code_key(user_id);
    let Some(raw) = kv.get(&key).await? else {
        return Err(ApiError::bad_request(
            "Verification code expired or not requested. Please request a new one.",
        ));
    };
    let mut pending: PendingCode =
        serde_json::from_str(&raw).map_err(|_| ApiError::internal("corrupt verification data"))?;

    let remaining = pending.expires_at - Utc::now().timestamp();
    if remaining <= 0 {
        kv.del(&key).await?;
        return Err(ApiError::bad_request(
            "Verification code expired. Please request a new one.",
        ));
    }

    if pending.attempts >= MAX_ATTEMPTS {
        return Err(ApiError::bad_request(
            "Too many attempts. Please request a new verification code.",
        ));
    }

    if pending.code != code {
        pending.attempts += 1;
        store(kv, user_id, &pending, remaining as u64).await?;
        tracing::debug!(user_id, attempts = pending.attempts, "wrong verification code");
        return Err(ApiError::bad_request("Invalid verification code"));
    }

    kv.del(&key).await?;
    Ok(())
}

async fn store(
    kv: &dyn KeyValueStore,
    user_id: i32,
    pending: &PendingCode,
    ttl_secs: u64,
) -> Result<(), ApiError> {
    let value =
        serde_json::to_string(pending).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&code_key(user_id), &value, ttl_secs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kv::MemoryStore;

    #[test]
    fn code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn correct_code_is_consumed() {
        let kv = MemoryStore::new();
        let code = issue_code(&kv, 1).await.unwrap();

        assert!(check_code(&kv, 1, &code).await.is_ok());
        assert!(check_code(&kv, 1, &code).await.is_err());
    }

    #[tokio::test]
    async fn locks_after_max_attempts() {
        let kv = MemoryStore::new();
        let code = issue_code(&kv, 1).await.unwrap();

        for _ in 0..MAX_ATTEMPTS {
            let err = check_code(&kv, 1, "bad").await.unwrap_err();
            assert_eq!(err.message, "Invalid verification code");
        }
        let err = check_code(&kv, 1, &code).await.unwrap_err();
        assert!(err.message.contains("Too many attempts"));
    }

    #[tokio::test]
    async fn reissue_resets_attempts() {
        let kv = MemoryStore::new();
        issue_code(&kv, 1).await.unwrap();
        check_code(&kv, 1, "bad").await.unwrap_err();
        check_code(&kv, 1, "bad").await.unwrap_err();

        let second = issue_code(&kv, 1).await.unwrap();
        check_code(&kv, 1, "bad").await.unwrap_err();
        check_code(&kv, 1, "bad").await.unwrap_err();
        assert!(check_code(&kv, 1, &second).await.is_ok());
    }

    #[tokio::test]
    async fn codes_are_per_user() {
        let kv = MemoryStore::new();
        let code = issue_code(&kv, 1).await.unwrap();
        assert!(check_code(&kv, 2, &code).await.is_err());
    }
}

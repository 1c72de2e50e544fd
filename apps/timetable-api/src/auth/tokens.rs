//! Opaque access tokens backed by the key-value store.

use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;
use crate::models::user::UserRole;

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

/// Access token TTL in seconds (24 hours).
pub const ACCESS_TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Data stored alongside an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenData {
    pub user_id: i32,
    pub role: UserRole,
}

fn access_key(token: &str) -> String {
    format!("timetable:pat:{token}")
}

/// Mint and store a fresh access token for `data`.
pub async fn issue_access_token(
    kv: &dyn KeyValueStore,
    data: &AccessTokenData,
) -> Result<String, ApiError> {
    let token = generate_opaque_token("pat", 32);
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&access_key(&token), &value, ACCESS_TOKEN_TTL_SECS)
        .await?;
    Ok(token)
}

pub async fn lookup_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<AccessTokenData>, ApiError> {
    match kv.get(&access_key(token)).await? {
        Some(v) => {
            let data: AccessTokenData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

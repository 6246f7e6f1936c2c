//! Accounts, password hashing and session tokens.

use std::num::NonZeroU32;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use serde::Serialize;
use tracing::{debug, info};

use tasklane_core::user::{Claims, User};
use tasklane_db::{Database, DbError};

use crate::ServiceError;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;

pub const DEFAULT_HASH_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Hash a password as `pbkdf2-sha256$<iterations>$<b64 salt>$<b64 hash>`.
pub fn hash_password(password: &str, iterations: NonZeroU32) -> Result<String, ServiceError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| ServiceError::Internal("random source unavailable".into()))?;

    let mut hash = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &mut hash);
    Ok(format!(
        "{HASH_SCHEME}${iterations}${}${}",
        B64.encode(salt),
        B64.encode(hash)
    ))
}

/// Constant-time check of `password` against a stored hash. Unparseable
/// hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(HASH_SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (B64.decode(salt), B64.decode(hash)) else {
        return false;
    };
    pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &hash).is_ok()
}

/// A well-formed hash no password matches. Verifying against it costs the
/// same as verifying against a real hash with `iterations`.
fn unmatchable_hash(iterations: NonZeroU32) -> String {
    format!(
        "{HASH_SCHEME}${iterations}${}${}",
        B64.encode([0u8; SALT_LEN]),
        B64.encode([0u8; CREDENTIAL_LEN])
    )
}

/// Run PBKDF2 work on the blocking pool.
async fn off_runtime<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))
}

async fn hash_password_blocking(password: &str, iterations: NonZeroU32) -> Result<String, ServiceError> {
    let password = password.to_string();
    off_runtime(move || hash_password(&password, iterations)).await?
}

async fn verify_password_blocking(password: &str, stored: &str) -> Result<bool, ServiceError> {
    let (password, stored) = (password.to_string(), stored.to_string());
    off_runtime(move || verify_password(&password, &stored)).await
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub hash_iterations: NonZeroU32,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::hours(24),
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }
}

/// A user together with a freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

pub struct AuthService {
    db: Arc<dyn Database>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: chrono::Duration,
    hash_iterations: NonZeroU32,
    /// Checked when the username is unknown, so both failures cost one PBKDF2 run.
    unknown_user_hash: String,
}

impl AuthService {
    pub fn new(db: Arc<dyn Database>, config: &AuthConfig) -> Self {
        Self {
            db,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: config.token_ttl,
            hash_iterations: config.hash_iterations,
            unknown_user_hash: unmatchable_hash(config.hash_iterations),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Username and password are required".into(),
            ));
        }

        let password_hash = hash_password_blocking(password, self.hash_iterations).await?;
        let user = self
            .db
            .create_user(username, &password_hash)
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => ServiceError::Conflict("Username already exists".into()),
                other => other.into(),
            })?;
        info!(user_id = user.id, username = %user.username, "user registered");

        let token = self.issue_token(user.id, &user.username)?;
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());
        let Some(user) = self.db.find_user_by_username(username.trim()).await? else {
            verify_password_blocking(password, &self.unknown_user_hash).await?;
            debug!(username = username.trim(), "login for unknown user");
            return Err(invalid());
        };
        if !verify_password_blocking(password, &user.password_hash).await? {
            debug!(username = %user.username, "password mismatch");
            return Err(invalid());
        }

        let token = self.issue_token(user.id, &user.username)?;
        Ok(AuthSession { user, token })
    }

    pub fn issue_token(&self, user_id: i64, username: &str) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))
    }

    /// Bad signature, malformed payload and expiry all yield the same error.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                ServiceError::Unauthorized("Invalid or expired token".into())
            })
    }

    pub async fn current_user(&self, claims: &Claims) -> Result<User, ServiceError> {
        self.db
            .get_user(claims.user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }
}

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::info;

use crate::{
    models::{
        auth::{AuthenticatedUser, Claims},
        user::{LoginResponse, User, UserProfile},
    },
    services::{metrics::LOGINS_COUNTER, ServiceResult},
    store::Store,
};

pub struct AuthService;

impl AuthService {
    /// Exact (username, password) match against the credential store.
    ///
    /// `Ok(None)` means the credentials did not match; store failures are
    /// returned as errors so the caller can tell the two apart.
    pub async fn login(
        store: &dyn Store,
        username: &str,
        password: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> ServiceResult<Option<LoginResponse>> {
        let user = match store.find_user_by_credentials(username.trim(), password).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                LOGINS_COUNTER.with_label_values(&["invalid"]).inc();
                info!("Rejected login for {}", username);
                return Ok(None);
            }
            Err(e) => {
                LOGINS_COUNTER.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
        };

        let access_token = Self::generate_session_token(&user, secret, ttl_seconds)?;

        LOGINS_COUNTER.with_label_values(&["success"]).inc();
        info!("User {} logged in as {}", user.username, user.role);

        let message = format!("Welcome, {} ({})", user.username, user.role.label());
        Ok(Some(LoginResponse {
            access_token,
            message,
            user: UserProfile::from(user),
        }))
    }

    pub fn generate_session_token(
        user: &User,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            division: user.division.clone(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn decode_session_token(token: &str, secret: &str) -> anyhow::Result<AuthenticatedUser> {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &key, &validation)?;
        let claims = data.claims;

        Ok(AuthenticatedUser {
            username: claims.sub,
            role: claims.role,
            division: claims.division,
        })
    }
}

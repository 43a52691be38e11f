use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    error::{AppError, AppResult},
    models::Role,
    policy::{self, Action, Resource},
    repo,
    state::AppState,
};

pub const SESSION_TTL_HOURS: i64 = 24;

/// An authenticated caller. Extraction fails with 401 when no valid session is present.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn authorize(&self, resource: Resource, action: Action) -> AppResult<()> {
        policy::authorize(Some(self.role), resource, action)?;
        Ok(())
    }
}

/// A caller that may be a guest. Malformed sessions and deleted accounts are treated as guests.
#[derive(Debug, Clone, Default)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn role(&self) -> Option<Role> {
        self.0.as_ref().map(|user| user.role)
    }
}

pub fn issue_token(config: &AppConfig, user_id: Uuid, role: Role) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(SESSION_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(config: &AppConfig, token: &str) -> AppResult<AuthUser> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthorized)?;
    let role = decoded
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized)?;

    Ok(AuthUser { user_id, role })
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(config: &AppConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_cookie_name,
        token,
        SESSION_TTL_HOURS * 3600
    );
    if config.session_cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(config: &AppConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.session_cookie_name
    )
}

/// Session token from `Authorization: Bearer` or, failing that, the session cookie.
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Loads the account behind decoded claims. The stored role wins over the one
/// in the token; `None` means the account no longer exists.
async fn current_user(state: &AppState, claims: AuthUser) -> AppResult<Option<AuthUser>> {
    let Some(user) = repo::users::find(&state.orm, claims.user_id).await? else {
        tracing::debug!(user_id = %claims.user_id, "session for missing user");
        return Ok(None);
    };
    let role = user
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if role != claims.role {
        tracing::debug!(user_id = %user.id, token_role = %claims.role, %role, "session role is stale");
    }
    Ok(Some(AuthUser {
        user_id: user.id,
        role,
    }))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers, &state.config.session_cookie_name)
            .ok_or(AppError::Unauthorized)?;
        let claims = decode_token(&state.config, &token)?;
        current_user(state, claims)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = session_token(&parts.headers, &state.config.session_cookie_name)
            .and_then(|token| decode_token(&state.config, &token).ok());
        let user = match claims {
            Some(claims) => current_user(state, claims).await?,
            None => None,
        };
        Ok(MaybeAuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jf_session=def"));
        assert_eq!(session_token(&headers, "jf_session").as_deref(), Some("abc"));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jf_session=tok123; lang=en"),
        );
        assert_eq!(session_token(&headers, "jf_session").as_deref(), Some("tok123"));
        assert_eq!(session_token(&headers, "other"), None);
    }

    #[test]
    fn empty_cookie_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jf_session="));
        assert_eq!(session_token(&headers, "jf_session"), None);
    }
}

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, SessionInfo},
    entity::users::ActiveModel as UserActive,
    error::{AppError, AppResult},
    middleware::auth::{MaybeAuthUser, issue_token},
    models::{Role, User},
    repo,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Loose address check: something before a single `@` and a dotted domain after it.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    let password = payload.password;

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if repo::users::find_by_email(&state.orm, &email).await?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(hash_password(&password)?),
        role: Set(Role::User.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.id),
            "user_register",
            "users",
            serde_json::json!({ "user_id": user.id }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Registration successful", User::from(user)))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let user = repo::users::find_by_email(&state.orm, &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "rejected login");
        return Err(AppError::InvalidCredentials);
    }

    let role = user
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let token = issue_token(&state.config, user.id, role)?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.id),
            "user_login",
            "users",
            serde_json::json!({ "user_id": user.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            token,
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

/// Current session, if any. Never fails for guests.
pub async fn session_info(
    state: &AppState,
    caller: &MaybeAuthUser,
) -> AppResult<ApiResponse<SessionInfo>> {
    let user = match &caller.0 {
        Some(auth) => repo::users::find(&state.orm, auth.user_id)
            .await?
            .map(User::from),
        None => None,
    };

    Ok(ApiResponse::ok(
        "Session",
        SessionInfo {
            authenticated: user.is_some(),
            user,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("abebe@example.com"));
        assert!(is_valid_email("a.b+c@shop.example.et"));
        assert!(!is_valid_email("abebe"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("abebe@localhost"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("secret1").expect("hash");
        assert!(verify_password("secret1", &hash).expect("verify"));
        assert!(!verify_password("secret2", &hash).expect("verify"));
    }
}

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{self, models::Role};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::AppState;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
    token: String,
}

#[derive(Serialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    email: String,
    name: String,
    role: Role,
    iss: Option<String>,
}

/// The principal behind the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(ApiError::Unauthorized)?;
        validate_token(&state.config, &token).map_err(|e| {
            tracing::warn!("Token error: {}", e);
            ApiError::Unauthorized
        })
    }
}

/// An authenticated user with the admin role. Other roles get 403.
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Hanya admin yang diizinkan".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// For endpoints open to anonymous callers. An invalid token counts as anonymous.
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            extract_token(parts).and_then(|token| validate_token(&state.config, &token).ok()),
        ))
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = db::find_user_by_email(&state.db, payload.email.trim()).await?;
    let Some(user) = user else {
        return Err(ApiError::Unauthorized);
    };

    let hash = user.password_hash.clone();
    let password = payload.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("password check task failed: {}", e))?;
    if !valid {
        tracing::info!(email = %user.email, "rejected login");
        return Err(ApiError::Unauthorized);
    }

    let profile = UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    };
    let token = create_jwt(&state.config, &profile)?;
    Ok(with_cookie(
        Json(AuthResponse { user: profile, token: token.clone() }),
        &build_auth_cookie(&state.config, &token),
    ))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    let mut errors = FieldErrors::new();
    errors.check(name.is_empty(), "name", "Nama wajib diisi");
    errors.check(name.chars().count() > 255, "name", "Nama maksimal 255 karakter");
    errors.check(!looks_like_email(&email), "email", "Format email tidak valid");
    errors.check(payload.password.chars().count() < 8, "password", "Password minimal 8 karakter");
    if errors.is_empty() && db::find_user_by_email(&state.db, &email).await?.is_some() {
        errors.add("email", "Email sudah terdaftar");
    }
    errors.into_result()?;

    let password = payload.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| anyhow::anyhow!("password hash task failed: {}", e))??;

    let id = Uuid::new_v4().to_string();
    db::create_user(&state.db, &id, name, &email, &hash, Role::Donatur, Utc::now()).await?;
    tracing::info!(user_id = %id, "donor registered");

    let profile = UserProfile {
        id,
        email,
        name: name.to_string(),
        role: Role::Donatur,
    };
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    with_cookie((StatusCode::OK, "OK"), &clear_auth_cookie(&state.config))
}

pub async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    Json(UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// Creates the configured admin account on first start.
pub async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&state.config.admin_email, &state.config.admin_password) else {
        return Ok(());
    };
    if db::find_user_by_email(&state.db, email).await?.is_some() {
        return Ok(());
    }
    let hash = hash_password(password)?;
    db::create_user(
        &state.db,
        &Uuid::new_v4().to_string(),
        "Administrator",
        &email.to_lowercase(),
        &hash,
        Role::Admin,
        Utc::now(),
    )
    .await?;
    tracing::info!(email = %email, "admin account created");
    Ok(())
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn create_jwt(config: &Config, user: &UserProfile) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("token expiry overflow"))?
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        exp: expiration as usize,
        iss: config.jwt_issuer.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )?;
    Ok(token)
}

fn validate_token(config: &Config, token: &str) -> anyhow::Result<AuthenticatedUser> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    if let Some(issuer) = &config.jwt_issuer {
        validation.set_issuer(&[issuer.as_str()]);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )?;

    Ok(AuthenticatedUser {
        id: data.claims.sub,
        email: data.claims.email,
        name: data.claims.name,
        role: data.claims.role,
    })
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
    {
        for cookie in cookie_header.split(';') {
            if let Some((k, v)) = cookie.trim().split_once('=') {
                if k == AUTH_COOKIE_NAME && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn with_cookie(body: impl IntoResponse, cookie: &str) -> axum::response::Response {
    let mut response = body.into_response();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid cookie header: {}", e),
    }
    response
}

fn build_auth_cookie(config: &Config, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if config.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie(config: &Config) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", AUTH_COOKIE_NAME);
    if config.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role) -> UserProfile {
        UserProfile {
            id: "u-1".into(),
            email: "u@example.com".into(),
            name: "U".into(),
            role,
        }
    }

    #[test]
    fn jwt_round_trips_role() {
        let config = Config::for_tests();
        let token = create_jwt(&config, &profile(Role::Admin)).expect("jwt");
        let user = validate_token(&config, &token).expect("valid");
        assert_eq!(user.id, "u-1");
        assert!(user.is_admin());
    }

    #[test]
    fn jwt_with_wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = create_jwt(&config, &profile(Role::Donatur)).expect("jwt");
        let other = Config {
            jwt_secret: "another-secret".into(),
            ..Config::for_tests()
        };
        assert!(validate_token(&other, &token).is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("bismillah123").expect("hash");
        assert!(verify_password("bismillah123", &hash));
        assert!(!verify_password("bismillah124", &hash));
        assert!(!verify_password("bismillah123", "not-a-hash"));
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@b.id"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.id"));
        assert!(!looks_like_email("plain"));
    }
}

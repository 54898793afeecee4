use crate::db;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::session;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ManagerSignupRequest {
    pub token: String,
    pub name: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/manager-signup", post(manager_signup))
        .with_state(state)
}

async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ip = addr.ip().to_string();
    if !state.login_limiter.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let user = db::find_user_by_email(&state.pool, payload.email.trim())
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = session::sign_session(user.id, user.role, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        session::session_cookie(&token)
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            user_id: user.id,
            role: user.role,
            name: user.name,
        }),
    ))
}

/// Consume a pending manager invitation: create the user and manager
/// profile, mark the invitation accepted, sign the new manager in.
async fn manager_signup(
    State(state): State<SharedState>,
    Json(payload): Json<ManagerSignupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = payload.name.trim();
    if name.is_empty() || payload.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let invitation = db::find_active_invitation_by_token(&state.pool, payload.token.trim())
        .await
        .map_err(|e| {
            tracing::error!("Invitation lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if db::find_user_by_email(&state.pool, &invitation.email)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    let salt = SaltString::generate(&mut rand_core::OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let mut tx = state.pool.begin().await.map_err(|e| {
        tracing::error!("Failed to open signup transaction: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // guard on accepted_at so a double-submitted token only signs up once
    let claimed = sqlx::query(
        r#"
        UPDATE manager_invitations
        SET accepted_at = now()
        WHERE id = $1
          AND accepted_at IS NULL
        "#,
    )
    .bind(invitation.id)
    .execute(&mut *tx)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if claimed.rows_affected() != 1 {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, name, password_hash, role)
        VALUES ($1, $2, $3, 'MANAGER')
        RETURNING id
        "#,
    )
    .bind(&invitation.email)
    .bind(name)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create manager user: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    sqlx::query("INSERT INTO managers (user_id) VALUES ($1)")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    tx.commit()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!("Manager {} signed up via invitation", invitation.email);

    let token = session::sign_session(user_id, UserRole::Manager, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        session::session_cookie(&token)
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            user_id,
            role: UserRole::Manager,
            name: name.to_string(),
        }),
    ))
}

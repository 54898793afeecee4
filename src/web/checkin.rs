use crate::db;
use crate::domain::checkin;
use crate::services::verification::{self, VerifyError};
use crate::state::SharedState;
use crate::web::Message;
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/request-code", post(request_code))
        .route("/verify-code", post(verify_code))
        .route("/submit", post(submit))
        .with_state(state)
}

#[derive(Deserialize)]
struct RequestCodePayload {
    email: String,
}

#[derive(Deserialize)]
struct VerifyCodePayload {
    email: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeResponse {
    success: bool,
    anonymous_user_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    message: String,
    submission_id: Uuid,
}

async fn request_code(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
    Json(payload): Json<RequestCodePayload>,
) -> Result<Json<Message>, (StatusCode, Json<Message>)> {
    let ip = addr.ip().to_string();
    if !state.code_request_limiter.check(&ip).await {
        tracing::warn!("Code request rate limit exceeded for IP: {}", ip);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Message::new("Too many requests. Please try again later."),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Invalid email address."),
        ));
    }
    if let Some(domain) = &state.config.checkin_email_domain {
        if !email.ends_with(domain.as_str()) {
            return Err((
                StatusCode::BAD_REQUEST,
                Message::new(format!(
                    "Invalid email address. Please use your {domain} email."
                )),
            ));
        }
    }

    verification::request_code(&state.pool, &state.mailer, &email)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create verification request for {}: {}", email, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("An error occurred while processing your request."),
            )
        })?;

    Ok(Message::new("Verification code sent successfully."))
}

async fn verify_code(
    State(state): State<SharedState>,
    Json(payload): Json<VerifyCodePayload>,
) -> Result<Json<VerifyCodeResponse>, (StatusCode, Json<Message>)> {
    let email = payload.email.trim().to_lowercase();
    let token = payload.token.trim();
    if email.is_empty() || token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Email and token are required."),
        ));
    }

    // per-email attempt limit; a 6-digit code must not be guessable
    if !state.verify_limiter.check(&email).await {
        tracing::warn!("Verification attempt limit exceeded for {}", email);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Message::new("Too many attempts. Please request a new code."),
        ));
    }

    match verification::verify_code(&state.pool, &email, token).await {
        Ok(anonymous_user_id) => Ok(Json(VerifyCodeResponse {
            success: true,
            anonymous_user_id,
        })),
        Err(e @ (VerifyError::InvalidOrExpired | VerifyError::InvalidCode)) => {
            Err((StatusCode::BAD_REQUEST, Message::new(e.to_string())))
        }
        Err(VerifyError::Internal(e)) => {
            tracing::error!("Verification failed for {}: {}", email, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("An error occurred during verification."),
            ))
        }
    }
}

async fn submit(
    State(state): State<SharedState>,
    Json(payload): Json<checkin::CheckinPayload>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<Message>)> {
    let valid = checkin::validate(payload)
        .map_err(|e| (StatusCode::BAD_REQUEST, Message::new(e.to_string())))?;

    let internal = |e: sqlx::Error| {
        tracing::error!("Submission failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::new("Internal Server Error"),
        )
    };

    let group = db::find_focus_group_by_name(&state.pool, &valid.focus_group)
        .await
        .map_err(|e| {
            tracing::error!("Focus group lookup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("Internal Server Error"),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Message::new(format!("Focus group '{}' not found.", valid.focus_group)),
            )
        })?;

    // geo-based region detection is disabled; everything lands in UNKNOWN
    let region = "UNKNOWN";

    let mut tx = state.pool.begin().await.map_err(internal)?;

    sqlx::query(
        r#"
        INSERT INTO anonymous_users (id, region)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET region = EXCLUDED.region
        "#,
    )
    .bind(valid.anonymous_user_id)
    .bind(region)
    .execute(&mut *tx)
    .await
    .map_err(internal)?;

    let submission_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO submissions (
            anonymous_user_id, focus_group_id, overall_mood,
            positive_aspects, negative_aspects, hours_worked,
            did_not_work, comment, region
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(valid.anonymous_user_id)
    .bind(group.id)
    .bind(valid.overall_mood)
    .bind(&valid.positive_aspects)
    .bind(&valid.negative_aspects)
    .bind(valid.hours_worked)
    .bind(valid.did_not_work)
    .bind(&valid.comment)
    .bind(region)
    .fetch_one(&mut *tx)
    .await
    .map_err(internal)?;

    sqlx::query(
        r#"
        INSERT INTO action_logs (action_type, anonymous_user_id, details)
        VALUES ('SUBMISSION', $1, $2)
        "#,
    )
    .bind(valid.anonymous_user_id)
    .bind(json!({
        "submissionId": submission_id,
        "region": region,
        "didNotWork": valid.did_not_work,
        "overallMood": valid.overall_mood,
        "hoursWorked": valid.hours_worked,
        "hasComment": valid.comment.is_some(),
        "focusGroup": group.name,
        "focusGroupId": group.id,
    }))
    .execute(&mut *tx)
    .await
    .map_err(internal)?;

    tx.commit().await.map_err(internal)?;

    tracing::info!(
        "Submission {} stored for anonymous user {}",
        submission_id,
        valid.anonymous_user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Submission successful".to_string(),
            submission_id,
        }),
    ))
}

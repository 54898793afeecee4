use crate::db;
use crate::domain::models::UserRole;
use crate::import;
use crate::state::SharedState;
use crate::web::session::UserSession;
use crate::web::Message;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/focus-groups", get(list_focus_groups))
        .route("/focus-groups", post(create_focus_group))
        .route("/assign-manager", post(assign_manager))
        .route("/managers", get(list_managers))
        .route("/invite-manager", post(invite_manager))
        .route("/upload-data", post(upload_data))
        .with_state(state)
}

const INVITE_EXPIRY_HOURS: i64 = 24;

#[derive(Deserialize)]
pub struct CreateFocusGroupPayload {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignManagerPayload {
    pub group_id: Uuid,
    pub manager_user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct InviteManagerPayload {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InviteManagerResponse {
    message: String,
    invitation_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: String,
    inserted_count: usize,
    skipped_count: usize,
    validation_errors: Vec<String>,
}

async fn require_admin(state: &SharedState, user_id: Uuid) -> Result<db::DbUser, StatusCode> {
    let requesting_user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find requesting user {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if requesting_user.role != UserRole::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(requesting_user)
}

async fn list_focus_groups(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::DbFocusGroup>>, StatusCode> {
    require_admin(&state, user_id).await?;

    let groups = db::list_focus_groups(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to list focus groups: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(groups))
}

async fn create_focus_group(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateFocusGroupPayload>,
) -> Result<(StatusCode, Json<db::DbFocusGroup>), (StatusCode, Json<Message>)> {
    require_admin(&state, user_id)
        .await
        .map_err(|status| (status, Message::new("Unauthorized")))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Focus group name is required"),
        ));
    }
    let description = payload
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let existing = db::find_focus_group_by_name(&state.pool, name)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("Internal Server Error"),
            )
        })?;
    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Message::new(format!("Focus group '{name}' already exists")),
        ));
    }

    let group = db::insert_focus_group(&state.pool, name, description)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create focus group: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Message::new("Internal Server Error"),
            )
        })?;

    Ok((StatusCode::CREATED, Json(group)))
}

async fn assign_manager(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<AssignManagerPayload>,
) -> Result<Json<db::DbFocusGroup>, StatusCode> {
    require_admin(&state, user_id).await?;

    let group = db::find_focus_group_by_id(&state.pool, payload.group_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let manager_id = match payload.manager_user_id {
        Some(manager_user_id) => {
            let manager = db::find_manager_by_user(&state.pool, manager_user_id)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .ok_or(StatusCode::NOT_FOUND)?;
            Some(manager.id)
        }
        None => None,
    };

    db::set_focus_group_manager(&state.pool, group.id, manager_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to assign manager to group {}: {}", group.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let updated = db::find_focus_group_by_id(&state.pool, group.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(updated))
}

async fn list_managers(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::ManagerWithUser>>, StatusCode> {
    require_admin(&state, user_id).await?;

    let managers = db::list_managers(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to list managers: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(managers))
}

fn generate_invite_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn invite_manager(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<InviteManagerPayload>,
) -> Result<(StatusCode, Json<InviteManagerResponse>), (StatusCode, Json<Message>)> {
    require_admin(&state, user_id)
        .await
        .map_err(|status| (status, Message::new("Unauthorized")))?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("Valid email address is required"),
        ));
    }

    let internal = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::new("Internal Server Error"),
        )
    };

    if db::find_user_by_email(&state.pool, &email)
        .await
        .map_err(|_| internal())?
        .is_some()
    {
        return Err((
            StatusCode::CONFLICT,
            Message::new("A user with this email already exists."),
        ));
    }
    if db::find_invitation_by_email(&state.pool, &email)
        .await
        .map_err(|_| internal())?
        .is_some()
    {
        return Err((
            StatusCode::CONFLICT,
            Message::new("An invitation already exists for this email."),
        ));
    }

    let token = generate_invite_token();
    let expires = Utc::now() + Duration::hours(INVITE_EXPIRY_HOURS);
    let invitation_id = db::insert_manager_invitation(&state.pool, &email, &token, expires)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create manager invitation: {}", e);
            internal()
        })?;

    let invite_link = format!(
        "{}/auth/manager-signup?token={}",
        state.config.public_base_url, token
    );
    let email_sent = match state.mailer.send_manager_invite(&email, &invite_link).await {
        Ok(()) => true,
        Err(e) => {
            // the invitation record stands even when delivery fails
            tracing::warn!("Failed to send invitation email to {}: {}", email, e);
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(InviteManagerResponse {
            message: format!(
                "Invitation created for {email}.{}",
                if email_sent { " Email sent." } else { " Email failed to send." }
            ),
            invitation_id,
        }),
    ))
}

/// Bulk import of historical submissions from a CSV or JSON file.
/// Invalid rows are skipped and reported; valid rows are inserted, so a
/// partially bad file still loads its good records.
async fn upload_data(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), (StatusCode, Json<Message>)> {
    let admin = require_admin(&state, user_id)
        .await
        .map_err(|status| (status, Message::new("Unauthorized")))?;

    let internal = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Message::new("Internal Server Error during data upload"),
        )
    };

    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Message::new("Malformed multipart request"),
        )
    })? {
        if field.name() == Some("dataUpload") || field.file_name().is_some() {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|ct| ct.to_string());
            let bytes = field.bytes().await.map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    Message::new("Failed to read uploaded file"),
                )
            })?;
            upload = Some((filename, content_type, bytes.to_vec()));
            break;
        }
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err((StatusCode::BAD_REQUEST, Message::new("No file uploaded")));
    };
    tracing::info!(
        "Received upload {} ({} bytes) from admin {}",
        filename,
        bytes.len(),
        admin.id
    );

    let format = import::detect_format(&filename, content_type.as_deref())
        .map_err(|e| (StatusCode::BAD_REQUEST, Message::new(e.to_string())))?;
    let records = import::parse_upload(format, &bytes)
        .map_err(|e| (StatusCode::BAD_REQUEST, Message::new(e.to_string())))?;
    if records.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("No valid data found in the file."),
        ));
    }

    let mut errors: Vec<String> = Vec::new();
    let mut inserted = 0usize;
    let mut group_cache: HashMap<String, Option<Uuid>> = HashMap::new();

    for record in &records {
        let row = match import::validate_record(record) {
            Ok(row) => row,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let group_id = match group_cache.get(&row.focus_group) {
            Some(cached) => *cached,
            None => {
                let found = db::find_focus_group_by_name(&state.pool, &row.focus_group)
                    .await
                    .map_err(|_| internal())?
                    .map(|g| g.id);
                group_cache.insert(row.focus_group.clone(), found);
                found
            }
        };
        let Some(group_id) = group_id else {
            errors.push(format!(
                "Focus Group '{}' not found for record: {record}",
                row.focus_group
            ));
            continue;
        };

        if let Err(e) = insert_imported_row(&state, group_id, &row).await {
            tracing::error!("Failed to insert uploaded record: {}", e);
            errors.push(format!("Database error for record: {record}"));
            continue;
        }
        inserted += 1;
    }

    if inserted == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Message::new("No valid submissions could be created from the file after validation."),
        ));
    }

    if let Err(e) = db::insert_action_log(
        &state.pool,
        "UPLOAD",
        None,
        None,
        &json!({
            "fileName": filename,
            "insertedCount": inserted,
            "skippedCount": errors.len(),
            "adminUserId": admin.id,
        }),
    )
    .await
    {
        tracing::warn!("Failed to record upload action log: {}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: format!(
                "Data upload successful. {inserted} submissions created. {} records skipped due to validation errors.",
                errors.len()
            ),
            inserted_count: inserted,
            skipped_count: errors.len(),
            validation_errors: errors,
        }),
    ))
}

async fn insert_imported_row(
    state: &SharedState,
    group_id: Uuid,
    row: &import::ParsedRow,
) -> anyhow::Result<()> {
    let anonymous_user_id = row.anonymous_user_id.unwrap_or_else(Uuid::new_v4);
    let submitted_at: Option<DateTime<Utc>> = row.submitted_at;

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO anonymous_users (id, region)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(anonymous_user_id)
    .bind(&row.region)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO submissions (
            anonymous_user_id, focus_group_id, submitted_at, overall_mood,
            positive_aspects, negative_aspects, hours_worked,
            did_not_work, comment, region
        )
        VALUES ($1, $2, COALESCE($3, now()), $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(anonymous_user_id)
    .bind(group_id)
    .bind(submitted_at)
    .bind(row.overall_mood)
    .bind(&row.positive_aspects)
    .bind(&row.negative_aspects)
    .bind(row.hours_worked)
    .bind(row.did_not_work)
    .bind(&row.comment)
    .bind(&row.region)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_tokens_are_64_hex_chars() {
        let token = generate_invite_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_invite_token());
    }
}

pub mod seed;

use crate::analytics::SubmissionRecord;
use crate::domain::models::UserRole;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DbManager {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbFocusGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ManagerWithUser {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub focus_group: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct DbVerificationRequest {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub expires: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub struct DbManagerInvitation {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub expires: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    submitted_at: DateTime<Utc>,
    overall_mood: Option<i16>,
    positive_aspects: Vec<String>,
    negative_aspects: Vec<String>,
    hours_worked: Option<f64>,
    did_not_work: bool,
    focus_group_id: Uuid,
    focus_group_name: String,
}

// ---------- users ----------

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, name, password_hash, role, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, name, password_hash, role, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

// ---------- managers ----------

pub async fn find_manager_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<DbManager>> {
    let manager = sqlx::query_as::<_, DbManager>(
        r#"
        SELECT id, user_id, created_at
        FROM managers
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(manager)
}

pub async fn list_managers(pool: &PgPool) -> Result<Vec<ManagerWithUser>> {
    let managers = sqlx::query_as::<_, ManagerWithUser>(
        r#"
        SELECT m.id, m.user_id, u.name, u.email, fg.name AS focus_group
        FROM managers m
        JOIN users u ON u.id = m.user_id
        LEFT JOIN focus_groups fg ON fg.manager_id = m.id
        ORDER BY u.name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(managers)
}

/// Focus group currently assigned to a manager profile, if any.
pub async fn find_group_for_manager(
    pool: &PgPool,
    manager_id: Uuid,
) -> Result<Option<DbFocusGroup>> {
    let group = sqlx::query_as::<_, DbFocusGroup>(
        r#"
        SELECT id, name, description, manager_id, created_at
        FROM focus_groups
        WHERE manager_id = $1
        "#,
    )
    .bind(manager_id)
    .fetch_optional(pool)
    .await?;
    Ok(group)
}

// ---------- focus groups ----------

pub async fn list_focus_groups(pool: &PgPool) -> Result<Vec<DbFocusGroup>> {
    let groups = sqlx::query_as::<_, DbFocusGroup>(
        r#"
        SELECT id, name, description, manager_id, created_at
        FROM focus_groups
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(groups)
}

pub async fn find_focus_group_by_name(pool: &PgPool, name: &str) -> Result<Option<DbFocusGroup>> {
    let group = sqlx::query_as::<_, DbFocusGroup>(
        r#"
        SELECT id, name, description, manager_id, created_at
        FROM focus_groups
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(group)
}

pub async fn find_focus_group_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbFocusGroup>> {
    let group = sqlx::query_as::<_, DbFocusGroup>(
        r#"
        SELECT id, name, description, manager_id, created_at
        FROM focus_groups
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(group)
}

pub async fn insert_focus_group(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
) -> Result<DbFocusGroup> {
    let group = sqlx::query_as::<_, DbFocusGroup>(
        r#"
        INSERT INTO focus_groups (name, description)
        VALUES ($1, $2)
        RETURNING id, name, description, manager_id, created_at
        "#,
    )
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(group)
}

/// Assign or clear a group's manager. Clearing first avoids tripping the
/// unique constraint when a manager moves between groups.
pub async fn set_focus_group_manager(
    pool: &PgPool,
    group_id: Uuid,
    manager_id: Option<Uuid>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    if let Some(manager_id) = manager_id {
        sqlx::query("UPDATE focus_groups SET manager_id = NULL WHERE manager_id = $1")
            .bind(manager_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE focus_groups SET manager_id = $2 WHERE id = $1")
        .bind(group_id)
        .bind(manager_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// ---------- anonymous users ----------

pub async fn upsert_anonymous_user_by_email(pool: &PgPool, email: &str) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO anonymous_users (email)
        VALUES ($1)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

// ---------- submissions ----------

/// Snapshot for the aggregator: ascending by timestamp, group name joined,
/// optionally scoped to one focus group.
pub async fn load_submission_records(
    pool: &PgPool,
    focus_group_id: Option<Uuid>,
) -> Result<Vec<SubmissionRecord>> {
    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT
            s.submitted_at,
            s.overall_mood,
            s.positive_aspects,
            s.negative_aspects,
            s.hours_worked,
            s.did_not_work,
            s.focus_group_id,
            fg.name AS focus_group_name
        FROM submissions s
        JOIN focus_groups fg ON fg.id = s.focus_group_id
        WHERE $1::uuid IS NULL OR s.focus_group_id = $1
        ORDER BY s.submitted_at ASC
        "#,
    )
    .bind(focus_group_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SubmissionRecord {
            submitted_at: row.submitted_at,
            overall_mood: row.overall_mood,
            positive_aspects: row.positive_aspects,
            negative_aspects: row.negative_aspects,
            hours_worked: row.hours_worked,
            did_not_work: row.did_not_work,
            focus_group_id: row.focus_group_id,
            focus_group_name: row.focus_group_name,
        })
        .collect())
}

// ---------- verification requests ----------

/// Upsert by email: a new request always replaces a prior one, so only
/// the most recently issued code is ever valid.
pub async fn upsert_verification_request(
    pool: &PgPool,
    email: &str,
    token_hash: &str,
    expires: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO verification_requests (email, token_hash, expires)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET token_hash = EXCLUDED.token_hash,
            expires = EXCLUDED.expires,
            created_at = now(),
            verified_at = NULL
        "#,
    )
    .bind(email)
    .bind(token_hash)
    .bind(expires)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_active_verification_request(
    pool: &PgPool,
    email: &str,
) -> Result<Option<DbVerificationRequest>> {
    let request = sqlx::query_as::<_, DbVerificationRequest>(
        r#"
        SELECT id, email, token_hash, expires, created_at, verified_at
        FROM verification_requests
        WHERE email = $1
          AND verified_at IS NULL
          AND expires > now()
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(request)
}

/// Conditional consume: returns false when a concurrent verification
/// already claimed the request.
pub async fn mark_verification_consumed(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE verification_requests
        SET verified_at = now()
        WHERE id = $1
          AND verified_at IS NULL
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ---------- manager invitations ----------

pub async fn find_invitation_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<DbManagerInvitation>> {
    let invitation = sqlx::query_as::<_, DbManagerInvitation>(
        r#"
        SELECT id, email, token, expires, created_at, accepted_at
        FROM manager_invitations
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(invitation)
}

pub async fn find_active_invitation_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<DbManagerInvitation>> {
    let invitation = sqlx::query_as::<_, DbManagerInvitation>(
        r#"
        SELECT id, email, token, expires, created_at, accepted_at
        FROM manager_invitations
        WHERE token = $1
          AND accepted_at IS NULL
          AND expires > now()
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(invitation)
}

pub async fn insert_manager_invitation(
    pool: &PgPool,
    email: &str,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO manager_invitations (email, token, expires)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(token)
    .bind(expires)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

// ---------- regional messages & action logs ----------

pub async fn list_region_recipients(pool: &PgPool, region: &str) -> Result<Vec<String>> {
    let emails: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT email
        FROM anonymous_users
        WHERE region = $1
          AND email IS NOT NULL
        "#,
    )
    .bind(region)
    .fetch_all(pool)
    .await?;
    Ok(emails)
}

pub async fn insert_action_log(
    pool: &PgPool,
    action_type: &str,
    anonymous_user_id: Option<Uuid>,
    manager_id: Option<Uuid>,
    details: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO action_logs (action_type, anonymous_user_id, manager_id, details)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(action_type)
    .bind(anonymous_user_id)
    .bind(manager_id)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}

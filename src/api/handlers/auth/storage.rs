//! Database helpers for principals, refresh-token ledgers, and verification
//! state.
//!
//! Every public helper is wrapped in a 5 second timeout so a stalled database
//! surfaces as a 500 instead of a hung request. Ledger mutations load the row
//! `FOR UPDATE`, mutate in memory, and write back in one `UPDATE`, so two
//! concurrent refreshes with the same token serialize and only one wins.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use crate::ledger::{Ledger, TokenMeta};
use crate::roles::Role;

use super::state::AuthConfig;
use super::utils::{
    build_reset_url, build_verify_url, generate_opaque_token, hash_opaque_token,
    is_unique_violation,
};

const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound a storage future so a stalled database cannot hang a request.
async fn bounded<T>(
    op: &'static str,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(STORE_TIMEOUT, fut)
        .await
        .map_err(|_| anyhow!("storage operation timed out: {op}"))?
}

/// Outcome when attempting to create a new principal.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created(PrincipalRecord),
    Conflict,
}

/// Outcome of a refresh-token rotation attempt.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum RotateOutcome {
    Rotated,
    Rejected,
}

/// Outcome for a resend request (always 204 to avoid account probing).
#[derive(Debug)]
pub(super) enum ResendOutcome {
    Queued,
    Cooldown,
    Noop,
}

/// Full principal row as stored, password hash included. Never serialized to
/// the wire; handlers project it into a response type.
#[derive(Debug, Clone)]
pub(crate) struct PrincipalRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) role: Role,
    pub(crate) token_version: i64,
    pub(crate) email_verified_at: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
}

fn principal_from_row(row: &PgRow) -> Result<PrincipalRecord> {
    let role: String = row.get("role");
    Ok(PrincipalRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role).context("unknown role stored on principal")?,
        token_version: row.get("token_version"),
        email_verified_at: row.get("email_verified_at"),
        created_at: row.get("created_at"),
    })
}

/// Look up a principal by normalized email. One lookup serves both user and
/// admin logins; the role column says which kind came back.
pub(crate) async fn lookup_principal_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PrincipalRecord>> {
    bounded("lookup_principal_by_email", async {
        let query = "SELECT id, name, email, password_hash, role, token_version, email_verified_at, created_at FROM principals WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup principal by email")?;

        row.as_ref().map(principal_from_row).transpose()
    })
    .await
}

pub(crate) async fn lookup_principal_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<PrincipalRecord>> {
    bounded("lookup_principal_by_id", async {
        let query = "SELECT id, name, email, password_hash, role, token_version, email_verified_at, created_at FROM principals WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to lookup principal by id")?;

        row.as_ref().map(principal_from_row).transpose()
    })
    .await
}

/// Create a self-registered principal plus its verification token and the
/// outbox row for the verification email, all in one transaction.
pub(super) async fn insert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    config: &AuthConfig,
) -> Result<SignupOutcome> {
    bounded("insert_user", async {
        let mut tx = pool.begin().await.context("begin signup transaction")?;

        let query = r"
            INSERT INTO principals
                (name, email, password_hash, role)
            VALUES ($1, $2, $3, 'student')
            RETURNING id, name, email, password_hash, role, token_version, email_verified_at, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let record = match row {
            Ok(row) => principal_from_row(&row)?,
            Err(err) => {
                if is_unique_violation(&err) {
                    let _ = tx.rollback().await;
                    return Ok(SignupOutcome::Conflict);
                }
                return Err(err).context("failed to insert principal");
            }
        };

        let _token = insert_verification_records(&mut tx, record.id, email, config).await?;

        tx.commit().await.context("commit signup transaction")?;

        Ok(SignupOutcome::Created(record))
    })
    .await
}

/// Create an admin-provisioned principal. No verification email is sent; the
/// account is considered verified from the start.
pub(crate) async fn insert_provisioned_principal(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<SignupOutcome> {
    bounded("insert_provisioned_principal", async {
        let query = r"
            INSERT INTO principals
                (name, email, password_hash, role, email_verified_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, name, email, password_hash, role, token_version, email_verified_at, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(SignupOutcome::Created(principal_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert provisioned principal"),
        }
    })
    .await
}

/// Load the principal's ledger under a row lock.
async fn lock_ledger(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<Option<(i64, Ledger)>> {
    let query =
        "SELECT token_version, refresh_tokens FROM principals WHERE id = $1 FOR UPDATE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to lock refresh ledger")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let version: i64 = row.get("token_version");
    let raw: serde_json::Value = row.get("refresh_tokens");
    let ledger: Ledger = serde_json::from_value(raw).context("failed to decode refresh ledger")?;
    Ok(Some((version, ledger)))
}

async fn store_ledger(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    ledger: &Ledger,
) -> Result<()> {
    let query = "UPDATE principals SET refresh_tokens = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let encoded = serde_json::to_value(ledger).context("failed to encode refresh ledger")?;
    sqlx::query(query)
        .bind(id)
        .bind(encoded)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to store refresh ledger")?;
    Ok(())
}

/// Record a freshly issued refresh token in the principal's ledger.
pub(super) async fn record_refresh_token(
    pool: &PgPool,
    id: Uuid,
    token: &str,
    ttl_seconds: i64,
    meta: TokenMeta,
) -> Result<()> {
    bounded("record_refresh_token", async {
        let mut tx = pool.begin().await.context("begin ledger transaction")?;

        let Some((_, mut ledger)) = lock_ledger(&mut tx, id).await? else {
            // Principal deleted between token issuance and ledger write.
            let _ = tx.rollback().await;
            return Ok(());
        };

        ledger.add(token, chrono::Duration::seconds(ttl_seconds), meta, Utc::now());
        store_ledger(&mut tx, id, &ledger).await?;
        tx.commit().await.context("commit ledger transaction")
    })
    .await
}

/// Atomically replace `old` with `new` in the ledger.
///
/// Rejects when the presented token is not live (already rotated, revoked, or
/// expired) or when the refresh token's embedded version no longer matches
/// the stored `token_version`.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    id: Uuid,
    expected_version: i64,
    old: &str,
    new: &str,
    ttl_seconds: i64,
    meta: TokenMeta,
) -> Result<RotateOutcome> {
    bounded("rotate_refresh_token", async {
        let mut tx = pool.begin().await.context("begin rotate transaction")?;

        let Some((version, mut ledger)) = lock_ledger(&mut tx, id).await? else {
            let _ = tx.rollback().await;
            return Ok(RotateOutcome::Rejected);
        };

        let outcome = apply_rotation(
            version,
            expected_version,
            &mut ledger,
            old,
            new,
            chrono::Duration::seconds(ttl_seconds),
            meta,
            Utc::now(),
        );
        if outcome == RotateOutcome::Rejected {
            let _ = tx.rollback().await;
            return Ok(RotateOutcome::Rejected);
        }

        store_ledger(&mut tx, id, &ledger).await?;
        tx.commit().await.context("commit rotate transaction")?;
        Ok(RotateOutcome::Rotated)
    })
    .await
}

/// The in-transaction rotation decision: the refresh token's embedded version
/// must match the stored epoch and the token must still be live in the
/// ledger. Only then is it swapped for the replacement.
#[allow(clippy::too_many_arguments)]
fn apply_rotation(
    stored_version: i64,
    expected_version: i64,
    ledger: &mut Ledger,
    old: &str,
    new: &str,
    ttl: chrono::Duration,
    meta: TokenMeta,
    now: DateTime<Utc>,
) -> RotateOutcome {
    if stored_version != expected_version || !ledger.accept(old, now) {
        return RotateOutcome::Rejected;
    }
    ledger.rotate(old, new, ttl, meta, now);
    RotateOutcome::Rotated
}

/// Drop one refresh token from the ledger. Idempotent; removing an absent
/// token is a no-op.
pub(super) async fn remove_refresh_token(pool: &PgPool, id: Uuid, token: &str) -> Result<()> {
    bounded("remove_refresh_token", async {
        let mut tx = pool.begin().await.context("begin ledger transaction")?;

        let Some((_, mut ledger)) = lock_ledger(&mut tx, id).await? else {
            let _ = tx.rollback().await;
            return Ok(());
        };

        if ledger.remove(token) {
            store_ledger(&mut tx, id, &ledger).await?;
        }
        tx.commit().await.context("commit ledger transaction")
    })
    .await
}

/// Revoke every outstanding refresh token: bump the version epoch and empty
/// the ledger in one statement.
pub(super) async fn bump_token_version(pool: &PgPool, id: Uuid) -> Result<()> {
    bounded("bump_token_version", async {
        let query = r"
            UPDATE principals
            SET token_version = token_version + 1,
                refresh_tokens = '[]'::jsonb,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to bump token version")?;
        Ok(())
    })
    .await
}

/// Store a password-reset token for a user-kind principal and queue the reset
/// email. Silently does nothing for unknown emails or admin accounts; callers
/// always answer 204.
pub(super) async fn request_password_reset(
    pool: &PgPool,
    email: &str,
    config: &AuthConfig,
) -> Result<()> {
    bounded("request_password_reset", async {
        let mut tx = pool.begin().await.context("begin reset transaction")?;

        let query = "SELECT id, role FROM principals WHERE email = $1 LIMIT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lookup principal for reset")?;

        let Some(row) = row else {
            return tx.commit().await.context("commit reset noop");
        };

        let role: String = row.get("role");
        let is_user = Role::from_str(&role).is_ok_and(|role| !role.is_admin());
        if !is_user {
            // Admin accounts recover out of band, never via emailed links.
            return tx.commit().await.context("commit reset noop");
        }

        let id: Uuid = row.get("id");
        let token = generate_opaque_token()?;
        let token_hash = hash_opaque_token(&token);

        let query = r"
            UPDATE principals
            SET reset_token_hash = $2,
                reset_expires_at = NOW() + ($3 * INTERVAL '1 second'),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(config.reset_ttl_seconds())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to store reset token")?;

        let reset_url = build_reset_url(config.frontend_base_url(), &token);
        enqueue_email(&mut tx, email, "reset_password", json!({
            "email": email,
            "reset_url": reset_url,
        }))
        .await?;

        tx.commit().await.context("commit reset transaction")
    })
    .await
}

/// Consume a password-reset token: set the new password, clear the reset
/// fields, bump the version epoch, and empty the ledger. The row is located
/// by token hash and locked, so a second consume finds nothing once the hash
/// is cleared; expired tokens fall through to `None` the same way.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token: &str,
    new_password_hash: &str,
) -> Result<Option<Uuid>> {
    bounded("consume_reset_token", async {
        let token_hash = hash_opaque_token(token);
        let mut tx = pool.begin().await.context("begin reset consume transaction")?;

        let query = r"
            SELECT id, reset_expires_at
            FROM principals
            WHERE reset_token_hash = $1
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lookup reset token")?;

        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Ok(None);
        };

        let expires_at: Option<DateTime<Utc>> = row.get("reset_expires_at");
        if !reset_grant_usable(expires_at, Utc::now()) {
            let _ = tx.rollback().await;
            return Ok(None);
        }

        let id: Uuid = row.get("id");
        let query = r"
            UPDATE principals
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_expires_at = NULL,
                token_version = token_version + 1,
                refresh_tokens = '[]'::jsonb,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(new_password_hash)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to consume reset token")?;

        tx.commit().await.context("commit reset consume transaction")?;
        Ok(Some(id))
    })
    .await
}

/// A located reset grant is usable only inside its expiry window; a cleared
/// window (already consumed) never is.
fn reset_grant_usable(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expires| expires > now)
}

/// Generate a verification token, store its hash, and queue the verification
/// email inside the caller's transaction. Returns the raw token.
pub(super) async fn insert_verification_records(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    principal_id: Uuid,
    email: &str,
    config: &AuthConfig,
) -> Result<String> {
    let token = generate_opaque_token()?;
    let token_hash = hash_opaque_token(&token);

    let query = r"
        INSERT INTO email_verification_tokens
            (principal_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(principal_id)
        .bind(token_hash)
        .bind(config.email_token_ttl_seconds())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email verification token")?;

    let verify_url = build_verify_url(config.frontend_base_url(), &token);
    enqueue_email(tx, email, "verify_email", json!({
        "email": email,
        "verify_url": verify_url,
    }))
    .await?;

    Ok(token)
}

async fn enqueue_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: &str,
    payload: serde_json::Value,
) -> Result<()> {
    let payload_text = serde_json::to_string(&payload).context("failed to serialize email payload")?;
    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;
    Ok(())
}

/// Mark a verification token consumed and stamp the principal verified, in
/// one transaction. Consumed and expired tokens both return `false`.
pub(super) async fn consume_verification_token(pool: &PgPool, token: &str) -> Result<bool> {
    bounded("consume_verification_token", async {
        let token_hash = hash_opaque_token(token);
        let mut tx = pool.begin().await.context("begin verification transaction")?;

        let query = r"
            UPDATE email_verification_tokens
            SET consumed_at = NOW()
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > NOW()
            RETURNING principal_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to consume verification token")?;

        let Some(row) = row else {
            return Ok(false);
        };

        let principal_id: Uuid = row.get("principal_id");
        let query = r"
            UPDATE principals
            SET email_verified_at = COALESCE(email_verified_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(principal_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to mark principal verified")?;

        tx.commit().await.context("commit verification transaction")?;
        Ok(true)
    })
    .await
}

/// Re-queue a verification email for a still-unverified principal, subject to
/// a per-principal cooldown. Always opaque to the caller.
pub(super) async fn enqueue_resend_verification(
    pool: &PgPool,
    email: &str,
    config: &AuthConfig,
) -> Result<ResendOutcome> {
    bounded("enqueue_resend_verification", async {
        let mut tx = pool.begin().await.context("begin resend transaction")?;

        let query = r"
            SELECT id, email
            FROM principals
            WHERE email = $1
              AND email_verified_at IS NULL
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lookup principal for resend")?;

        let Some(row) = row else {
            tx.commit().await.context("commit resend noop")?;
            return Ok(ResendOutcome::Noop);
        };

        let principal_id: Uuid = row.get("id");
        if resend_cooldown_active(&mut tx, principal_id, config.resend_cooldown_seconds()).await? {
            tx.commit().await.context("commit resend cooldown")?;
            return Ok(ResendOutcome::Cooldown);
        }

        let email: String = row.get("email");
        let _ = insert_verification_records(&mut tx, principal_id, &email, config).await?;
        tx.commit().await.context("commit resend enqueue")?;
        Ok(ResendOutcome::Queued)
    })
    .await
}

async fn resend_cooldown_active(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    principal_id: Uuid,
    cooldown_seconds: i64,
) -> Result<bool> {
    // Cooldown prevents repeated resend requests from spamming the outbox.
    let query = r"
        SELECT 1
        FROM email_verification_tokens
        WHERE principal_id = $1
          AND created_at > NOW() - ($2 * INTERVAL '1 second')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(principal_id)
        .bind(cooldown_seconds)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to check resend cooldown")?;
    Ok(row.is_some())
}

/// List user-kind principals, newest first. Admin accounts are not included.
pub(crate) async fn list_user_principals(pool: &PgPool) -> Result<Vec<PrincipalRecord>> {
    bounded("list_user_principals", async {
        let query = r"
            SELECT id, name, email, password_hash, role, token_version, email_verified_at, created_at
            FROM principals
            WHERE role IN ('student', 'teacher')
            ORDER BY created_at DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(pool)
            .instrument(span)
            .await
            .context("failed to list user principals")?;

        rows.iter().map(principal_from_row).collect()
    })
    .await
}

/// Delete a user-kind principal together with its learning progress and forum
/// posts, in one transaction. Returns `false` when no such user exists.
pub(crate) async fn delete_user_cascade(pool: &PgPool, id: Uuid) -> Result<bool> {
    bounded("delete_user_cascade", async {
        let mut tx = pool.begin().await.context("begin delete transaction")?;

        for query in [
            "DELETE FROM progress WHERE principal_id = $1",
            "DELETE FROM forum_posts WHERE principal_id = $1",
        ] {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to delete user content")?;
        }

        let query = r"
            DELETE FROM principals
            WHERE id = $1
              AND role IN ('student', 'teacher')
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to delete principal")?;

        if row.is_none() {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        tx.commit().await.context("commit delete transaction")?;
        Ok(true)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::{
        PrincipalRecord, RotateOutcome, SignupOutcome, apply_rotation, reset_grant_usable,
    };
    use crate::ledger::{Ledger, TokenMeta};
    use crate::roles::Role;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn ledger_with(token: &str) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.add(token, Duration::days(7), TokenMeta::default(), Utc::now());
        ledger
    }

    #[test]
    fn rotation_swaps_old_for_new() {
        let mut ledger = ledger_with("old");
        let outcome = apply_rotation(
            0,
            0,
            &mut ledger,
            "old",
            "new",
            Duration::days(7),
            TokenMeta::default(),
            Utc::now(),
        );
        assert_eq!(outcome, RotateOutcome::Rotated);
        assert!(!ledger.contains("old"));
        assert!(ledger.contains("new"));
    }

    #[test]
    fn rotation_rejects_version_mismatch() {
        // A logout-all bumped the stored epoch; a token minted before the
        // bump still verifies but must not rotate.
        let mut ledger = ledger_with("old");
        let outcome = apply_rotation(
            1,
            0,
            &mut ledger,
            "old",
            "new",
            Duration::days(7),
            TokenMeta::default(),
            Utc::now(),
        );
        assert_eq!(outcome, RotateOutcome::Rejected);
        assert!(ledger.contains("old"));
        assert!(!ledger.contains("new"));
    }

    #[test]
    fn rotation_rejects_replayed_token() {
        let mut ledger = ledger_with("old");
        let now = Utc::now();
        let first = apply_rotation(
            0,
            0,
            &mut ledger,
            "old",
            "new",
            Duration::days(7),
            TokenMeta::default(),
            now,
        );
        assert_eq!(first, RotateOutcome::Rotated);

        // Presenting the retired token again must fail.
        let replay = apply_rotation(
            0,
            0,
            &mut ledger,
            "old",
            "newer",
            Duration::days(7),
            TokenMeta::default(),
            now + Duration::seconds(1),
        );
        assert_eq!(replay, RotateOutcome::Rejected);
        assert!(ledger.contains("new"));
        assert!(!ledger.contains("newer"));
    }

    #[test]
    fn reset_grant_is_single_use() {
        let now = Utc::now();
        let mut expires_at = Some(now + Duration::hours(1));
        assert!(reset_grant_usable(expires_at, now));

        // Consuming clears the reset columns; the cleared window can never
        // satisfy a second attempt.
        expires_at = None;
        assert!(!reset_grant_usable(expires_at, now));
    }

    #[test]
    fn reset_grant_rejects_expired_window() {
        let now = Utc::now();
        assert!(!reset_grant_usable(Some(now - Duration::seconds(1)), now));
    }

    #[test]
    fn signup_outcome_carries_record() {
        let record = PrincipalRecord {
            id: Uuid::nil(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$10$hash".to_string(),
            role: Role::Student,
            token_version: 0,
            email_verified_at: None,
            created_at: Utc::now(),
        };
        match SignupOutcome::Created(record) {
            SignupOutcome::Created(record) => assert_eq!(record.role, Role::Student),
            SignupOutcome::Conflict => panic!("expected Created"),
        }
    }
}

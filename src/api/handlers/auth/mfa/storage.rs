//! Database helpers for two-factor state and recovery codes.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Two-factor state for one user.
#[derive(Clone, Debug)]
pub(in crate::api::handlers::auth) struct TwoFactorRecord {
    pub(in crate::api::handlers::auth) totp_secret: String,
    pub(in crate::api::handlers::auth) enabled: bool,
}

/// Recovery code hash with its row id, for targeted consumption.
pub(super) struct RecoveryCodeRow {
    pub(super) id: Uuid,
    pub(super) code_hash: String,
}

pub(in crate::api::handlers::auth) async fn load_two_factor(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<TwoFactorRecord>> {
    let query = "SELECT totp_secret, enabled FROM user_two_factor WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load two-factor state")?;
    Ok(row.map(|row| TwoFactorRecord {
        totp_secret: row.get("totp_secret"),
        enabled: row.get("enabled"),
    }))
}

pub(in crate::api::handlers::auth) async fn two_factor_enabled(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<bool> {
    Ok(load_two_factor(pool, user_id)
        .await?
        .is_some_and(|record| record.enabled))
}

/// Store a new pending secret. Re-running generate replaces the secret and
/// switches enforcement off until the new secret is confirmed.
pub(super) async fn upsert_pending_secret(
    pool: &PgPool,
    user_id: Uuid,
    totp_secret: &str,
) -> Result<()> {
    let query = r"
        INSERT INTO user_two_factor (user_id, totp_secret, enabled, updated_at)
        VALUES ($1, $2, FALSE, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET totp_secret = $2,
            enabled = FALSE,
            updated_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(totp_secret)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store pending two-factor secret")?;
    Ok(())
}

pub(super) async fn enable_two_factor(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE user_two_factor
        SET enabled = TRUE,
            last_verified_at = NOW(),
            updated_at = NOW()
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to enable two-factor")?;
    Ok(())
}

pub(super) async fn touch_last_verified(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE user_two_factor
        SET last_verified_at = NOW(),
            updated_at = NOW()
        WHERE user_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update two-factor last verified")?;
    Ok(())
}

/// Disable purges everything: the secret row and any remaining recovery
/// codes. Re-enabling starts from a fresh setup.
pub(super) async fn purge_two_factor(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.context("begin two-factor purge")?;

    let query = "DELETE FROM user_recovery_codes WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete recovery codes")?;

    let query = "DELETE FROM user_two_factor WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete two-factor state")?;

    tx.commit().await.context("commit two-factor purge")?;
    Ok(())
}

/// Replace the whole recovery batch: old codes are void the moment a new
/// batch is issued.
pub(super) async fn replace_recovery_codes(
    pool: &PgPool,
    user_id: Uuid,
    code_hashes: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin recovery code replace")?;

    let query = "DELETE FROM user_recovery_codes WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to clear old recovery codes")?;

    let query = r"
        INSERT INTO user_recovery_codes (user_id, code_hash)
        VALUES ($1, $2)
    ";
    for hash in code_hashes {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(hash)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert recovery code")?;
    }

    tx.commit().await.context("commit recovery code replace")?;
    Ok(())
}

/// List unused recovery code hashes for verification.
pub(super) async fn list_recovery_codes(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<RecoveryCodeRow>> {
    let query = r"
        SELECT id, code_hash
        FROM user_recovery_codes
        WHERE user_id = $1
          AND used_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list recovery codes")?;
    Ok(rows
        .into_iter()
        .map(|row| RecoveryCodeRow {
            id: row.get("id"),
            code_hash: row.get("code_hash"),
        })
        .collect())
}

/// Mark one recovery code used. The conditional UPDATE means a racing pair of
/// redemptions gets exactly one success.
pub(super) async fn consume_recovery_code(pool: &PgPool, code_id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE user_recovery_codes
        SET used_at = NOW()
        WHERE id = $1
          AND used_at IS NULL
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(code_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume recovery code")?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::TwoFactorRecord;

    #[test]
    fn two_factor_record_holds_values() {
        let record = TwoFactorRecord {
            totp_secret: "JBSWY3DPEHPK3PXP".to_string(),
            enabled: false,
        };
        assert!(!record.enabled);
        assert_eq!(record.totp_secret.len(), 16);
    }
}

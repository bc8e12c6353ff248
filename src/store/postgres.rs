//! Postgres-backed store.
//!
//! The conditional `UPDATE ... WHERE used = FALSE AND expires_at > $now` that
//! consumes a code runs in the same transaction as the account mutation, so a
//! consumed code always has its effect applied and concurrent consumers of one
//! code see exactly one winner.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    Account, CodePurpose, ConsumeEffect, ConsumeOutcome, CreateAccountOutcome, NewAccount, Store,
    VerificationCode,
};

const SCHEMA_SQL: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/db/sql/01_staffgate.sql"
));

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection for schema setup")?;

        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl Store for PgStore {
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<CreateAccountOutcome> {
        let query = r"
            INSERT INTO accounts
                (id, name, email, password_hash, role, verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
            RETURNING *
        ";
        let result = sqlx::query_as::<_, Account>(query)
            .bind(Uuid::new_v4())
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(account) => Ok(CreateAccountOutcome::Created(account)),
            Err(err) if is_unique_violation(&err) => Ok(CreateAccountOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = "SELECT * FROM accounts WHERE email = $1";
        sqlx::query_as::<_, Account>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup account by email")
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = "SELECT * FROM accounts WHERE id = $1";
        sqlx::query_as::<_, Account>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup account by id")
    }

    async fn insert_code(&self, code: VerificationCode) -> Result<()> {
        let query = r"
            INSERT INTO verification_codes
                (id, email, code, purpose, used, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        sqlx::query(query)
            .bind(code.id)
            .bind(&code.email)
            .bind(&code.code)
            .bind(code.purpose.as_str())
            .bind(code.used)
            .bind(code.expires_at)
            .bind(code.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert verification code")?;
        Ok(())
    }

    async fn latest_unused_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>> {
        let query = r"
            SELECT *
            FROM verification_codes
            WHERE email = $1
              AND purpose = $2
              AND used = FALSE
            ORDER BY created_at DESC
            LIMIT 1
        ";
        sqlx::query_as::<_, VerificationCode>(query)
            .bind(email)
            .bind(purpose.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup latest verification code")
    }

    async fn discard_code(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE verification_codes SET used = TRUE WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to discard verification code")?;
        Ok(())
    }

    async fn consume_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        effect: ConsumeEffect,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin consume transaction")?;

        // Row locks make a concurrent consumer re-check `used` after we commit.
        let query = r"
            UPDATE verification_codes
            SET used = TRUE
            WHERE email = $1
              AND code = $2
              AND purpose = $3
              AND used = FALSE
              AND expires_at > $4
            RETURNING id
        ";
        let consumed = sqlx::query(query)
            .bind(email)
            .bind(code)
            .bind(purpose.as_str())
            .bind(now)
            .fetch_all(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to consume verification code")?;

        if consumed.is_empty() {
            let query = r"
                SELECT EXISTS (
                    SELECT 1
                    FROM verification_codes
                    WHERE email = $1
                      AND code = $2
                      AND purpose = $3
                      AND used = FALSE
                ) AS pending
            ";
            let row = sqlx::query(query)
                .bind(email)
                .bind(code)
                .bind(purpose.as_str())
                .fetch_one(&mut *tx)
                .instrument(db_span("SELECT", query))
                .await
                .context("failed to classify verification code")?;
            tx.rollback().await.context("rollback consume")?;

            let pending: bool = row.get("pending");
            return Ok(if pending {
                ConsumeOutcome::Expired
            } else {
                ConsumeOutcome::Invalid
            });
        }

        let account = match effect {
            ConsumeEffect::MarkVerified => {
                let query = r"
                    UPDATE accounts
                    SET verified = TRUE,
                        updated_at = $2
                    WHERE email = $1
                    RETURNING *
                ";
                sqlx::query_as::<_, Account>(query)
                    .bind(email)
                    .bind(now)
                    .fetch_optional(&mut *tx)
                    .instrument(db_span("UPDATE", query))
                    .await
                    .context("failed to mark account verified")?
            }
            ConsumeEffect::SetPasswordHash(hash) => {
                let query = r"
                    UPDATE accounts
                    SET password_hash = $2,
                        updated_at = $3
                    WHERE email = $1
                    RETURNING *
                ";
                sqlx::query_as::<_, Account>(query)
                    .bind(email)
                    .bind(hash)
                    .bind(now)
                    .fetch_optional(&mut *tx)
                    .instrument(db_span("UPDATE", query))
                    .await
                    .context("failed to update password hash")?
            }
        };

        let Some(account) = account else {
            // Leave the code unused when there is nobody to apply it to.
            tx.rollback().await.context("rollback consume")?;
            return Ok(ConsumeOutcome::AccountMissing);
        };

        tx.commit().await.context("commit consume transaction")?;

        Ok(ConsumeOutcome::Consumed(account))
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM verification_codes WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to purge expired verification codes")?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")
    }
}

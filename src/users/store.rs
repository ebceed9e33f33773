use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileUpdate, User, UserRow};
use crate::credits::repo_types::{
    CreditChange, CreditOutcome, CreditTransaction, CreditTransactionRow,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for users and their credit ledger.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// `email` must already be normalized (trimmed, lowercase).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Overwrites the given fields and marks the profile completed.
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
    async fn credits(&self, id: Uuid) -> Result<Option<i64>, StoreError>;
    /// Applies the change atomically and appends it to the ledger. Never lets
    /// the balance go negative.
    async fn apply_credit_change(
        &self,
        id: Uuid,
        change: CreditChange,
    ) -> Result<CreditOutcome, StoreError>;
    /// Newest first.
    async fn credit_transactions(
        &self,
        id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_completed, job_role, \
     experience, target_company, level, credits, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, kind, description, balance_after, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::new(db))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn map_unique(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, profile_completed)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.name)
            .bind(&new.email)
            .bind(new.password_hash.as_deref())
            .bind(new.profile_completed)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique)?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET job_role = COALESCE($2, job_role),
                   experience = COALESCE($3, experience),
                   target_company = COALESCE($4, target_company),
                   level = COALESCE($5, level),
                   profile_completed = TRUE,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.job_role.as_deref())
            .bind(update.experience)
            .bind(update.target_company.as_deref())
            .bind(update.level.map(|l| l.as_str()))
            .fetch_optional(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn credits(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let credits = sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(credits)
    }

    async fn apply_credit_change(
        &self,
        id: Uuid,
        change: CreditChange,
    ) -> Result<CreditOutcome, StoreError> {
        let mut tx = self.db.begin().await?;

        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
               SET credits = credits + $2,
                   updated_at = now()
             WHERE id = $1 AND credits + $2 >= 0
            RETURNING credits
            "#,
        )
        .bind(id)
        .bind(change.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            let current = sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(match current {
                None => CreditOutcome::UserNotFound,
                Some(balance) => CreditOutcome::Insufficient { balance },
            });
        };

        let sql = format!(
            r#"
            INSERT INTO credit_transactions (user_id, amount, kind, description, balance_after)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CreditTransactionRow>(&sql)
            .bind(id)
            .bind(change.amount)
            .bind(change.kind.as_str())
            .bind(&change.description)
            .bind(balance)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CreditOutcome::Applied {
            balance,
            transaction: row.try_into()?,
        })
    }

    async fn credit_transactions(
        &self,
        id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
              FROM credit_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, CreditTransactionRow>(&sql)
            .bind(id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(CreditTransaction::try_from)
            .collect()
    }
}

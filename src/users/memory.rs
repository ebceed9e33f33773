use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileUpdate, User, DEFAULT_CREDITS};
use super::store::{StoreError, UserStore};
use crate::credits::repo_types::{CreditChange, CreditOutcome, CreditTransaction};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>, // email -> user id
    ledger: Vec<CreditTransaction>,
}

/// Process-local [`UserStore`]. A single lock guards users and ledger so credit
/// changes stay atomic, mirroring the Postgres transaction.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: Mutex<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.emails.contains_key(&new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            profile_completed: new.profile_completed,
            job_role: None,
            experience: None,
            target_company: None,
            level: None,
            credits: DEFAULT_CREDITS,
            created_at: now,
            updated_at: now,
        };
        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(job_role) = update.job_role {
            user.job_role = Some(job_role);
        }
        if let Some(experience) = update.experience {
            user.experience = Some(experience);
        }
        if let Some(target_company) = update.target_company {
            user.target_company = Some(target_company);
        }
        if let Some(level) = update.level {
            user.level = Some(level);
        }
        user.profile_completed = true;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn credits(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).map(|u| u.credits))
    }

    async fn apply_credit_change(
        &self,
        id: Uuid,
        change: CreditChange,
    ) -> Result<CreditOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(CreditOutcome::UserNotFound);
        };
        let balance = user.credits + change.amount;
        if balance < 0 {
            return Ok(CreditOutcome::Insufficient {
                balance: user.credits,
            });
        }
        let now = OffsetDateTime::now_utc();
        user.credits = balance;
        user.updated_at = now;

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id: id,
            amount: change.amount,
            kind: change.kind,
            description: change.description,
            balance_after: balance,
            created_at: now,
        };
        inner.ledger.push(transaction.clone());
        Ok(CreditOutcome::Applied {
            balance,
            transaction,
        })
    }

    async fn credit_transactions(
        &self,
        id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .ledger
            .iter()
            .rev()
            .filter(|t| t.user_id == id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::store::StoreError;

/// Wheel sectors a spin can land on.
pub const SPIN_REWARDS: [i64; 6] = [50, 100, 150, 200, 250, 300];

/// Price of one mock interview session.
pub const DEFAULT_DEDUCTION: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    SpinReward,
    Deduction,
}

impl CreditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditKind::SpinReward => "spin_reward",
            CreditKind::Deduction => "deduction",
        }
    }
}

impl FromStr for CreditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spin_reward" => Ok(CreditKind::SpinReward),
            "deduction" => Ok(CreditKind::Deduction),
            other => Err(format!("unknown credit kind: {other}")),
        }
    }
}

/// A signed balance change. Positive credits, negative debits.
#[derive(Debug, Clone)]
pub struct CreditChange {
    pub amount: i64,
    pub kind: CreditKind,
    pub description: String,
}

impl CreditChange {
    pub fn spin_reward(reward: i64) -> Self {
        Self {
            amount: reward,
            kind: CreditKind::SpinReward,
            description: "Spin wheel reward".into(),
        }
    }

    pub fn deduction(amount: i64, description: impl Into<String>) -> Self {
        Self {
            amount: -amount,
            kind: CreditKind::Deduction,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: CreditKind,
    pub description: String,
    pub balance_after: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct CreditTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: String,
    pub description: String,
    pub balance_after: i64,
    pub created_at: OffsetDateTime,
}

impl TryFrom<CreditTransactionRow> for CreditTransaction {
    type Error = StoreError;

    fn try_from(r: CreditTransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            kind: r.kind.parse().map_err(StoreError::Corrupt)?,
            description: r.description,
            balance_after: r.balance_after,
            created_at: r.created_at,
        })
    }
}

/// Result of applying a [`CreditChange`].
#[derive(Debug, Clone)]
pub enum CreditOutcome {
    Applied {
        balance: i64,
        transaction: CreditTransaction,
    },
    UserNotFound,
    /// The change would have driven the balance below zero; nothing was written.
    Insufficient { balance: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduction_is_negative() {
        let change = CreditChange::deduction(30, "Mock interview");
        assert_eq!(change.amount, -30);
        assert_eq!(change.kind, CreditKind::Deduction);
    }

    #[test]
    fn kind_roundtrips_through_column_text() {
        for kind in [CreditKind::SpinReward, CreditKind::Deduction] {
            assert_eq!(kind.as_str().parse::<CreditKind>(), Ok(kind));
        }
        assert!("refund".parse::<CreditKind>().is_err());
    }
}

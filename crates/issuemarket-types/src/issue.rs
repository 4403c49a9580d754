//! Issue records. Issues move `Open → Resolved` and never back.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CorrelationId, IssueId, MarketError, Result};

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueState {
    Open,
    Resolved,
}

impl IssueState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Resolved))
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}

/// The record written when an issue is filed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub uuid: CorrelationId,
    pub issue_id: IssueId,
    pub issue_description: String,
    pub estimated_cost: Decimal,
    pub metadata: String,
    pub state: IssueState,
}

impl Issue {
    /// # Errors
    /// Returns `InvalidAmount` if the estimated cost is negative.
    pub fn validate(&self) -> Result<()> {
        if self.estimated_cost.is_sign_negative() {
            return Err(MarketError::InvalidAmount {
                field: "estimated_cost",
                amount: self.estimated_cost,
            });
        }
        Ok(())
    }
}

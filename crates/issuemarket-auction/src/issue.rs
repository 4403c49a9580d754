//! Issue tracker. Issues are filed `Open` and resolved once.

use issuemarket_ledger::{IssueView, LedgerWriter};
use issuemarket_types::{
    CorrelationId, EventBody, Issue, IssueId, IssueState, LedgerEvent, MarketError, Result,
};
use rust_decimal::Decimal;

use crate::auction::rejected;

/// Records issue events on the public ledger.
#[derive(Debug, Clone)]
pub struct IssueTracker {
    ledger: LedgerWriter,
}

impl IssueTracker {
    #[must_use]
    pub fn new(ledger: LedgerWriter) -> Self {
        Self { ledger }
    }

    /// # Errors
    /// `InvalidAmount` for a negative estimated cost.
    pub fn create_issue(
        &self,
        issue_id: IssueId,
        description: &str,
        estimated_cost: Decimal,
        metadata: &str,
    ) -> Result<LedgerEvent> {
        let issue = Issue {
            uuid: CorrelationId::new(),
            issue_id,
            issue_description: description.to_string(),
            estimated_cost,
            metadata: metadata.to_string(),
            state: IssueState::Open,
        };
        issue.validate().map_err(rejected)?;

        let mut guard = self.ledger.lock()?;
        let uuid = issue.uuid;
        let issue_id = issue.issue_id.clone();
        let event = guard.append(uuid, EventBody::IssueCreated { data: issue })?;
        tracing::info!(%issue_id, %uuid, "issue created");
        Ok(event)
    }

    /// # Errors
    /// `InvalidTransition` if the issue is missing or already resolved.
    pub fn resolve_issue(&self, issue_id: &IssueId, resolution_details: &str) -> Result<LedgerEvent> {
        let mut guard = self.ledger.lock()?;
        let state = guard.state()?;
        let view = match state.issue(issue_id) {
            Some(view) if view.state.can_transition_to(IssueState::Resolved) => view,
            other => {
                return Err(rejected(MarketError::invalid_transition(
                    "issue",
                    issue_id,
                    other.map(|v| v.state),
                    IssueState::Resolved,
                )));
            }
        };

        let event = guard.append(
            view.issue.uuid,
            EventBody::IssueResolved {
                issue_id: issue_id.clone(),
                resolution_details: resolution_details.to_string(),
            },
        )?;
        tracing::info!(%issue_id, "issue resolved");
        Ok(event)
    }

    pub fn issue(&self, issue_id: &IssueId) -> Result<Option<IssueView>> {
        Ok(self.ledger.replay()?.issues.remove(issue_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use issuemarket_ledger::FixedClock;

    use super::*;

    fn tracker(dir: &std::path::Path) -> IssueTracker {
        IssueTracker::new(LedgerWriter::new(
            dir.join("ghissuemarket.log"),
            Arc::new(FixedClock::new(100)),
        ))
    }

    #[test]
    fn create_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let id = IssueId::new("ISS1");

        let created = tracker
            .create_issue(id.clone(), "crash on start", Decimal::new(50, 0), "")
            .unwrap();
        let resolved = tracker.resolve_issue(&id, "patched").unwrap();
        assert_eq!(created.uuid, resolved.uuid);

        let view = tracker.issue(&id).unwrap().unwrap();
        assert_eq!(view.state, IssueState::Resolved);
        assert_eq!(view.resolution.as_deref(), Some("patched"));
    }

    #[test]
    fn resolve_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let id = IssueId::new("ISS1");
        tracker.create_issue(id.clone(), "d", Decimal::ZERO, "").unwrap();
        tracker.resolve_issue(&id, "once").unwrap();

        let err = tracker.resolve_issue(&id, "twice").unwrap_err();
        assert!(
            matches!(&err, MarketError::InvalidTransition { entity: "issue", from, .. } if from == "Resolved"),
            "got {err:?}"
        );
    }

    #[test]
    fn resolve_missing_issue_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = tracker(dir.path())
            .resolve_issue(&IssueId::new("nope"), "x")
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[test]
    fn negative_cost_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());
        let err = tracker
            .create_issue(IssueId::new("ISS1"), "d", Decimal::new(-1, 2), "")
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { .. }));
        assert!(tracker.issue(&IssueId::new("ISS1")).unwrap().is_none());
    }
}

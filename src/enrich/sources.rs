//! Refresh-cycle input gathering.
//!
//! Fetches the remote collections concurrently. A failing client degrades
//! to an empty collection so the dashboard still renders whatever is
//! available.

use std::sync::Arc;

use super::EnrichmentInputs;
use crate::integrations::{
    CodeHost, IntegrationResult, IssueFilter, IssueTracker, SpecStore, Worktree,
};
use crate::session::WorkerSession;

/// Configured integration clients. Any of them may be absent.
#[derive(Clone, Default)]
pub struct DashboardSources {
    pub tracker: Option<Arc<dyn IssueTracker>>,
    pub code_host: Option<Arc<dyn CodeHost>>,
    pub spec_store: Option<Arc<dyn SpecStore>>,
}

fn or_empty<T>(source: &'static str, result: IntegrationResult<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(source, error = %e, "Integration fetch failed, showing no data");
        Vec::new()
    })
}

/// Fetch everything one enrichment pass needs.
///
/// Sessions and worktrees are local observations and are passed in.
pub async fn gather_inputs(
    sources: &DashboardSources,
    filter: &IssueFilter,
    sessions: Vec<WorkerSession>,
    worktrees: Vec<Worktree>,
) -> EnrichmentInputs {
    let issues = async {
        match &sources.tracker {
            Some(tracker) => or_empty("issue tracker", tracker.get_issues(filter).await),
            None => Vec::new(),
        }
    };
    let prs = async {
        match &sources.code_host {
            Some(host) => or_empty("code host", host.list_prs().await)
                .into_iter()
                .map(|pr| pr.with_extracted_ticket())
                .collect(),
            None => Vec::new(),
        }
    };
    let specs = async {
        match &sources.spec_store {
            Some(store) => or_empty("spec store", store.list_specs().await),
            None => Vec::new(),
        }
    };

    let (issues, prs, specs) = tokio::join!(issues, prs, specs);
    EnrichmentInputs { issues, sessions, prs, specs, worktrees }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::{IssueIdentifier, PrNumber, SpecId};
    use crate::integrations::{
        CreatePrOptions, Issue, IntegrationError, IssuePatch, IssueState, IssueStateType,
        PrState, PullRequest, Spec,
    };
    use crate::session::SpecStatus;
    use crate::test_support::{issue, pr};

    struct Tracker;

    #[async_trait]
    impl IssueTracker for Tracker {
        async fn get_issues(&self, _filter: &IssueFilter) -> IntegrationResult<Vec<Issue>> {
            Ok(vec![issue("ENG-1", IssueStateType::Started)])
        }

        async fn get_issue(&self, id: &IssueIdentifier) -> IntegrationResult<Issue> {
            Err(IntegrationError::NotFound(id.to_string()))
        }

        async fn get_states(&self, _team_id: &str) -> IntegrationResult<Vec<IssueState>> {
            Ok(Vec::new())
        }

        async fn update_issue(
            &self,
            id: &IssueIdentifier,
            _patch: IssuePatch,
        ) -> IntegrationResult<Issue> {
            Err(IntegrationError::NotFound(id.to_string()))
        }

        async fn add_comment(&self, _id: &IssueIdentifier, _body: &str) -> IntegrationResult<()> {
            Ok(())
        }
    }

    struct Host;

    #[async_trait]
    impl CodeHost for Host {
        async fn list_prs(&self) -> IntegrationResult<Vec<PullRequest>> {
            Ok(vec![pr(4, "feature/eng-1-fix", PrState::Open)])
        }

        async fn get_pr(&self, number: PrNumber) -> IntegrationResult<PullRequest> {
            Err(IntegrationError::NotFound(number.to_string()))
        }

        async fn create_pr(&self, _options: CreatePrOptions) -> IntegrationResult<PullRequest> {
            Err(IntegrationError::Auth("read only".into()))
        }

        async fn comment(&self, _number: PrNumber, _body: &str) -> IntegrationResult<()> {
            Ok(())
        }

        async fn approve_pr(&self, _number: PrNumber) -> IntegrationResult<()> {
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SpecStore for BrokenStore {
        async fn list_specs(&self) -> IntegrationResult<Vec<Spec>> {
            Err(IntegrationError::Network("connection reset".into()))
        }

        async fn get_spec(&self, id: &SpecId) -> IntegrationResult<Spec> {
            Err(IntegrationError::NotFound(id.to_string()))
        }

        async fn set_status(&self, id: &SpecId, _status: SpecStatus) -> IntegrationResult<Spec> {
            Err(IntegrationError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_source_degrades_to_empty() {
        let sources = DashboardSources {
            tracker: Some(Arc::new(Tracker)),
            code_host: Some(Arc::new(Host)),
            spec_store: Some(Arc::new(BrokenStore)),
        };
        let inputs = gather_inputs(&sources, &IssueFilter::default(), Vec::new(), Vec::new()).await;

        assert_eq!(inputs.issues.len(), 1);
        assert_eq!(inputs.prs.len(), 1);
        assert_eq!(inputs.prs[0].ticket_id.as_ref().unwrap().as_str(), "ENG-1");
        assert!(inputs.specs.is_empty());

        let result = inputs.enrich();
        assert!(result.issues[0].pr.is_some());
    }

    #[tokio::test]
    async fn test_no_sources_configured() {
        let inputs =
            gather_inputs(&DashboardSources::default(), &IssueFilter::default(), vec![], vec![])
                .await;
        assert!(inputs.issues.is_empty() && inputs.prs.is_empty() && inputs.specs.is_empty());
    }
}

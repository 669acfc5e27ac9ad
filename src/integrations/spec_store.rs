//! Spec store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{IntegrationError, IntegrationResult};
use crate::core::{IssueIdentifier, SpecId};
use crate::session::{validate_spec_transition, SpecStatus, TransitionError};

/// A spec document snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    /// Spec ID
    pub id: SpecId,
    /// Issue this spec was written for
    #[serde(default)]
    pub issue_id: Option<IssueIdentifier>,
    /// Review status
    pub status: SpecStatus,
    /// Spec title
    pub title: String,
    /// Spec body (markdown)
    #[serde(default)]
    pub content: String,
    /// URL to the spec
    pub url: String,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Spec store client contract.
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// List all specs.
    async fn list_specs(&self) -> IntegrationResult<Vec<Spec>>;

    /// Fetch one spec.
    async fn get_spec(&self, id: &SpecId) -> IntegrationResult<Spec>;

    /// Persist a new review status and return the updated snapshot.
    async fn set_status(&self, id: &SpecId, status: SpecStatus) -> IntegrationResult<Spec>;
}

/// Failure of a checked status change.
#[derive(Debug, thiserror::Error)]
pub enum SpecUpdateError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Move a spec to `to`, refusing moves the spec machine does not allow
/// before anything is sent to the store.
pub async fn transition_spec(
    store: &dyn SpecStore,
    spec: &Spec,
    to: SpecStatus,
) -> Result<Spec, SpecUpdateError> {
    validate_spec_transition(spec.status, to)?;
    tracing::debug!(spec = %spec.id, from = %spec.status, to = %to, "Updating spec status");
    Ok(store.set_status(&spec.id, to).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MemoryStore {
        calls: Mutex<Vec<SpecStatus>>,
    }

    #[async_trait]
    impl SpecStore for MemoryStore {
        async fn list_specs(&self) -> IntegrationResult<Vec<Spec>> {
            Ok(Vec::new())
        }

        async fn get_spec(&self, id: &SpecId) -> IntegrationResult<Spec> {
            Err(IntegrationError::NotFound(id.to_string()))
        }

        async fn set_status(&self, id: &SpecId, status: SpecStatus) -> IntegrationResult<Spec> {
            self.calls.lock().push(status);
            let mut spec = sample(SpecStatus::Draft);
            spec.id = id.clone();
            spec.status = status;
            Ok(spec)
        }
    }

    fn sample(status: SpecStatus) -> Spec {
        Spec {
            id: SpecId::new("spec-1").unwrap(),
            issue_id: Some(IssueIdentifier::parse("AUTH-1").unwrap()),
            status,
            title: "Auth flow".to_string(),
            content: String::new(),
            url: "https://specs.example/spec-1".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_transition_spec_forwards_valid_move() {
        let store = MemoryStore { calls: Mutex::new(Vec::new()) };
        let updated = transition_spec(&store, &sample(SpecStatus::Draft), SpecStatus::Pending)
            .await
            .unwrap();
        assert_eq!(updated.status, SpecStatus::Pending);
        assert_eq!(*store.calls.lock(), vec![SpecStatus::Pending]);
    }

    #[tokio::test]
    async fn test_transition_spec_rejects_before_calling_store() {
        let store = MemoryStore { calls: Mutex::new(Vec::new()) };
        let err = transition_spec(&store, &sample(SpecStatus::Draft), SpecStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, SpecUpdateError::Transition(_)));
        assert!(store.calls.lock().is_empty());
    }

    #[test]
    fn test_spec_deserialization() {
        let json = r#"{
            "id": "s-9",
            "issue_id": "eng-3",
            "status": "pending",
            "title": "Plan",
            "url": "https://specs.example/s-9",
            "updated_at": "2024-05-01T10:00:00Z"
        }"#;
        let spec: Spec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.issue_id.unwrap().as_str(), "ENG-3");
        assert_eq!(spec.status, SpecStatus::Pending);
        assert!(spec.content.is_empty());
    }
}

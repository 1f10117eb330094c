//! Caller identity resolution.
//!
//! A connection may name its caller by lead id. Whatever the outcome of the
//! lookup, a session always gets a lead: unknown ids and failing lookups fall
//! back to the demo identity instead of rejecting the call. Each demo caller
//! gets a freshly generated history key, so anonymous calls never share a
//! conversation.

use crate::error::AgentError;
use async_trait::async_trait;
use domu_types::LeadProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of the per-connection history keys given to demo callers.
pub const DEMO_KEY_PREFIX: &str = "demo";

/// A lead known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: String,
    #[serde(flatten)]
    pub profile: LeadProfile,
}

/// Lead lookup collaborator.
#[async_trait]
pub trait LeadDirectory: Send + Sync {
    async fn lookup(&self, lead_id: &str) -> Result<Option<LeadRecord>, AgentError>;
}

/// In-memory directory backed by a fixed list of records (from configuration).
#[derive(Debug, Clone, Default)]
pub struct StaticLeadDirectory {
    records: Vec<LeadRecord>,
}

impl StaticLeadDirectory {
    pub fn new(records: Vec<LeadRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl LeadDirectory for StaticLeadDirectory {
    async fn lookup(&self, lead_id: &str) -> Result<Option<LeadRecord>, AgentError> {
        Ok(self.records.iter().find(|r| r.id == lead_id).cloned())
    }
}

/// The identity a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCaller {
    /// Partition key for conversation history.
    pub history_key: String,
    pub lead: LeadProfile,
    pub is_demo: bool,
}

impl ResolvedCaller {
    /// Demo identity under a new, unshared history key (`demo:<uuid>`).
    pub fn demo() -> Self {
        Self {
            history_key: format!("{}:{}", DEMO_KEY_PREFIX, Uuid::new_v4()),
            lead: LeadProfile::demo(),
            is_demo: true,
        }
    }
}

/// Resolves an optional lead id, falling back to the demo identity.
pub async fn resolve_caller(directory: &dyn LeadDirectory, lead_id: Option<&str>) -> ResolvedCaller {
    let Some(lead_id) = lead_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return ResolvedCaller::demo();
    };

    match directory.lookup(lead_id).await {
        Ok(Some(record)) => ResolvedCaller {
            history_key: format!("lead:{}", record.id),
            lead: record.profile,
            is_demo: false,
        },
        Ok(None) => {
            tracing::warn!(lead_id, "lead not found; using demo identity");
            ResolvedCaller::demo()
        }
        Err(e) => {
            tracing::warn!(lead_id, "lead lookup failed, using demo identity: {}", e);
            ResolvedCaller::demo()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticLeadDirectory {
        StaticLeadDirectory::new(vec![LeadRecord {
            id: "lead-42".to_string(),
            profile: LeadProfile {
                name: "Ana Gómez".to_string(),
                vehicle_name: "Domu SUV Z".to_string(),
                vehicle_model: "SUV 2023".to_string(),
                price: 120_000_000,
            },
        }])
    }

    struct Broken;

    #[async_trait]
    impl LeadDirectory for Broken {
        async fn lookup(&self, _lead_id: &str) -> Result<Option<LeadRecord>, AgentError> {
            Err(AgentError::Lead("directory offline".to_string()))
        }
    }

    #[tokio::test]
    async fn known_lead_gets_its_own_partition() {
        let caller = resolve_caller(&directory(), Some(" lead-42 ")).await;

        assert_eq!(caller.history_key, "lead:lead-42");
        assert_eq!(caller.lead.name, "Ana Gómez");
        assert!(!caller.is_demo);
    }

    fn assert_demo(caller: &ResolvedCaller) {
        assert!(caller.is_demo);
        assert_eq!(caller.lead, LeadProfile::demo());
        assert!(
            caller.history_key.starts_with("demo:"),
            "got {}",
            caller.history_key
        );
    }

    #[tokio::test]
    async fn unknown_missing_or_failing_lookups_fall_back_to_demo() {
        let dir = directory();

        assert_demo(&resolve_caller(&dir, None).await);
        assert_demo(&resolve_caller(&dir, Some("")).await);
        assert_demo(&resolve_caller(&dir, Some("nope")).await);
        assert_demo(&resolve_caller(&Broken, Some("lead-42")).await);
    }

    #[tokio::test]
    async fn demo_callers_never_share_a_history_key() {
        let dir = directory();
        let a = resolve_caller(&dir, None).await;
        let b = resolve_caller(&dir, None).await;
        let c = resolve_caller(&dir, Some("nope")).await;

        assert_ne!(a.history_key, b.history_key);
        assert_ne!(a.history_key, c.history_key);
        assert_ne!(b.history_key, c.history_key);
    }

    #[test]
    fn lead_record_deserializes_flattened_profile() {
        let record: LeadRecord = serde_json::from_str(
            r#"{"id": "7", "name": "Luis", "vehicle_name": "Domu Hatch", "vehicle_model": "Hatch 2021", "price": 50000000}"#,
        )
        .unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.profile.vehicle_name, "Domu Hatch");
    }
}

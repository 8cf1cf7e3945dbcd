//! Append-only automation event stream.
//!
//! Every state-changing operation records an event here. Writes are
//! best-effort and never fail the caller: if storage rejects the append, the
//! entry lands on stderr as a structured tracing line and execution continues.

use std::sync::Arc;
use uuid::Uuid;

use crate::domains::automation::models::{
    ActionType, AutomationLog, LogFilter, NewLogEntry, TriggerSource,
};
use crate::storage::{Storage, StorageResult};

#[derive(Clone)]
pub struct AutomationLogSink {
    storage: Arc<dyn Storage>,
}

impl AutomationLogSink {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Append an entry. Storage failures are swallowed after the fallback
    /// line; callers never see them.
    pub async fn record(&self, entry: NewLogEntry) {
        let fallback = entry.clone();
        if let Err(err) = self.storage.append_log(entry).await {
            tracing::error!(
                action_type = fallback.action_type.as_str(),
                trigger_source = fallback.trigger_source.as_str(),
                job_id = ?fallback.job_id,
                details = %fallback.details,
                error = %err,
                "automation log append failed, entry preserved on stderr only"
            );
        }
    }

    pub async fn record_auto(
        &self,
        action: ActionType,
        job_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        self.record(NewLogEntry {
            job_id,
            action_type: action,
            trigger_source: TriggerSource::Auto,
            actor: None,
            details,
        })
        .await;
    }

    pub async fn record_scheduled(
        &self,
        action: ActionType,
        job_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        self.record(NewLogEntry {
            job_id,
            action_type: action,
            trigger_source: TriggerSource::Scheduled,
            actor: None,
            details,
        })
        .await;
    }

    pub async fn record_manual(
        &self,
        action: ActionType,
        job_id: Option<Uuid>,
        actor: Uuid,
        details: serde_json::Value,
    ) {
        self.record(NewLogEntry {
            job_id,
            action_type: action,
            trigger_source: TriggerSource::Manual,
            actor: Some(actor),
            details,
        })
        .await;
    }

    // ------------------------------------------------------------------
    // Query surface (used by the dashboard routes and the reminder dedupe)
    // ------------------------------------------------------------------

    pub async fn query(&self, filter: &LogFilter) -> StorageResult<Vec<AutomationLog>> {
        self.storage.query_logs(filter).await
    }

    pub async fn counts_by_action(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        self.storage.count_logs_by_action(job_id).await
    }

    pub async fn counts_by_trigger(
        &self,
        job_id: Option<Uuid>,
    ) -> StorageResult<Vec<(String, i64)>> {
        self.storage.count_logs_by_trigger(job_id).await
    }

    pub async fn has_interview_event(
        &self,
        interview_id: Uuid,
        action: ActionType,
    ) -> StorageResult<bool> {
        self.storage.has_interview_log(interview_id, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn append_failure_does_not_surface() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_fail_log_appends(true);
        let sink = AutomationLogSink::new(storage.clone());

        // Must not panic or error; the entry is simply not persisted
        sink.record_auto(ActionType::InvitationSent, None, json!({}))
            .await;

        storage.set_fail_log_appends(false);
        assert!(storage.all_logs().await.is_empty());
    }

    #[tokio::test]
    async fn entries_are_persisted_and_queryable() {
        let storage = Arc::new(InMemoryStorage::new());
        let sink = AutomationLogSink::new(storage.clone());
        let job_id = Uuid::new_v4();
        let interview_id = Uuid::new_v4();

        sink.record_auto(
            ActionType::InvitationSent,
            Some(job_id),
            json!({ "interview_id": interview_id.to_string() }),
        )
        .await;

        assert!(sink
            .has_interview_event(interview_id, ActionType::InvitationSent)
            .await
            .unwrap());
        let page = sink.query(&LogFilter::for_job(job_id)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].action_type, ActionType::InvitationSent);
    }
}

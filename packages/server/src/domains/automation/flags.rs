//! Feature-flag resolution.
//!
//! Flags are read from storage on every check - no caching, stale reads are
//! acceptable. Resolution is fail-open: a missing record, or a storage error,
//! reads as enabled so a dropped flag table cannot freeze the pipeline.

use std::sync::Arc;

use crate::domains::automation::models::flag_names;
use crate::domains::jobs::Job;
use crate::storage::Storage;

/// Resolves `(flag, job?) -> bool` with job-level automation overrides.
#[derive(Clone)]
pub struct FlagResolver {
    storage: Arc<dyn Storage>,
}

impl FlagResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolution order:
    /// 1. no flag record -> enabled
    /// 2. record disabled -> disabled
    /// 3. job-scoped flag with `job.automation_enabled = false` -> disabled
    /// 4. otherwise enabled
    pub async fn is_enabled(&self, flag: &str, job: Option<&Job>) -> bool {
        let record = match self.storage.get_flag(flag).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(flag, error = %err, "flag lookup failed, failing open");
                return true;
            }
        };

        let record = match record {
            Some(record) => record,
            None => return true,
        };

        if !record.enabled {
            return false;
        }

        if let Some(job) = job {
            if flag_names::JOB_SCOPED.contains(&flag) && !job.automation_enabled {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::automation::FeatureFlag;
    use crate::domains::jobs::NewJob;
    use crate::storage::InMemoryStorage;
    use uuid::Uuid;

    async fn harness() -> (Arc<InMemoryStorage>, FlagResolver) {
        let storage = Arc::new(InMemoryStorage::new());
        let resolver = FlagResolver::new(storage.clone());
        (storage, resolver)
    }

    async fn make_job(storage: &InMemoryStorage, automation_enabled: bool) -> Job {
        let job = storage
            .insert_job(NewJob {
                title: "Engineer".to_string(),
                description: String::new(),
                posted_by: Uuid::new_v4(),
                openings: 1,
                buffer_target: 0,
            })
            .await
            .unwrap();
        if automation_enabled {
            job
        } else {
            storage
                .update_job(
                    job.id,
                    crate::domains::jobs::JobUpdate {
                        automation_enabled: Some(false),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn missing_flag_fails_open() {
        let (_storage, resolver) = harness().await;
        assert!(resolver.is_enabled("auto_shortlisting", None).await);
    }

    #[tokio::test]
    async fn disabled_flag_wins() {
        let (storage, resolver) = harness().await;
        storage
            .upsert_flag(&FeatureFlag {
                name: "auto_shortlisting".to_string(),
                enabled: false,
                description: String::new(),
            })
            .await
            .unwrap();
        assert!(!resolver.is_enabled("auto_shortlisting", None).await);
    }

    #[tokio::test]
    async fn job_override_disables_scoped_flags() {
        let (storage, resolver) = harness().await;
        storage
            .upsert_flag(&FeatureFlag {
                name: "auto_promotion".to_string(),
                enabled: true,
                description: String::new(),
            })
            .await
            .unwrap();
        let job = make_job(&storage, false).await;
        assert!(!resolver.is_enabled("auto_promotion", Some(&job)).await);
    }

    #[tokio::test]
    async fn job_override_ignored_for_unscoped_flags() {
        let (storage, resolver) = harness().await;
        storage
            .upsert_flag(&FeatureFlag {
                name: "negotiation_bot".to_string(),
                enabled: true,
                description: String::new(),
            })
            .await
            .unwrap();
        let job = make_job(&storage, false).await;
        assert!(resolver.is_enabled("negotiation_bot", Some(&job)).await);
    }

    #[tokio::test]
    async fn enabled_flag_with_automation_on_passes() {
        let (storage, resolver) = harness().await;
        storage
            .upsert_flag(&FeatureFlag {
                name: "global_automation".to_string(),
                enabled: true,
                description: String::new(),
            })
            .await
            .unwrap();
        let job = make_job(&storage, true).await;
        assert!(resolver.is_enabled("global_automation", Some(&job)).await);
    }
}

//! Fallback reconciliation
//!
//! Periodically reads every record and publishes a change signal when the
//! stored state differs from what the previous poll saw. This picks up
//! writes made by other processes sharing the same Redis database; local
//! writes are already signalled by the store.

use classbook_common::{Appointment, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::store::AppointmentStore;

pub struct Reconciler {
    store: Arc<AppointmentStore>,
    interval: Duration,
    last_fingerprint: Option<u64>,
}

impl Reconciler {
    pub fn new(store: Arc<AppointmentStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last_fingerprint: None,
        }
    }

    /// Poll forever; errors are logged and the next poll proceeds
    pub async fn start(mut self) {
        info!(
            "Starting reconciler (polling every {} seconds)",
            self.interval.as_secs()
        );

        loop {
            if let Err(e) = self.reconcile_once().await {
                error!("Error reconciling appointments: {}", e);
            }

            sleep(self.interval).await;
        }
    }

    /// Returns true if a change signal was published.
    ///
    /// The first poll only records a baseline.
    pub async fn reconcile_once(&mut self) -> Result<bool> {
        let appointments = self.store.get_all().await?;
        let current = fingerprint(&appointments);

        let drifted = match self.last_fingerprint.replace(current) {
            None => {
                debug!("Reconciler baseline over {} records", appointments.len());
                false
            }
            Some(previous) => previous != current,
        };

        if drifted {
            let version = self.store.feed().publish();
            info!("Detected external appointment changes, published version {}", version);
        }

        Ok(drifted)
    }
}

/// Order-independent digest of `(id, status, updated_at)`
pub fn fingerprint(appointments: &[Appointment]) -> u64 {
    let mut entries: Vec<_> = appointments
        .iter()
        .map(|a| (a.id.as_str(), a.status.as_str(), a.updated_at))
        .collect();
    entries.sort_unstable();

    let mut hasher = DefaultHasher::new();
    entries.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeFeed;
    use crate::memory::MemoryStorage;
    use crate::storage::AppointmentRepository;
    use chrono::NaiveDate;
    use classbook_common::{CourseId, NewAppointment, UserId};

    fn booking(student: &str) -> Appointment {
        Appointment::new(NewAppointment {
            student_id: UserId::new(student),
            course_id: CourseId::new("c1"),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "10:00".to_string(),
            topic: String::new(),
            description: None,
            trainer_id: None,
            duration_minutes: None,
        })
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = booking("s1");
        let b = booking("s2");
        assert_eq!(
            fingerprint(&[a.clone(), b.clone()]),
            fingerprint(&[b, a.clone()])
        );

        let mut changed = a.clone();
        changed.mark_rejected("Full".to_string());
        assert_ne!(fingerprint(&[a]), fingerprint(&[changed]));
    }

    #[tokio::test]
    async fn test_publishes_only_on_external_drift() {
        let repository = Arc::new(MemoryStorage::new());
        let feed = Arc::new(ChangeFeed::new());
        let store = Arc::new(AppointmentStore::new(repository.clone(), Arc::clone(&feed)));
        let mut reconciler = Reconciler::new(store, Duration::from_secs(30));

        // Baseline
        assert!(!reconciler.reconcile_once().await.unwrap());
        assert!(!reconciler.reconcile_once().await.unwrap());
        assert_eq!(feed.version(), 0);

        // A write that bypasses the store, as another process would do
        repository.upsert(&booking("s1")).await.unwrap();

        assert!(reconciler.reconcile_once().await.unwrap());
        assert_eq!(feed.version(), 1);

        assert!(!reconciler.reconcile_once().await.unwrap());
        assert_eq!(feed.version(), 1);
    }
}

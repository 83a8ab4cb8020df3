//! Notification worker
//!
//! Consumes appointment events and hands each one to the dispatcher on its
//! own task.

use classbook_common::AppointmentEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::dispatcher::NotificationDispatcher;

pub struct NotificationWorker {
    dispatcher: Arc<NotificationDispatcher>,
}

impl NotificationWorker {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run until every sender is dropped, then wait for in-flight dispatches
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<AppointmentEvent>) {
        info!("Notification worker started");

        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                event = receiver.recv() => {
                    let Some(event) = event else { break };

                    debug!(
                        "Dispatching {} event for appointment: {}",
                        event.name(),
                        event.subject().appointment_id
                    );

                    let dispatcher = Arc::clone(&self.dispatcher);
                    in_flight.spawn(async move {
                        dispatcher.dispatch(&event).await;
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Notification task failed: {}", e);
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Notification task failed: {}", e);
            }
        }

        info!("Notification worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::LogEmailSender;
    use crate::inbox::NotificationRepository;
    use crate::memory::MemoryStorage;
    use chrono::NaiveDate;
    use classbook_common::{Appointment, CourseId, NewAppointment, UserId};

    fn rejected(student: &str) -> Appointment {
        let mut appt = Appointment::new(NewAppointment {
            student_id: UserId::new(student),
            course_id: CourseId::new("c1"),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "10:00".to_string(),
            topic: String::new(),
            description: None,
            trainer_id: None,
            duration_minutes: None,
        });
        appt.mark_rejected("Full".to_string());
        appt
    }

    #[tokio::test]
    async fn test_worker_drains_channel_before_stopping() {
        let storage = Arc::new(MemoryStorage::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            storage.clone(),
            storage.clone(),
            Arc::new(LogEmailSender),
        ));

        let (tx, rx) = mpsc::unbounded_channel();
        for student in ["s1", "s2", "s2"] {
            tx.send(AppointmentEvent::rejected(&rejected(student))).unwrap();
        }
        drop(tx);

        NotificationWorker::new(dispatcher).run(rx).await;

        let s1 = storage.list_for_user(&UserId::new("s1")).await.unwrap();
        let s2 = storage.list_for_user(&UserId::new("s2")).await.unwrap();
        assert_eq!(s1.len(), 1);
        assert_eq!(s2.len(), 2);
    }
}

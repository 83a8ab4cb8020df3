//! Notification Dispatcher
//!
//! Turns an [`AppointmentEvent`] into one in-app notification for the
//! student and, when the student has an email address on file, one email.
//! Delivery is best-effort: every failure is logged and swallowed.

use classbook_common::{
    AppointmentEvent, EventSubject, Notification, NotificationCategory, NotificationKind, UserId,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::directory::Directory;
use crate::email::{EmailMessage, EmailSender};
use crate::inbox::NotificationRepository;
use crate::templates::{self, RenderedEmail};

const FALLBACK_STUDENT_NAME: &str = "Student";
const FALLBACK_COURSE_TITLE: &str = "your course";

/// In-app half of a rendered notification
struct InAppMessage {
    title: String,
    message: String,
    kind: NotificationKind,
    category: NotificationCategory,
}

/// Who and what an event is about, resolved from the directory
struct Recipient {
    name: String,
    email: Option<String>,
    course_title: String,
}

pub struct NotificationDispatcher {
    inbox: Arc<dyn NotificationRepository>,
    directory: Arc<dyn Directory>,
    email: Arc<dyn EmailSender>,
}

impl NotificationDispatcher {
    pub fn new(
        inbox: Arc<dyn NotificationRepository>,
        directory: Arc<dyn Directory>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            inbox,
            directory,
            email,
        }
    }

    /// Persist an inbox entry. Returns whether it was stored.
    pub async fn notify_in_app(
        &self,
        user_id: &UserId,
        title: &str,
        message: &str,
        kind: NotificationKind,
        category: NotificationCategory,
    ) -> bool {
        let notification = Notification::new(user_id.clone(), title, message, kind, category);
        match self.inbox.create(&notification).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store notification for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// One delivery attempt. Returns whether the provider accepted it.
    pub async fn send_email(&self, message: &EmailMessage) -> bool {
        match self.email.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send email to {}: {}", message.to, e);
                false
            }
        }
    }

    pub async fn dispatch(&self, event: &AppointmentEvent) {
        let subject = event.subject();
        let recipient = self.resolve(subject).await;

        let (in_app, rendered) = render(event, &recipient);

        self.notify_in_app(
            &subject.student_id,
            &in_app.title,
            &in_app.message,
            in_app.kind,
            in_app.category,
        )
        .await;

        match recipient.email {
            Some(address) => {
                self.send_email(&EmailMessage::new(address, rendered)).await;
            }
            None => debug!(
                "No email address for student {}, skipping {} email",
                subject.student_id,
                event.name()
            ),
        }
    }

    async fn resolve(&self, subject: &EventSubject) -> Recipient {
        let profile = match self.directory.user(&subject.student_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Directory lookup failed for user {}: {}", subject.student_id, e);
                None
            }
        };

        let course = match self.directory.course(&subject.course_id).await {
            Ok(course) => course,
            Err(e) => {
                warn!("Directory lookup failed for course {}: {}", subject.course_id, e);
                None
            }
        };

        let course_title = match course {
            Some(course) if !course.title.trim().is_empty() => course.title,
            _ if !subject.topic.trim().is_empty() => subject.topic.clone(),
            _ => FALLBACK_COURSE_TITLE.to_string(),
        };

        match profile {
            Some(profile) => {
                let profile = profile.normalized();
                Recipient {
                    name: profile.name,
                    email: profile.email,
                    course_title,
                }
            }
            None => Recipient {
                name: FALLBACK_STUDENT_NAME.to_string(),
                email: None,
                course_title,
            },
        }
    }
}

fn render(event: &AppointmentEvent, recipient: &Recipient) -> (InAppMessage, RenderedEmail) {
    let subject = event.subject();
    let course = &recipient.course_title;
    let date = subject.date.to_string();
    let time = subject.time.as_str();

    match event {
        AppointmentEvent::Approved { meeting_link, .. } => {
            let link = Some(meeting_link.as_str()).filter(|l| !l.trim().is_empty());
            let mut message = format!(
                "Your appointment for {} on {} at {} has been approved",
                course, date, time
            );
            if let Some(link) = link {
                message.push_str(&format!(". Meeting link: {}", link));
            }
            (
                InAppMessage {
                    title: "✅ Class Appointment Approved".to_string(),
                    message,
                    kind: NotificationKind::Success,
                    category: NotificationCategory::Appointment,
                },
                templates::approval(&recipient.name, course, &date, time, link),
            )
        }
        AppointmentEvent::Rejected { reason, .. } => (
            InAppMessage {
                title: "❌ Class Appointment Rejected".to_string(),
                message: format!(
                    "Your appointment for {} on {} at {} could not be approved. Reason: {}",
                    course, date, time, reason
                ),
                kind: NotificationKind::Error,
                category: NotificationCategory::Appointment,
            },
            templates::rejection(&recipient.name, course, Some(reason.as_str())),
        ),
        AppointmentEvent::Completed { .. } => (
            InAppMessage {
                title: "🎉 Class Completed".to_string(),
                message: format!(
                    "Your session for {} on {} has been marked as completed",
                    course, date
                ),
                kind: NotificationKind::Success,
                category: NotificationCategory::Appointment,
            },
            templates::completion(&recipient.name, course),
        ),
        AppointmentEvent::MeetingLinkUpdated {
            meeting_link,
            description,
            ..
        } => (
            InAppMessage {
                title: "🎓 Meeting Link Ready".to_string(),
                message: format!("Your meeting link for {} is ready: {}", course, meeting_link),
                kind: NotificationKind::Info,
                category: NotificationCategory::Meeting,
            },
            templates::meeting_link(
                &recipient.name,
                course,
                meeting_link,
                description.as_deref(),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use classbook_common::{
        Appointment, CourseId, CourseSummary, Error, MeetingDetails, MeetingSchedule,
        NewAppointment, NotificationId, Result, UserProfile,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Err(Error::NotificationDelivery("provider down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct BrokenInbox;

    #[async_trait]
    impl NotificationRepository for BrokenInbox {
        async fn create(&self, _: &Notification) -> Result<()> {
            Err(Error::Storage("inbox unavailable".to_string()))
        }

        async fn list_for_user(&self, _: &UserId) -> Result<Vec<Notification>> {
            Ok(Vec::new())
        }

        async fn mark_read(&self, id: &NotificationId) -> Result<Notification> {
            Err(Error::not_found("notification", id))
        }

        async fn mark_all_read(&self, _: &UserId) -> Result<usize> {
            Ok(0)
        }

        async fn delete(&self, id: &NotificationId) -> Result<()> {
            Err(Error::not_found("notification", id))
        }
    }

    fn approved(topic: &str, link: &str) -> Appointment {
        let mut appt = Appointment::new(NewAppointment {
            student_id: UserId::new("s1"),
            course_id: CourseId::new("c1"),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "10:00".to_string(),
            topic: topic.to_string(),
            description: None,
            trainer_id: None,
            duration_minutes: None,
        });
        appt.mark_approved(MeetingDetails::with_link(link));
        appt
    }

    async fn storage_with_student(email: Option<&str>) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .upsert_user(&UserProfile::new(UserId::new("s1"), "Ada", email))
            .await
            .unwrap();
        storage
            .upsert_course(&CourseSummary {
                id: CourseId::new("c1"),
                title: "Rust 101".to_string(),
            })
            .await
            .unwrap();
        storage
    }

    fn dispatcher(
        storage: &Arc<MemoryStorage>,
        sender: &Arc<RecordingSender>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::clone(storage) as Arc<dyn NotificationRepository>,
            Arc::clone(storage) as Arc<dyn Directory>,
            Arc::clone(sender) as Arc<dyn EmailSender>,
        )
    }

    #[tokio::test]
    async fn test_approval_sends_one_notification_and_one_email() {
        let storage = storage_with_student(Some("Ada@Example.com")).await;
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&storage, &sender);

        let appt = approved("", "https://meet.example/abc");
        dispatcher.dispatch(&AppointmentEvent::approved(&appt)).await;

        let inbox = storage.list_for_user(&UserId::new("s1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Success);
        assert!(inbox[0].message.contains("Rust 101"));
        assert!(inbox[0].message.contains("https://meet.example/abc"));

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "Class Appointment Approved ✅");
        assert!(sent[0].body.contains("Hi Ada,"));
    }

    #[tokio::test]
    async fn test_email_failure_is_swallowed() {
        let storage = storage_with_student(Some("ada@example.com")).await;
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let dispatcher = dispatcher(&storage, &sender);

        let mut appt = approved("", "");
        appt.mark_rejected("Full".to_string());
        dispatcher.dispatch(&AppointmentEvent::rejected(&appt)).await;

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(
            storage
                .list_for_user(&UserId::new("s1"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_no_email_without_address() {
        let storage = storage_with_student(None).await;
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&storage, &sender);

        let appt = approved("", "https://meet.example/abc");
        dispatcher.dispatch(&AppointmentEvent::approved(&appt)).await;

        assert!(sender.sent.lock().unwrap().is_empty());
        assert_eq!(storage.unread_count(&UserId::new("s1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_student_and_course_fall_back_to_topic() {
        let storage = Arc::new(MemoryStorage::new());
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&storage, &sender);

        let appt = approved("Lifetimes", "");
        dispatcher.dispatch(&AppointmentEvent::approved(&appt)).await;

        let inbox = storage.list_for_user(&UserId::new("s1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].message.contains("Lifetimes"));
        assert!(!inbox[0].message.contains("Meeting link"));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbox_failure_still_attempts_email() {
        let storage = storage_with_student(Some("ada@example.com")).await;
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(BrokenInbox),
            Arc::clone(&storage) as Arc<dyn Directory>,
            Arc::clone(&sender) as Arc<dyn EmailSender>,
        );

        let appt = approved("", "https://meet.example/abc");
        dispatcher.dispatch(&AppointmentEvent::approved(&appt)).await;

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_meeting_link_update_uses_meeting_template() {
        let storage = storage_with_student(Some("ada@example.com")).await;
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&storage, &sender);

        let mut appt = approved("", "");
        appt.set_meeting_link(
            "https://meet.example/new".to_string(),
            MeetingSchedule {
                description: Some("Room 2".to_string()),
                ..MeetingSchedule::default()
            },
        );
        dispatcher
            .dispatch(&AppointmentEvent::meeting_link_updated(&appt))
            .await;

        let inbox = storage.list_for_user(&UserId::new("s1")).await.unwrap();
        assert_eq!(inbox[0].category, NotificationCategory::Meeting);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Meeting Link for Your Class 🎓");
    }
}

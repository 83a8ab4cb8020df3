//! Appointment Store
//!
//! Wraps an [`AppointmentRepository`] and publishes a change signal after
//! every successful mutation.

use classbook_common::{
    Appointment, AppointmentId, AppointmentStatus, CourseId, NewAppointment, Result, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::change_feed::ChangeFeed;
use crate::storage::AppointmentRepository;

/// Optional lookup criteria; all present criteria must match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub student_id: Option<UserId>,
    pub trainer_id: Option<UserId>,
    pub course_id: Option<CourseId>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    fn matches(&self, appointment: &Appointment) -> bool {
        self.student_id
            .as_ref()
            .map_or(true, |id| &appointment.student_id == id)
            && self
                .trainer_id
                .as_ref()
                .map_or(true, |id| appointment.trainer_id.as_ref() == Some(id))
            && self
                .course_id
                .as_ref()
                .map_or(true, |id| &appointment.course_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
    }
}

/// Counts per status
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub completed: usize,
}

/// A student's bookings
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StudentStats {
    pub total_booked: usize,
    /// Completed sessions
    pub attended: usize,
    /// Pending or approved
    pub remaining: usize,
    /// Rounded percentage of bookings attended, 0 without bookings
    pub attendance_rate: u32,
}

/// Sessions assigned to a trainer
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TrainerStats {
    pub total_students: usize,
    pub sessions_conducted: usize,
    pub upcoming: usize,
    /// Sum of the durations of completed sessions
    pub teaching_minutes: u64,
}

pub struct AppointmentStore {
    repository: Arc<dyn AppointmentRepository>,
    feed: Arc<ChangeFeed>,
}

impl AppointmentStore {
    pub fn new(repository: Arc<dyn AppointmentRepository>, feed: Arc<ChangeFeed>) -> Self {
        Self { repository, feed }
    }

    pub fn feed(&self) -> Arc<ChangeFeed> {
        Arc::clone(&self.feed)
    }

    pub async fn get_all(&self) -> Result<Vec<Appointment>> {
        self.repository.get_all().await
    }

    pub async fn get_by_id(&self, id: &AppointmentId) -> Result<Appointment> {
        self.repository.get_by_id(id).await
    }

    /// Resolve a filter through the most selective index available
    pub async fn query(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let candidates = if let Some(student_id) = &filter.student_id {
            self.repository.find_by_student(student_id).await?
        } else if let Some(trainer_id) = &filter.trainer_id {
            self.repository.find_by_trainer(trainer_id).await?
        } else if let Some(course_id) = &filter.course_id {
            self.repository.find_by_course(course_id).await?
        } else if let Some(status) = filter.status {
            self.repository.find_by_status(status).await?
        } else {
            self.repository.get_all().await?
        };

        Ok(candidates
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect())
    }

    pub async fn upsert(&self, appointment: &Appointment) -> Result<()> {
        self.repository.upsert(appointment).await?;
        self.feed.publish();
        Ok(())
    }

    /// Record a new booking as `Pending`
    pub async fn submit(&self, request: NewAppointment) -> Result<Appointment> {
        request.validate()?;

        let appointment = Appointment::new(request);
        self.upsert(&appointment).await?;

        info!(
            "Submitted appointment: {} for student: {} course: {}",
            appointment.id, appointment.student_id, appointment.course_id
        );

        Ok(appointment)
    }

    /// Conditional write; publishes only when the swap happened
    pub async fn replace_if_current(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        version: u64,
    ) -> Result<bool> {
        let swapped = self
            .repository
            .replace_if_current(appointment, expected, version)
            .await?;
        if swapped {
            self.feed.publish();
        }
        Ok(swapped)
    }

    pub async fn stats(&self) -> Result<AppointmentStats> {
        let appointments = self.repository.get_all().await?;

        let mut stats = AppointmentStats {
            total: appointments.len(),
            ..Default::default()
        };
        for appointment in &appointments {
            match appointment.status {
                AppointmentStatus::Pending => stats.pending += 1,
                AppointmentStatus::Approved => stats.approved += 1,
                AppointmentStatus::Rejected => stats.rejected += 1,
                AppointmentStatus::Completed => stats.completed += 1,
            }
        }

        Ok(stats)
    }

    pub async fn student_stats(&self, student_id: &UserId) -> Result<StudentStats> {
        let appointments = self.repository.find_by_student(student_id).await?;

        let total_booked = appointments.len();
        let attended = count_completed(&appointments);
        let attendance_rate = if total_booked == 0 {
            0
        } else {
            (attended as f64 / total_booked as f64 * 100.0).round() as u32
        };

        Ok(StudentStats {
            total_booked,
            attended,
            remaining: count_upcoming(&appointments),
            attendance_rate,
        })
    }

    pub async fn trainer_stats(&self, trainer_id: &UserId) -> Result<TrainerStats> {
        let appointments = self.repository.find_by_trainer(trainer_id).await?;

        let students: HashSet<&UserId> = appointments.iter().map(|a| &a.student_id).collect();
        let teaching_minutes = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .map(|a| u64::from(a.duration_minutes))
            .sum();

        Ok(TrainerStats {
            total_students: students.len(),
            sessions_conducted: count_completed(&appointments),
            upcoming: count_upcoming(&appointments),
            teaching_minutes,
        })
    }

    pub async fn health_check(&self) -> Result<()> {
        self.repository.health_check().await
    }
}

fn count_completed(appointments: &[Appointment]) -> usize {
    appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed)
        .count()
}

fn count_upcoming(appointments: &[Appointment]) -> usize {
    appointments
        .iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Pending | AppointmentStatus::Approved))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use chrono::NaiveDate;
    use classbook_common::{Error, MeetingDetails};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> AppointmentStore {
        AppointmentStore::new(Arc::new(MemoryStorage::new()), Arc::new(ChangeFeed::new()))
    }

    fn booking(student: &str, course: &str) -> NewAppointment {
        NewAppointment {
            student_id: UserId::new(student),
            course_id: CourseId::new(course),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            time: "10:00".to_string(),
            topic: String::new(),
            description: None,
            trainer_id: None,
            duration_minutes: None,
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_record_and_signals() {
        let store = store();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.feed().subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let appt = store.submit(booking("s1", "c1")).await.unwrap();

        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(store.get_by_id(&appt.id).await.unwrap(), appt);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_booking_without_signal() {
        let store = store();
        let mut request = booking("s1", "c1");
        request.time = String::new();

        let err = store.submit(request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.feed().version(), 0);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_combines_criteria() {
        let store = store();
        store.submit(booking("s1", "c1")).await.unwrap();
        store.submit(booking("s1", "c2")).await.unwrap();
        store.submit(booking("s2", "c1")).await.unwrap();

        let filter = AppointmentFilter {
            student_id: Some(UserId::new("s1")),
            course_id: Some(CourseId::new("c1")),
            ..Default::default()
        };
        let found = store.query(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].course_id, CourseId::new("c1"));

        let all = store.query(&AppointmentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let store = store();
        let first = store.submit(booking("s1", "c1")).await.unwrap();
        store.submit(booking("s2", "c1")).await.unwrap();

        let mut rejected = first.clone();
        rejected.mark_rejected("full".to_string());
        assert!(store
            .replace_if_current(&rejected, AppointmentStatus::Pending, first.version)
            .await
            .unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            AppointmentStats {
                total: 2,
                pending: 1,
                approved: 0,
                rejected: 1,
                completed: 0,
            }
        );
    }

    /// Approve for `trainer`, then complete when `done`
    async fn advance(store: &AppointmentStore, appt: &Appointment, trainer: &str, done: bool) {
        let mut approved = appt.clone();
        approved.mark_approved(MeetingDetails {
            trainer_id: Some(UserId::new(trainer)),
            ..MeetingDetails::default()
        });
        assert!(store
            .replace_if_current(&approved, AppointmentStatus::Pending, appt.version)
            .await
            .unwrap());

        if done {
            let mut completed = approved.clone();
            completed.mark_completed(None);
            assert!(store
                .replace_if_current(&completed, AppointmentStatus::Approved, approved.version)
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_student_stats() {
        let store = store();
        let first = store.submit(booking("s1", "c1")).await.unwrap();
        let second = store.submit(booking("s1", "c2")).await.unwrap();
        let third = store.submit(booking("s1", "c3")).await.unwrap();
        store.submit(booking("s2", "c1")).await.unwrap();

        advance(&store, &first, "t1", true).await;
        advance(&store, &second, "t1", false).await;
        let mut rejected = third.clone();
        rejected.mark_rejected("full".to_string());
        assert!(store
            .replace_if_current(&rejected, AppointmentStatus::Pending, third.version)
            .await
            .unwrap());

        let stats = store.student_stats(&UserId::new("s1")).await.unwrap();
        assert_eq!(
            stats,
            StudentStats {
                total_booked: 3,
                attended: 1,
                remaining: 1,
                attendance_rate: 33,
            }
        );
    }

    #[tokio::test]
    async fn test_stats_without_bookings_are_zero() {
        let store = store();
        store.submit(booking("s1", "c1")).await.unwrap();

        let student = store.student_stats(&UserId::new("nobody")).await.unwrap();
        assert_eq!(student, StudentStats::default());
        assert_eq!(student.attendance_rate, 0);

        let trainer = store.trainer_stats(&UserId::new("nobody")).await.unwrap();
        assert_eq!(trainer, TrainerStats::default());
    }

    #[tokio::test]
    async fn test_trainer_stats() {
        let store = store();
        let first = store.submit(booking("s1", "c1")).await.unwrap();
        let second = store.submit(booking("s1", "c2")).await.unwrap();
        let third = store.submit(booking("s2", "c1")).await.unwrap();
        let other = store.submit(booking("s3", "c1")).await.unwrap();

        advance(&store, &first, "t1", true).await;
        advance(&store, &second, "t1", true).await;
        advance(&store, &third, "t1", false).await;
        advance(&store, &other, "t2", true).await;

        let stats = store.trainer_stats(&UserId::new("t1")).await.unwrap();
        assert_eq!(
            stats,
            TrainerStats {
                total_students: 2,
                sessions_conducted: 2,
                upcoming: 1,
                teaching_minutes: 120,
            }
        );
    }
}

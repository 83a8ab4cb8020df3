//! In-process storage backend
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and tests. State
//! lives for the lifetime of the process.

use async_trait::async_trait;
use classbook_common::{
    Appointment, AppointmentId, AppointmentStatus, CourseId, CourseSummary, Error, Notification,
    NotificationId, Result, UserId, UserProfile,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::directory::Directory;
use crate::inbox::NotificationRepository;
use crate::storage::AppointmentRepository;

#[derive(Default)]
pub struct MemoryStorage {
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
    users: RwLock<HashMap<UserId, UserProfile>>,
    courses: RwLock<HashMap<CourseId, CourseSummary>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool + Send,
    {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|&a| predicate(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matching
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStorage {
    async fn get_all(&self) -> Result<Vec<Appointment>> {
        Ok(self.filter(|_| true).await)
    }

    async fn get_by_id(&self, id: &AppointmentId) -> Result<Appointment> {
        self.appointments
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("appointment", id))
    }

    async fn upsert(&self, appointment: &Appointment) -> Result<()> {
        self.appointments
            .write()
            .await
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn find_by_student(&self, student_id: &UserId) -> Result<Vec<Appointment>> {
        Ok(self.filter(|a| &a.student_id == student_id).await)
    }

    async fn find_by_trainer(&self, trainer_id: &UserId) -> Result<Vec<Appointment>> {
        Ok(self
            .filter(|a| a.trainer_id.as_ref() == Some(trainer_id))
            .await)
    }

    async fn find_by_course(&self, course_id: &CourseId) -> Result<Vec<Appointment>> {
        Ok(self.filter(|a| &a.course_id == course_id).await)
    }

    async fn find_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>> {
        Ok(self.filter(|a| a.status == status).await)
    }

    async fn replace_if_current(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        version: u64,
    ) -> Result<bool> {
        // The write lock spans the comparison and the swap
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&appointment.id) {
            None => Err(Error::not_found("appointment", &appointment.id)),
            Some(stored) if stored.status != expected || stored.version != version => Ok(false),
            Some(stored) => {
                *stored = appointment.clone();
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl NotificationRepository for MemoryStorage {
    async fn create(&self, notification: &Notification) -> Result<()> {
        self.notifications
            .write()
            .await
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut listed: Vec<Notification> = notifications
            .values()
            .filter(|n| &n.user_id == user_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .get_mut(id)
            .ok_or_else(|| Error::not_found("notification", id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize> {
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for notification in notifications
            .values_mut()
            .filter(|n| &n.user_id == user_id && !n.read)
        {
            notification.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, id: &NotificationId) -> Result<()> {
        self.notifications
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("notification", id))
    }
}

#[async_trait]
impl Directory for MemoryStorage {
    async fn user(&self, id: &UserId) -> Result<Option<UserProfile>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn course(&self, id: &CourseId) -> Result<Option<CourseSummary>> {
        Ok(self.courses.read().await.get(id).cloned())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        self.users
            .write()
            .await
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn upsert_course(&self, course: &CourseSummary) -> Result<()> {
        self.courses
            .write()
            .await
            .insert(course.id.clone(), course.clone());
        Ok(())
    }
}

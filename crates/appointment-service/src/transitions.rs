//! Status Transition Service
//!
//! The only code path that changes an appointment's status. Every operation
//! reads the record, checks the action against the current status, applies
//! the change and commits it with a compare-and-swap on the status and
//! version that were read. On success one [`AppointmentEvent`] is handed to the notification
//! worker; delivery never affects the result of the transition.

use classbook_common::{
    Action, Appointment, AppointmentEvent, AppointmentId, AppointmentStatus, Error,
    MeetingDetails, MeetingSchedule, Result,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clustering::{cluster_pending, Cluster};
use crate::store::{AppointmentFilter, AppointmentStore};

/// A group member that was left untouched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAppointment {
    pub id: AppointmentId,
    pub reason: String,
}

/// Result of a group operation
#[derive(Debug, Default, Serialize)]
pub struct GroupOutcome {
    pub updated: Vec<Appointment>,
    pub skipped: Vec<SkippedAppointment>,
}

pub struct TransitionService {
    store: Arc<AppointmentStore>,
    events: mpsc::UnboundedSender<AppointmentEvent>,
}

impl TransitionService {
    pub fn new(
        store: Arc<AppointmentStore>,
        events: mpsc::UnboundedSender<AppointmentEvent>,
    ) -> Self {
        Self { store, events }
    }

    pub async fn approve_single(
        &self,
        id: &AppointmentId,
        details: MeetingDetails,
    ) -> Result<Appointment> {
        let mut appointment = self.store.get_by_id(id).await?;
        appointment.ensure_allowed(Action::Approve)?;
        let version = appointment.version;

        appointment.mark_approved(details);
        let appointment = self.commit(appointment, Action::Approve, version).await?;

        info!(
            "Approved appointment: {} for student: {}",
            appointment.id, appointment.student_id
        );
        self.emit(AppointmentEvent::approved(&appointment));

        Ok(appointment)
    }

    /// Approve every pending member; the rest are reported as skipped
    pub async fn approve_group(
        &self,
        ids: &[AppointmentId],
        details: MeetingDetails,
    ) -> Result<GroupOutcome> {
        let ids = unique_ids(ids)?;

        let mut outcome = GroupOutcome::default();
        for id in ids {
            match self.approve_single(&id, details.clone()).await {
                Ok(appointment) => outcome.updated.push(appointment),
                Err(e) => outcome.skip(id, e),
            }
        }

        info!(
            "Group approval finished: {} approved, {} skipped",
            outcome.updated.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub async fn reject(&self, id: &AppointmentId, reason: &str) -> Result<Appointment> {
        let reason = required_reason(reason)?;
        self.reject_checked(id, reason).await
    }

    /// Reject every pending member; the rest are reported as skipped
    pub async fn reject_group(&self, ids: &[AppointmentId], reason: &str) -> Result<GroupOutcome> {
        let reason = required_reason(reason)?;
        let ids = unique_ids(ids)?;

        let mut outcome = GroupOutcome::default();
        for id in ids {
            match self.reject_checked(&id, reason.clone()).await {
                Ok(appointment) => outcome.updated.push(appointment),
                Err(e) => outcome.skip(id, e),
            }
        }

        info!(
            "Group rejection finished: {} rejected, {} skipped",
            outcome.updated.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    pub async fn complete(
        &self,
        id: &AppointmentId,
        feedback: Option<String>,
    ) -> Result<Appointment> {
        let mut appointment = self.store.get_by_id(id).await?;
        appointment.ensure_allowed(Action::Complete)?;
        let version = appointment.version;

        appointment.mark_completed(non_blank(feedback));
        let appointment = self.commit(appointment, Action::Complete, version).await?;

        info!("Completed appointment: {}", appointment.id);
        self.emit(AppointmentEvent::completed(&appointment));

        Ok(appointment)
    }

    /// Replace the meeting link (and optionally description, date and time)
    /// of an approved appointment
    pub async fn update_meeting_link(
        &self,
        id: &AppointmentId,
        meeting_link: &str,
        schedule: MeetingSchedule,
    ) -> Result<Appointment> {
        let meeting_link = required_link(meeting_link)?;
        self.relink_checked(id, meeting_link, tidy_schedule(schedule)).await
    }

    /// Send the same meeting to several approved appointments; the rest are
    /// reported as skipped
    pub async fn broadcast_meeting_link(
        &self,
        ids: &[AppointmentId],
        meeting_link: &str,
        schedule: MeetingSchedule,
    ) -> Result<GroupOutcome> {
        let meeting_link = required_link(meeting_link)?;
        let ids = unique_ids(ids)?;
        let schedule = tidy_schedule(schedule);

        let mut outcome = GroupOutcome::default();
        for id in ids {
            match self
                .relink_checked(&id, meeting_link.clone(), schedule.clone())
                .await
            {
                Ok(appointment) => outcome.updated.push(appointment),
                Err(e) => outcome.skip(id, e),
            }
        }

        info!(
            "Meeting broadcast finished: {} updated, {} skipped",
            outcome.updated.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Current clusters of pending requests
    pub async fn clusters(&self) -> Result<Vec<Cluster>> {
        let pending = self
            .store
            .query(&AppointmentFilter {
                status: Some(AppointmentStatus::Pending),
                ..Default::default()
            })
            .await?;
        Ok(cluster_pending(&pending))
    }

    async fn reject_checked(&self, id: &AppointmentId, reason: String) -> Result<Appointment> {
        let mut appointment = self.store.get_by_id(id).await?;
        appointment.ensure_allowed(Action::Reject)?;
        let version = appointment.version;

        appointment.mark_rejected(reason);
        let appointment = self.commit(appointment, Action::Reject, version).await?;

        info!(
            "Rejected appointment: {} for student: {}",
            appointment.id, appointment.student_id
        );
        self.emit(AppointmentEvent::rejected(&appointment));

        Ok(appointment)
    }

    async fn relink_checked(
        &self,
        id: &AppointmentId,
        meeting_link: String,
        schedule: MeetingSchedule,
    ) -> Result<Appointment> {
        let mut appointment = self.store.get_by_id(id).await?;
        appointment.ensure_allowed(Action::UpdateMeetingLink)?;
        let version = appointment.version;

        appointment.set_meeting_link(meeting_link, schedule);
        let appointment = self
            .commit(appointment, Action::UpdateMeetingLink, version)
            .await?;

        info!("Updated meeting link of appointment: {}", appointment.id);
        self.emit(AppointmentEvent::meeting_link_updated(&appointment));

        Ok(appointment)
    }

    /// Write `updated` only if the stored record is still the one read at
    /// `version` and its status still allows `action`
    async fn commit(
        &self,
        updated: Appointment,
        action: Action,
        version: u64,
    ) -> Result<Appointment> {
        let expected = action.required_status();
        if self
            .store
            .replace_if_current(&updated, expected, version)
            .await?
        {
            return Ok(updated);
        }

        let current = self.store.get_by_id(&updated.id).await?;
        warn!(
            "Lost update race on appointment: {} (now {} at version {})",
            current.id, current.status, current.version
        );
        if current.status == expected {
            return Err(Error::Conflict {
                id: current.id.to_string(),
            });
        }
        Err(Error::InvalidTransition {
            id: current.id.to_string(),
            status: current.status,
            action,
        })
    }

    fn emit(&self, event: AppointmentEvent) {
        if let Err(e) = self.events.send(event) {
            warn!(
                "Notification worker is gone, dropping {} event for appointment: {}",
                e.0.name(),
                e.0.subject().appointment_id
            );
        }
    }
}

impl GroupOutcome {
    fn skip(&mut self, id: AppointmentId, error: Error) {
        match &error {
            Error::NotFound { .. } | Error::InvalidTransition { .. } | Error::Conflict { .. } => {}
            other => warn!("Skipping appointment {} after error: {}", id, other),
        }
        self.skipped.push(SkippedAppointment {
            id,
            reason: error.to_string(),
        });
    }
}

fn required_reason(reason: &str) -> Result<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::validation("A rejection reason is required"));
    }
    Ok(reason.to_string())
}

/// Drop duplicates, keeping first-seen order
fn unique_ids(ids: &[AppointmentId]) -> Result<Vec<AppointmentId>> {
    if ids.is_empty() {
        return Err(Error::validation("At least one appointment id is required"));
    }
    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect())
}

fn required_link(meeting_link: &str) -> Result<String> {
    let meeting_link = meeting_link.trim();
    if meeting_link.is_empty() {
        return Err(Error::validation("meeting_link is required"));
    }
    Ok(meeting_link.to_string())
}

fn tidy_schedule(schedule: MeetingSchedule) -> MeetingSchedule {
    MeetingSchedule {
        description: non_blank(schedule.description),
        date: schedule.date,
        time: non_blank(schedule.time),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! Appointment records and the status state machine
//!
//! ```text
//! Pending ──approve──► Approved ──complete──► Completed
//!    └────reject────► Rejected
//! ```
//!
//! `Rejected` and `Completed` are terminal. Updating the meeting link of an
//! `Approved` record is an action but not a transition.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::{AppointmentId, CourseId, UserId};

const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Appointment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Requested by a student, waiting for a trainer
    Pending,
    /// Accepted by a trainer
    Approved,
    /// Declined by a trainer
    Rejected,
    /// Session took place
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Completed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Completed)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "rejected" => Ok(AppointmentStatus::Rejected),
            "completed" => Ok(AppointmentStatus::Completed),
            _ => Err(format!("Unknown appointment status: {}", s)),
        }
    }
}

/// Operations a trainer can request on an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    Complete,
    UpdateMeetingLink,
}

impl Action {
    /// Status the record must be in for the action to apply
    pub fn required_status(self) -> AppointmentStatus {
        match self {
            Action::Approve | Action::Reject => AppointmentStatus::Pending,
            Action::Complete | Action::UpdateMeetingLink => AppointmentStatus::Approved,
        }
    }

    /// Status the record ends up in
    pub fn resulting_status(self) -> AppointmentStatus {
        match self {
            Action::Approve | Action::UpdateMeetingLink => AppointmentStatus::Approved,
            Action::Reject => AppointmentStatus::Rejected,
            Action::Complete => AppointmentStatus::Completed,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Complete => "complete",
            Action::UpdateMeetingLink => "update the meeting link of",
        };
        f.write_str(name)
    }
}

/// Natural grouping key of a pending request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub time: String,
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.course_id, self.date, self.time)
    }
}

/// Booking submitted by a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub student_id: UserId,
    pub course_id: CourseId,
    pub date: NaiveDate,
    pub time: String,

    #[serde(default)]
    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainer_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl NewAppointment {
    pub fn validate(&self) -> Result<()> {
        if self.student_id.is_blank() {
            return Err(Error::validation("student_id is required"));
        }
        if self.course_id.is_blank() {
            return Err(Error::validation("course_id is required"));
        }
        if self.time.trim().is_empty() {
            return Err(Error::validation("time is required"));
        }
        if self.duration_minutes == Some(0) {
            return Err(Error::validation("duration_minutes must be greater than 0"));
        }
        Ok(())
    }
}

/// Meeting metadata attached on approval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingDetails {
    /// May be empty: the link can be filled in after approval
    #[serde(default)]
    pub meeting_link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainer_id: Option<UserId>,
}

impl MeetingDetails {
    pub fn with_link(meeting_link: impl Into<String>) -> Self {
        Self {
            meeting_link: meeting_link.into(),
            ..Default::default()
        }
    }
}

/// Optional meeting fields sent along with a new link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingSchedule {
    #[serde(default, rename = "meeting_description")]
    pub description: Option<String>,

    #[serde(default, rename = "meeting_date")]
    pub date: Option<NaiveDate>,

    #[serde(default, rename = "meeting_time")]
    pub time: Option<String>,
}

/// An appointment / enrollment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub student_id: UserId,
    pub course_id: CourseId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainer_id: Option<UserId>,

    #[serde(default)]
    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub duration_minutes: u32,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped on every change; conditional writes compare it
    #[serde(default)]
    pub version: u64,
}

impl Appointment {
    /// Create a pending appointment from a booking
    pub fn new(request: NewAppointment) -> Self {
        let now = Utc::now();
        Self {
            id: AppointmentId::generate(),
            student_id: request.student_id,
            course_id: request.course_id,
            trainer_id: request.trainer_id,
            topic: request.topic,
            description: request.description,
            duration_minutes: request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            date: request.date,
            time: request.time,
            status: AppointmentStatus::Pending,
            meeting_link: None,
            meeting_description: None,
            meeting_date: None,
            meeting_time: None,
            rejection_reason: None,
            feedback_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn cluster_key(&self) -> ClusterKey {
        ClusterKey {
            course_id: self.course_id.clone(),
            date: self.date,
            time: self.time.clone(),
        }
    }

    /// Check that `action` is allowed from the current status
    pub fn ensure_allowed(&self, action: Action) -> Result<()> {
        if self.status == action.required_status() {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                id: self.id.to_string(),
                status: self.status,
                action,
            })
        }
    }

    /// Mark as approved. Missing meeting date/time default to today/now.
    pub fn mark_approved(&mut self, details: MeetingDetails) {
        let now = Local::now();
        self.status = AppointmentStatus::Approved;
        self.meeting_link = Some(details.meeting_link);
        self.meeting_description = details.meeting_description;
        self.meeting_date = Some(details.meeting_date.unwrap_or_else(|| now.date_naive()));
        self.meeting_time = Some(
            details
                .meeting_time
                .unwrap_or_else(|| now.format("%H:%M").to_string()),
        );
        if details.trainer_id.is_some() {
            self.trainer_id = details.trainer_id;
        }
        self.touch();
    }

    pub fn mark_rejected(&mut self, reason: String) {
        self.status = AppointmentStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.touch();
    }

    pub fn mark_completed(&mut self, feedback: Option<String>) {
        self.status = AppointmentStatus::Completed;
        if feedback.is_some() {
            self.feedback_message = feedback;
        }
        self.touch();
    }

    /// Replace the meeting link without touching the status.
    ///
    /// Description, date and time are only overwritten when given.
    pub fn set_meeting_link(&mut self, meeting_link: String, schedule: MeetingSchedule) {
        self.meeting_link = Some(meeting_link);
        if schedule.description.is_some() {
            self.meeting_description = schedule.description;
        }
        if schedule.date.is_some() {
            self.meeting_date = schedule.date;
        }
        if schedule.time.is_some() {
            self.meeting_time = schedule.time;
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// A meeting link may only exist on approved or completed records
    pub fn meeting_link_consistent(&self) -> bool {
        self.meeting_link.is_none()
            || matches!(
                self.status,
                AppointmentStatus::Approved | AppointmentStatus::Completed
            )
    }
}

//! Events published after a successful appointment mutation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;
use crate::ids::{AppointmentId, CourseId, UserId};

/// The appointment an event refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubject {
    pub appointment_id: AppointmentId,
    pub student_id: UserId,
    pub course_id: CourseId,
    pub topic: String,
    pub date: NaiveDate,
    pub time: String,
}

impl From<&Appointment> for EventSubject {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id.clone(),
            student_id: appointment.student_id.clone(),
            course_id: appointment.course_id.clone(),
            topic: appointment.topic.clone(),
            date: appointment.date,
            time: appointment.time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppointmentEvent {
    Approved {
        subject: EventSubject,
        meeting_link: String,
    },
    Rejected {
        subject: EventSubject,
        reason: String,
    },
    Completed {
        subject: EventSubject,
    },
    MeetingLinkUpdated {
        subject: EventSubject,
        meeting_link: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl AppointmentEvent {
    pub fn approved(appointment: &Appointment) -> Self {
        AppointmentEvent::Approved {
            subject: appointment.into(),
            meeting_link: appointment.meeting_link.clone().unwrap_or_default(),
        }
    }

    pub fn rejected(appointment: &Appointment) -> Self {
        AppointmentEvent::Rejected {
            subject: appointment.into(),
            reason: appointment.rejection_reason.clone().unwrap_or_default(),
        }
    }

    pub fn completed(appointment: &Appointment) -> Self {
        AppointmentEvent::Completed {
            subject: appointment.into(),
        }
    }

    pub fn meeting_link_updated(appointment: &Appointment) -> Self {
        AppointmentEvent::MeetingLinkUpdated {
            subject: appointment.into(),
            meeting_link: appointment.meeting_link.clone().unwrap_or_default(),
            description: appointment.meeting_description.clone(),
        }
    }

    pub fn subject(&self) -> &EventSubject {
        match self {
            AppointmentEvent::Approved { subject, .. }
            | AppointmentEvent::Rejected { subject, .. }
            | AppointmentEvent::Completed { subject }
            | AppointmentEvent::MeetingLinkUpdated { subject, .. } => subject,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AppointmentEvent::Approved { .. } => "approved",
            AppointmentEvent::Rejected { .. } => "rejected",
            AppointmentEvent::Completed { .. } => "completed",
            AppointmentEvent::MeetingLinkUpdated { .. } => "meeting_link_updated",
        }
    }
}

//! HTTP request and response bodies

use classbook_common::{
    Appointment, AppointmentId, MeetingDetails, MeetingSchedule, Notification, UserId,
};
use serde::{Deserialize, Serialize};

use crate::clustering::Cluster;
use crate::store::{StudentStats, TrainerStats};

/// Request to reject one appointment
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// Request to complete an appointment
#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub feedback_message: Option<String>,
}

/// Request to replace the meeting link of an approved appointment
#[derive(Debug, Deserialize)]
pub struct MeetingLinkRequest {
    pub meeting_link: String,

    #[serde(flatten)]
    pub schedule: MeetingSchedule,
}

/// Send one meeting to several approved appointments
#[derive(Debug, Deserialize)]
pub struct BroadcastMeetingRequest {
    pub ids: Vec<AppointmentId>,
    pub meeting_link: String,

    #[serde(flatten)]
    pub schedule: MeetingSchedule,
}

/// Approve several appointments with the same meeting details
#[derive(Debug, Deserialize)]
pub struct ApproveGroupRequest {
    pub ids: Vec<AppointmentId>,

    #[serde(flatten)]
    pub details: MeetingDetails,
}

/// Reject several appointments with the same reason
#[derive(Debug, Deserialize)]
pub struct RejectGroupRequest {
    pub ids: Vec<AppointmentId>,

    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UserProfileRequest {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    pub appointment: Appointment,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsListResponse {
    pub appointments: Vec<Appointment>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ClustersResponse {
    pub clusters: Vec<Cluster>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification: Notification,
}

/// A user's inbox, newest first
#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// Appointment analytics of one user, from both sides of a booking
#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub user_id: UserId,
    pub as_student: StudentStats,
    pub as_trainer: TrainerStats,
}

/// Change-feed version for polling clients
#[derive(Debug, Serialize)]
pub struct ChangesResponse {
    pub version: u64,
}

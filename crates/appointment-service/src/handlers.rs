//! API request handlers for the Appointment Service

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use classbook_common::{
    AppointmentId, CourseId, CourseSummary, Error, MeetingDetails, NewAppointment,
    NotificationId, UserId, UserProfile,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::directory::Directory;
use crate::inbox::NotificationRepository;
use crate::models::{
    AppointmentResponse, AppointmentsListResponse, ApproveGroupRequest, BroadcastMeetingRequest,
    ChangesResponse, ClustersResponse, CompleteRequest, CourseRequest, MarkAllReadResponse,
    MeetingLinkRequest, NotificationResponse, NotificationsListResponse, RejectGroupRequest,
    RejectRequest, UserProfileRequest, UserStatsResponse,
};
use crate::store::{AppointmentFilter, AppointmentStats, AppointmentStore};
use crate::transitions::{GroupOutcome, TransitionService};

/// Shared application state
pub struct AppState {
    pub store: Arc<AppointmentStore>,
    pub transitions: Arc<TransitionService>,
    pub inbox: Arc<dyn NotificationRepository>,
    pub directory: Arc<dyn Directory>,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. } | Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", err);
        }

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.health_check().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "service": "appointment-service"
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "service": "appointment-service",
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> ApiResult<AppointmentStats> {
    Ok(Json(state.store.stats().await?))
}

/// Booking analytics of one user as a student and as a trainer
pub async fn user_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> ApiResult<UserStatsResponse> {
    let as_student = state.store.student_stats(&user_id).await?;
    let as_trainer = state.store.trainer_stats(&user_id).await?;

    Ok(Json(UserStatsResponse {
        user_id,
        as_student,
        as_trainer,
    }))
}

/// Current change-feed version; clients refresh when it moves
pub async fn changes_handler(State(state): State<Arc<AppState>>) -> Json<ChangesResponse> {
    Json(ChangesResponse {
        version: state.store.feed().version(),
    })
}

/// Submit a new booking
pub async fn submit_appointment_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewAppointment>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    info!(
        "Submitting appointment for student: {} course: {}",
        payload.student_id, payload.course_id
    );

    let appointment = state.store.submit(payload).await?;

    Ok((StatusCode::CREATED, Json(AppointmentResponse { appointment })))
}

/// List appointments, optionally filtered
pub async fn list_appointments_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AppointmentFilter>,
) -> ApiResult<AppointmentsListResponse> {
    let appointments = state.store.query(&filter).await?;
    let total = appointments.len();

    Ok(Json(AppointmentsListResponse {
        appointments,
        total,
    }))
}

pub async fn get_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AppointmentId>,
) -> ApiResult<AppointmentResponse> {
    let appointment = state.store.get_by_id(&id).await?;
    Ok(Json(AppointmentResponse { appointment }))
}

/// Approve one appointment; the body is optional
pub async fn approve_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AppointmentId>,
    payload: Option<Json<MeetingDetails>>,
) -> ApiResult<AppointmentResponse> {
    info!("Approving appointment: {}", id);

    let details = payload.map(|Json(details)| details).unwrap_or_default();
    let appointment = state.transitions.approve_single(&id, details).await?;
    Ok(Json(AppointmentResponse { appointment }))
}

pub async fn reject_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AppointmentId>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<AppointmentResponse> {
    info!("Rejecting appointment: {}", id);

    let appointment = state.transitions.reject(&id, &payload.reason).await?;
    Ok(Json(AppointmentResponse { appointment }))
}

pub async fn complete_appointment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AppointmentId>,
    payload: Option<Json<CompleteRequest>>,
) -> ApiResult<AppointmentResponse> {
    info!("Completing appointment: {}", id);

    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let appointment = state
        .transitions
        .complete(&id, payload.feedback_message)
        .await?;
    Ok(Json(AppointmentResponse { appointment }))
}

pub async fn update_meeting_link_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AppointmentId>,
    Json(payload): Json<MeetingLinkRequest>,
) -> ApiResult<AppointmentResponse> {
    info!("Updating meeting link of appointment: {}", id);

    let appointment = state
        .transitions
        .update_meeting_link(&id, &payload.meeting_link, payload.schedule)
        .await?;
    Ok(Json(AppointmentResponse { appointment }))
}

pub async fn broadcast_meeting_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BroadcastMeetingRequest>,
) -> ApiResult<GroupOutcome> {
    info!("Broadcasting meeting to {} appointments", payload.ids.len());

    let outcome = state
        .transitions
        .broadcast_meeting_link(&payload.ids, &payload.meeting_link, payload.schedule)
        .await?;
    Ok(Json(outcome))
}

pub async fn approve_group_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ApproveGroupRequest>,
) -> ApiResult<GroupOutcome> {
    info!("Approving group of {} appointments", payload.ids.len());

    let outcome = state
        .transitions
        .approve_group(&payload.ids, payload.details)
        .await?;
    Ok(Json(outcome))
}

pub async fn reject_group_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RejectGroupRequest>,
) -> ApiResult<GroupOutcome> {
    info!("Rejecting group of {} appointments", payload.ids.len());

    let outcome = state
        .transitions
        .reject_group(&payload.ids, &payload.reason)
        .await?;
    Ok(Json(outcome))
}

/// Pending requests grouped by course, date and time
pub async fn clusters_handler(State(state): State<Arc<AppState>>) -> ApiResult<ClustersResponse> {
    let clusters = state.transitions.clusters().await?;
    let total = clusters.len();

    Ok(Json(ClustersResponse { clusters, total }))
}

pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> ApiResult<NotificationsListResponse> {
    let notifications = state.inbox.list_for_user(&user_id).await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(NotificationsListResponse {
        notifications,
        unread,
    }))
}

pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> ApiResult<MarkAllReadResponse> {
    let updated = state.inbox.mark_all_read(&user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NotificationId>,
) -> ApiResult<NotificationResponse> {
    let notification = state.inbox.mark_read(&id).await?;
    Ok(Json(NotificationResponse { notification }))
}

pub async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    state.inbox.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upsert_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<UserId>,
    Json(payload): Json<UserProfileRequest>,
) -> ApiResult<UserProfile> {
    if payload.name.trim().is_empty() {
        return Err(Error::validation("name is required").into());
    }

    let profile = UserProfile::new(id, payload.name.trim(), payload.email.as_deref());
    state.directory.upsert_user(&profile).await?;

    info!("Stored directory entry for user: {}", profile.id);
    Ok(Json(profile))
}

pub async fn upsert_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CourseId>,
    Json(payload): Json<CourseRequest>,
) -> ApiResult<CourseSummary> {
    if payload.title.trim().is_empty() {
        return Err(Error::validation("title is required").into());
    }

    let course = CourseSummary {
        id,
        title: payload.title.trim().to_string(),
    };
    state.directory.upsert_course(&course).await?;

    info!("Stored directory entry for course: {}", course.id);
    Ok(Json(course))
}

//! Appointment Service
//!
//! Owns the appointment lifecycle of ClassBook: students book sessions,
//! trainers approve, reject and complete them, and students are notified
//! in-app and by email. Status changes are applied with a per-record
//! compare-and-swap; notifications are delivered by a background worker.

pub mod change_feed;
pub mod clustering;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod email;
pub mod handlers;
pub mod inbox;
pub mod memory;
pub mod models;
pub mod reconciler;
pub mod storage;
pub mod store;
pub mod templates;
pub mod transitions;
pub mod worker;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use classbook_common::AppointmentEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use change_feed::ChangeFeed;
pub use config::{Config, StorageBackend};
pub use directory::Directory;
pub use dispatcher::NotificationDispatcher;
pub use email::{EmailMessage, EmailSender, HttpEmailSender, LogEmailSender};
pub use handlers::AppState;
pub use inbox::NotificationRepository;
pub use memory::MemoryStorage;
pub use reconciler::Reconciler;
pub use storage::{AppointmentRepository, RedisStorage};
pub use store::AppointmentStore;
pub use transitions::TransitionService;
pub use worker::NotificationWorker;

/// The three storage concerns, usually served by one backend
#[derive(Clone)]
pub struct Backend {
    pub appointments: Arc<dyn AppointmentRepository>,
    pub inbox: Arc<dyn NotificationRepository>,
    pub directory: Arc<dyn Directory>,
}

impl Backend {
    pub fn memory() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            appointments: storage.clone(),
            inbox: storage.clone(),
            directory: storage,
        }
    }

    pub async fn redis(redis_url: &str) -> anyhow::Result<Self> {
        let storage = Arc::new(RedisStorage::new(redis_url).await?);
        Ok(Self {
            appointments: storage.clone(),
            inbox: storage.clone(),
            directory: storage,
        })
    }
}

/// Wire the services together.
///
/// The worker must be run with the returned receiver for notifications to
/// be delivered.
pub fn assemble(
    backend: Backend,
    email: Arc<dyn EmailSender>,
) -> (
    AppState,
    NotificationWorker,
    mpsc::UnboundedReceiver<AppointmentEvent>,
) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let store = Arc::new(AppointmentStore::new(
        backend.appointments,
        Arc::new(ChangeFeed::new()),
    ));
    let transitions = Arc::new(TransitionService::new(Arc::clone(&store), events_tx));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&backend.inbox),
        Arc::clone(&backend.directory),
        email,
    ));

    let state = AppState {
        store,
        transitions,
        inbox: backend.inbox,
        directory: backend.directory,
    };

    (state, NotificationWorker::new(dispatcher), events_rx)
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/stats", get(handlers::stats_handler))
        .route(
            "/api/users/{user_id}/stats",
            get(handlers::user_stats_handler),
        )
        .route("/api/changes", get(handlers::changes_handler))
        .route(
            "/api/appointments",
            post(handlers::submit_appointment_handler).get(handlers::list_appointments_handler),
        )
        .route(
            "/api/appointments/approve-group",
            post(handlers::approve_group_handler),
        )
        .route(
            "/api/appointments/reject-group",
            post(handlers::reject_group_handler),
        )
        .route(
            "/api/appointments/meeting-broadcast",
            post(handlers::broadcast_meeting_handler),
        )
        .route(
            "/api/appointments/{id}",
            get(handlers::get_appointment_handler),
        )
        .route(
            "/api/appointments/{id}/approve",
            post(handlers::approve_appointment_handler),
        )
        .route(
            "/api/appointments/{id}/reject",
            post(handlers::reject_appointment_handler),
        )
        .route(
            "/api/appointments/{id}/complete",
            post(handlers::complete_appointment_handler),
        )
        .route(
            "/api/appointments/{id}/meeting-link",
            put(handlers::update_meeting_link_handler),
        )
        .route("/api/clusters", get(handlers::clusters_handler))
        .route(
            "/api/users/{user_id}/notifications",
            get(handlers::list_notifications_handler),
        )
        .route(
            "/api/users/{user_id}/notifications/read-all",
            post(handlers::mark_all_read_handler),
        )
        .route(
            "/api/notifications/{id}/read",
            patch(handlers::mark_read_handler),
        )
        .route(
            "/api/notifications/{id}",
            delete(handlers::delete_notification_handler),
        )
        .route(
            "/api/directory/users/{id}",
            put(handlers::upsert_user_handler),
        )
        .route(
            "/api/directory/courses/{id}",
            put(handlers::upsert_course_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

use thiserror::Error;

use crate::appointment::{Action, AppointmentStatus};

#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {action} appointment {id} while it is {status}")]
    InvalidTransition {
        id: String,
        status: AppointmentStatus,
        action: Action,
    },

    #[error("Appointment {id} was changed by another request, reload and retry")]
    Conflict { id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

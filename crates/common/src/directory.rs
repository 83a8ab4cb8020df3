//! User and course records needed to address and render notifications

use serde::{Deserialize, Serialize};

use crate::ids::{CourseId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserProfile {
    pub fn new(id: UserId, name: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.and_then(normalize_email),
        }
    }

    /// Same profile with its email normalised
    pub fn normalized(mut self) -> Self {
        self.email = self.email.as_deref().and_then(normalize_email);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
}

/// Trim and lowercase; blank addresses become `None`
pub fn normalize_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

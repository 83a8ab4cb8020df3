//! Lookup of student and course details for notification templates
//!
//! Data model (Redis):
//! - directory:user:{id} → JSON `UserProfile`
//! - directory:course:{id} → JSON `CourseSummary`

use async_trait::async_trait;
use classbook_common::{CourseId, CourseSummary, Result, UserId, UserProfile};
use redis::AsyncCommands;

use crate::storage::RedisStorage;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn user(&self, id: &UserId) -> Result<Option<UserProfile>>;

    async fn course(&self, id: &CourseId) -> Result<Option<CourseSummary>>;

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()>;

    async fn upsert_course(&self, course: &CourseSummary) -> Result<()>;
}

#[async_trait]
impl Directory for RedisStorage {
    async fn user(&self, id: &UserId) -> Result<Option<UserProfile>> {
        let mut conn = self.connection();
        let json: Option<String> = conn.get(format!("directory:user:{}", id)).await?;
        Ok(json.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    async fn course(&self, id: &CourseId) -> Result<Option<CourseSummary>> {
        let mut conn = self.connection();
        let json: Option<String> = conn.get(format!("directory:course:{}", id)).await?;
        Ok(json.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        let mut conn = self.connection();
        let _: () = conn.set(format!("directory:user:{}", profile.id), json).await?;
        Ok(())
    }

    async fn upsert_course(&self, course: &CourseSummary) -> Result<()> {
        let json = serde_json::to_string(course)?;
        let mut conn = self.connection();
        let _: () = conn.set(format!("directory:course:{}", course.id), json).await?;
        Ok(())
    }
}

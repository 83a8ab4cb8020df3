//! In-app notification inbox
//!
//! Data model (Redis):
//! - notification:{id} → JSON document
//! - notifications:user:{user_id} → Set of notification ids

use async_trait::async_trait;
use classbook_common::{Error, Notification, NotificationId, Result, UserId};
use redis::AsyncCommands;
use tracing::debug;

use crate::storage::RedisStorage;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<()>;

    /// Newest first
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification>;

    /// Returns how many notifications changed
    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize>;

    async fn delete(&self, id: &NotificationId) -> Result<()>;

    async fn unread_count(&self, user_id: &UserId) -> Result<usize> {
        let notifications = self.list_for_user(user_id).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }
}

fn notification_key(id: &NotificationId) -> String {
    format!("notification:{}", id)
}

fn user_key(user_id: &UserId) -> String {
    format!("notifications:user:{}", user_id)
}

impl RedisStorage {
    async fn get_notification(&self, id: &NotificationId) -> Result<Notification> {
        let mut conn = self.connection();
        let json: Option<String> = conn.get(notification_key(id)).await?;

        match json {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(Error::not_found("notification", id)),
        }
    }

    async fn put_notification(&self, notification: &Notification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        let mut conn = self.connection();
        let _: () = conn.set(notification_key(&notification.id), json).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for RedisStorage {
    async fn create(&self, notification: &Notification) -> Result<()> {
        self.put_notification(notification).await?;

        let mut conn = self.connection();
        let _: () = conn
            .sadd(user_key(&notification.user_id), notification.id.as_str())
            .await?;

        debug!(
            "Created notification: {} for user: {}",
            notification.id, notification.user_id
        );
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>> {
        let mut conn = self.connection();
        let ids: Vec<String> = conn.smembers(user_key(user_id)).await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| notification_key(&NotificationId::new(id.as_str())))
            .collect();
        let documents: Vec<Option<String>> = conn.mget(&keys).await?;

        let mut notifications = documents
            .into_iter()
            .flatten()
            .map(|data| serde_json::from_str::<Notification>(&data))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(notifications)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification> {
        let mut notification = self.get_notification(id).await?;
        if !notification.read {
            notification.read = true;
            self.put_notification(&notification).await?;
        }
        Ok(notification)
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize> {
        let mut changed = 0;
        for mut notification in self.list_for_user(user_id).await? {
            if !notification.read {
                notification.read = true;
                self.put_notification(&notification).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: &NotificationId) -> Result<()> {
        let notification = self.get_notification(id).await?;

        let mut conn = self.connection();
        let _: () = conn.del(notification_key(id)).await?;
        let _: () = conn
            .srem(user_key(&notification.user_id), id.as_str())
            .await?;

        debug!("Deleted notification: {}", id);
        Ok(())
    }
}

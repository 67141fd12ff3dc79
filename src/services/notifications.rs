use crate::{
    entities::{notification, notification_preference, Notification, NotificationPreference},
    errors::ServiceError,
    events::{Event, EventSender},
    pagination::{PageParams, Paginated},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Notification feed and per-customer preference flags. Queueing respects the
/// preference flags; delivery to the push provider happens out of band.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Which preference flag gates a queued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderUpdate,
    Promotion,
    Reminder,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePreferencesInput {
    pub push_enabled: Option<bool>,
    pub order_updates: Option<bool>,
    pub promotions: Option<bool>,
    pub reminders: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceInput {
    #[validate(length(min = 1, max = 512))]
    pub device_token: String,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Queues a notification into the customer's feed, respecting their
    /// preference flags. Suppressed notifications are dropped silently.
    #[instrument(skip(self, title, body))]
    pub async fn queue(
        &self,
        customer_id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Result<Option<notification::Model>, ServiceError> {
        let prefs = self.get_preferences(customer_id).await?;

        let allowed = prefs.push_enabled
            && match kind {
                NotificationKind::OrderUpdate => prefs.order_updates,
                NotificationKind::Promotion => prefs.promotions,
                NotificationKind::Reminder => prefs.reminders,
            };
        if !allowed {
            debug!(customer_id = %customer_id, kind = ?kind, "Notification suppressed by preferences");
            return Ok(None);
        }

        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            title: Set(title),
            body: Set(body),
            read: Set(false),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::NotificationQueued {
                customer_id,
                notification_id: created.id,
            })
            .await;

        Ok(Some(created))
    }

    /// Lists a customer's notifications, newest first.
    #[instrument(skip(self))]
    pub async fn list_notifications(
        &self,
        customer_id: Uuid,
        page: PageParams,
    ) -> Result<Paginated<notification::Model>, ServiceError> {
        let paginator = Notification::find()
            .filter(notification::Column::CustomerId.eq(customer_id))
            .order_by_desc(notification::Column::CreatedAt)
            .paginate(&*self.db, page.per_page);

        let total = paginator.num_items().await?;
        let notifications = paginator.fetch_page(page.zero_based()).await?;

        Ok(Paginated::new(notifications, total, page))
    }

    /// Marks a notification as read. Already-read notifications are left
    /// alone.
    #[instrument(skip(self))]
    pub async fn mark_read(
        &self,
        customer_id: Uuid,
        notification_id: Uuid,
    ) -> Result<notification::Model, ServiceError> {
        let notification = Notification::find_by_id(notification_id)
            .one(&*self.db)
            .await?
            .filter(|n| n.customer_id == customer_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        if notification.read {
            return Ok(notification);
        }

        let mut active: notification::ActiveModel = notification.into();
        active.read = Set(true);
        Ok(active.update(&*self.db).await?)
    }

    /// Count of unread notifications, for the badge.
    pub async fn unread_count(&self, customer_id: Uuid) -> Result<u64, ServiceError> {
        Ok(Notification::find()
            .filter(notification::Column::CustomerId.eq(customer_id))
            .filter(notification::Column::Read.eq(false))
            .count(&*self.db)
            .await?)
    }

    /// Retrieves a customer's notification preferences, defaulting to
    /// everything enabled for customers who have never touched them.
    #[instrument(skip(self))]
    pub async fn get_preferences(
        &self,
        customer_id: Uuid,
    ) -> Result<notification_preference::Model, ServiceError> {
        match NotificationPreference::find_by_id(customer_id)
            .one(&*self.db)
            .await?
        {
            Some(prefs) => Ok(prefs),
            None => Ok(notification_preference::Model {
                customer_id,
                push_enabled: true,
                order_updates: true,
                promotions: true,
                reminders: true,
                device_token: None,
                updated_at: Utc::now(),
            }),
        }
    }

    /// Updates preference flags, creating the row on first write. Absent
    /// fields keep their current value.
    #[instrument(skip(self, input))]
    pub async fn update_preferences(
        &self,
        customer_id: Uuid,
        input: UpdatePreferencesInput,
    ) -> Result<notification_preference::Model, ServiceError> {
        input.validate()?;

        let current = self.get_preferences(customer_id).await?;
        let exists = NotificationPreference::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .is_some();

        let model = notification_preference::ActiveModel {
            customer_id: Set(customer_id),
            push_enabled: Set(input.push_enabled.unwrap_or(current.push_enabled)),
            order_updates: Set(input.order_updates.unwrap_or(current.order_updates)),
            promotions: Set(input.promotions.unwrap_or(current.promotions)),
            reminders: Set(input.reminders.unwrap_or(current.reminders)),
            device_token: Set(current.device_token),
            updated_at: Set(Utc::now()),
        };

        let saved = if exists {
            model.update(&*self.db).await?
        } else {
            model.insert(&*self.db).await?
        };

        info!(customer_id = %customer_id, "Notification preferences updated");
        Ok(saved)
    }

    /// Registers the device push token, creating the preference row with
    /// defaults if the customer has none yet.
    #[instrument(skip(self, input))]
    pub async fn register_device(
        &self,
        customer_id: Uuid,
        input: RegisterDeviceInput,
    ) -> Result<notification_preference::Model, ServiceError> {
        input.validate()?;

        let current = self.get_preferences(customer_id).await?;
        let exists = NotificationPreference::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .is_some();

        let model = notification_preference::ActiveModel {
            customer_id: Set(customer_id),
            push_enabled: Set(current.push_enabled),
            order_updates: Set(current.order_updates),
            promotions: Set(current.promotions),
            reminders: Set(current.reminders),
            device_token: Set(Some(input.device_token)),
            updated_at: Set(Utc::now()),
        };

        let saved = if exists {
            model.update(&*self.db).await?
        } else {
            model.insert(&*self.db).await?
        };

        info!(customer_id = %customer_id, "Device token registered");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_token_must_not_be_empty() {
        let input = RegisterDeviceInput {
            device_token: String::new(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn partial_preference_update_deserializes() {
        let input: UpdatePreferencesInput =
            serde_json::from_str(r#"{"promotions": false}"#).expect("deserializes");
        assert_eq!(input.promotions, Some(false));
        assert!(input.push_enabled.is_none());
    }
}

//! Notification inbox value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub custom_data: HashMap<String, String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationInboxStatus {
    pub notifications: Vec<Notification>,
    pub badge_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_status_from_json() {
        let raw = r#"{
            "notifications": [
                {"id": "n1", "title": "Hi", "body": "Welcome", "custom_data": {}, "received_at": "2024-01-01T00:00:00Z"}
            ],
            "badge_count": 3
        }"#;

        let status: NotificationInboxStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(status.badge_count, 3);
        assert_eq!(status.notifications.len(), 1);
        assert_eq!(status.notifications[0].id, "n1");
    }
}

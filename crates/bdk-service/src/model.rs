//! Signal payloads.

use serde::{Deserialize, Serialize};

/// Fields a caller sets when creating or updating a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Search query, e.g. `HASHTAG:hash AND CASHTAG:cash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_on_profile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_wide: Option<bool>,
}

/// A stored signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub visible_on_profile: Option<bool>,
    #[serde(default)]
    pub company_wide: Option<bool>,
    /// Creation time, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A user subscribed to a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscriber {
    pub user_id: i64,
    #[serde(default)]
    pub subscriber_name: Option<String>,
    #[serde(default)]
    pub pushed: Option<bool>,
    #[serde(default)]
    pub owner: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// One page of subscribers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscriberResponse {
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub data: Vec<ChannelSubscriber>,
}

/// Per-user failure of a bulk (un)subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscriptionError {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a bulk (un)subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSubscriptionResponse {
    pub requested_subscription: u32,
    pub successful_subscription: u32,
    pub failed_subscription: u32,
    #[serde(default)]
    pub subscription_errors: Vec<ChannelSubscriptionError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal() {
        let signal: Signal = serde_json::from_str(
            r#"{
                "name": "my signal",
                "query": "HASHTAG:hashtag AND CASHTAG:cash",
                "visibleOnProfile": true,
                "companyWide": false,
                "id": "5a8daa0bb9d82100011d5095",
                "timestamp": 1519233547982
            }"#,
        )
        .unwrap();

        assert_eq!(signal.id, "5a8daa0bb9d82100011d5095");
        assert_eq!(signal.visible_on_profile, Some(true));
        assert_eq!(signal.company_wide, Some(false));
        assert_eq!(signal.timestamp, Some(1_519_233_547_982));
    }

    #[test]
    fn test_empty_base_signal_serializes_to_empty_object() {
        let json = serde_json::to_string(&BaseSignal::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_subscriber_page() {
        let page: ChannelSubscriberResponse = serde_json::from_str(
            r#"{
                "offset": 0,
                "hasMore": true,
                "total": 150,
                "data": [
                    {
                        "pushed": false,
                        "owner": true,
                        "subscriberName": "John Doe 01",
                        "userId": 68719476742,
                        "timestamp": 1519231972000
                    }
                ]
            }"#,
        )
        .unwrap();

        assert!(page.has_more);
        assert_eq!(page.total, 150);
        assert_eq!(page.data[0].user_id, 68_719_476_742);
        assert_eq!(page.data[0].subscriber_name.as_deref(), Some("John Doe 01"));
    }
}

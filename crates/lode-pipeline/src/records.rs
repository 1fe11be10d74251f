//! Serde shapes of the producer files loaded into bronze.
//!
//! These mirror the raw file formats exactly; normalization happens later,
//! in the silver cleaners, never at parse time.

use serde::{Deserialize, Serialize};

/// One line of the events CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique business key.
    pub event_id: i64,
    /// User who triggered the event.
    pub user_id: String,
    /// Event type as produced, any casing.
    pub event_type: String,
    /// Product involved, when any.
    pub product_id: Option<String>,
    /// Event time as an ISO-8601 string.
    pub timestamp: String,
}

/// One element of the sessions JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSession {
    /// Unique business key.
    pub session_id: String,
    /// User who owned the session.
    pub user_id: String,
    /// Session start as an ISO-8601 string.
    pub start_time: String,
    /// Session end as an ISO-8601 string.
    pub end_time: String,
    /// Browser and operating system.
    pub device: Device,
    /// Country and city.
    pub location: Location,
    /// Events that happened within the session, in timestamp order.
    pub events: Vec<SessionEvent>,
}

/// Device block nested in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Browser name.
    pub browser: String,
    /// Operating system name.
    pub os: String,
}

/// Location block nested in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Country name.
    pub country: String,
    /// City name.
    pub city: String,
}

/// One nested event inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Event type; the field is named `type` in the files.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Product involved, when any.
    pub product_id: Option<String>,
    /// Event time as an ISO-8601 string.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_csv_line_parses() {
        let data = "event_id,user_id,event_type,product_id,timestamp\n\
                    7,user_3,View_Product,PROD_004,2026-08-20T10:15:00\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<RawEvent> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_id, 7);
        assert_eq!(rows[0].event_type, "View_Product");
        assert_eq!(rows[0].product_id.as_deref(), Some("PROD_004"));
    }

    #[test]
    fn session_json_uses_the_type_field_name() {
        let data = r#"{
            "session_id": "sess_1",
            "user_id": "user_2",
            "start_time": "2026-08-20T09:00:00",
            "end_time": "2026-08-20T09:30:00",
            "device": {"browser": "Firefox", "os": "Linux"},
            "location": {"country": "Norway", "city": "Bergen"},
            "events": [
                {"type": "view_product", "product_id": "PROD_001", "timestamp": "2026-08-20T09:05:00"}
            ]
        }"#;
        let session: RawSession = serde_json::from_str(data).unwrap();
        assert_eq!(session.events[0].event_type, "view_product");
        assert_eq!(session.device.os, "Linux");

        let back = serde_json::to_value(&session).unwrap();
        assert!(back["events"][0].get("type").is_some());
        assert!(back["events"][0].get("event_type").is_none());
    }
}

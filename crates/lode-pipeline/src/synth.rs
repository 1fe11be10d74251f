//! Synthetic producer files.
//!
//! Generates raw events and sessions shaped exactly like real producer
//! output, with timestamps spread over a recent window. Seeded runs are
//! reproducible, which makes the generator double as a test fixture
//! source.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::records::{Device, Location, RawEvent, RawSession, SessionEvent};
use crate::tables::{ADD_TO_CART, PURCHASE, REMOVE_FROM_CART, VIEW_PRODUCT};

const EVENT_TYPES: [&str; 4] = [VIEW_PRODUCT, ADD_TO_CART, REMOVE_FROM_CART, PURCHASE];
const BROWSERS: [&str; 4] = ["Chrome", "Firefox", "Safari", "Edge"];
const OPERATING_SYSTEMS: [&str; 5] = ["Windows", "macOS", "Linux", "iOS", "Android"];
const CITIES: [&str; 4] = ["Oslo", "Bergen", "Stavanger", "Trondheim"];

fn format_ts(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Seedable generator of raw producer records.
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    /// Seeded generator for reproducible output; `None` seeds from the OS.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.random_range(0..options.len())]
    }

    fn product(&mut self) -> String {
        format!("PROD_{:03}", self.rng.random_range(1..=10))
    }

    fn user(&mut self, users: u32) -> String {
        format!("user_{}", self.rng.random_range(1..=users.max(1)))
    }

    /// Raw events with ids `1..=count` and timestamps in the recent past.
    pub fn events(&mut self, count: u32, users: u32) -> Vec<RawEvent> {
        let now = Utc::now();
        (1..=count)
            .map(|id| {
                let minutes = self.rng.random_range(0..5_000);
                RawEvent {
                    event_id: i64::from(id),
                    user_id: self.user(users),
                    event_type: self.pick(&EVENT_TYPES).to_string(),
                    product_id: Some(self.product()),
                    timestamp: format_ts(now - Duration::minutes(minutes)),
                }
            })
            .collect()
    }

    /// Raw sessions, each with 2 to 6 nested events sorted by time and
    /// `end_time` equal to the last event's timestamp.
    pub fn sessions(&mut self, count: u32, users: u32) -> Vec<RawSession> {
        let now = Utc::now();
        (1..=count)
            .map(|n| {
                let start = now - Duration::hours(self.rng.random_range(5..100));
                let event_count = self.rng.random_range(2..=6);
                let mut events: Vec<SessionEvent> = (0..event_count)
                    .map(|_| SessionEvent {
                        event_type: self.pick(&EVENT_TYPES).to_string(),
                        product_id: Some(self.product()),
                        timestamp: format_ts(
                            start + Duration::minutes(self.rng.random_range(1..=60)),
                        ),
                    })
                    .collect();
                // Fixed-width format, so string order is time order.
                events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
                let end_time = events
                    .last()
                    .map_or_else(|| format_ts(start), |e| e.timestamp.clone());
                RawSession {
                    session_id: format!("sess_{n}"),
                    user_id: self.user(users),
                    start_time: format_ts(start),
                    end_time,
                    device: Device {
                        browser: self.pick(&BROWSERS).to_string(),
                        os: self.pick(&OPERATING_SYSTEMS).to_string(),
                    },
                    location: Location {
                        country: "Norway".to_string(),
                        city: self.pick(&CITIES).to_string(),
                    },
                    events,
                }
            })
            .collect()
    }
}

/// Writes events as CSV with the producer header.
///
/// # Errors
///
/// [`Error::SourceFile`] when the file cannot be written.
pub async fn write_events_csv(path: &Path, events: &[RawEvent]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for event in events {
        writer
            .serialize(event)
            .map_err(|e| Error::source_file(path, e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::source_file(path, e.to_string()))?;
    write_file(path, &bytes).await
}

/// Writes sessions as a pretty-printed JSON array.
///
/// # Errors
///
/// [`Error::SourceFile`] when the file cannot be written.
pub async fn write_sessions_json(path: &Path, sessions: &[RawSession]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(sessions)
        .map_err(|e| Error::source_file(path, e.to_string()))?;
    write_file(path, &bytes).await
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::source_file(path, e.to_string()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Error::source_file(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_core::parse_timestamp;

    #[test]
    fn seeded_runs_are_reproducible() {
        let events_a = Generator::new(Some(42)).events(20, 5);
        let events_b = Generator::new(Some(42)).events(20, 5);
        assert_eq!(events_a, events_b);

        let sessions_a = Generator::new(Some(42)).sessions(5, 5);
        let sessions_b = Generator::new(Some(42)).sessions(5, 5);
        assert_eq!(sessions_a, sessions_b);
    }

    #[test]
    fn events_stay_within_the_producer_vocabulary() {
        let events = Generator::new(Some(7)).events(50, 10);
        assert_eq!(events.len(), 50);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.event_id, i as i64 + 1);
            assert!(event.user_id.starts_with("user_"));
            assert!(EVENT_TYPES.contains(&event.event_type.as_str()));
            assert!(event.product_id.as_deref().unwrap().starts_with("PROD_0"));
            assert!(parse_timestamp(&event.timestamp).is_some());
        }
    }

    #[test]
    fn session_events_are_sorted_and_bound_the_end_time() {
        let sessions = Generator::new(Some(9)).sessions(10, 4);
        for session in &sessions {
            assert!((2..=6).contains(&session.events.len()));
            let mut sorted = session.events.clone();
            sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            assert_eq!(session.events, sorted);
            assert_eq!(
                session.end_time,
                session.events.last().unwrap().timestamp
            );
            let start = parse_timestamp(&session.start_time).unwrap();
            let end = parse_timestamp(&session.end_time).unwrap();
            assert!(end > start);
        }
    }

    #[tokio::test]
    async fn written_csv_reads_back_as_the_same_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("events.csv");
        let events = Generator::new(Some(3)).events(10, 3);

        write_events_csv(&path, &events).await.unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<RawEvent> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, events);
    }

    #[tokio::test]
    async fn written_json_reads_back_as_the_same_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("sessions.json");
        let sessions = Generator::new(Some(3)).sessions(4, 3);

        write_sessions_json(&path, &sessions).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let back: Vec<RawSession> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sessions);
    }
}

//! JSONL rendering of tracing events.
//!
//! One object per line: `timestamp`, `level`, `service`, `target`, `message`
//! and, when present, a flat `fields` map. Fields whose names mark them as
//! credentials are written as `"[redacted]"` so a token logged by mistake
//! never reaches the file.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const REDACTED: &str = "[redacted]";

/// Field names that are never written verbatim.
const SECRET_FIELDS: [&str; 6] = [
    "access_token",
    "refresh_token",
    "session_token",
    "password",
    "authorization",
    "bearer",
];

fn is_secret(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SECRET_FIELDS.iter().any(|secret| name == *secret) || name.ends_with("_token")
}

/// A single structured log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub service: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

#[derive(Default)]
struct EntryFields {
    message: String,
    fields: Map<String, Value>,
}

impl EntryFields {
    fn put(&mut self, field: &Field, value: Value) {
        let name = field.name();
        let value = if is_secret(name) {
            Value::String(REDACTED.to_string())
        } else {
            value
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for EntryFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.put(field, Value::String(rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.put(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }
}

/// Layer writing each event as one JSON line.
pub struct JsonLayer<W> {
    service: String,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service: String, make_writer: W) -> Self {
        Self {
            service,
            make_writer,
        }
    }

    fn entry(&self, event: &Event<'_>) -> LogEntry {
        let mut recorded = EntryFields::default();
        event.record(&mut recorded);
        let metadata = event.metadata();

        LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: metadata.level().to_string(),
            service: self.service.clone(),
            target: metadata.target().to_string(),
            message: recorded.message,
            fields: recorded.fields,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Ok(line) = serde_json::to_string(&self.entry(event)) else {
            return;
        };
        let mut writer = self.make_writer.make_writer();
        // Logging must never fail the caller.
        let _ = writeln!(writer, "{}", line);
    }
}

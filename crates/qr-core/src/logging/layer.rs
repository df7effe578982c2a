//! Custom tracing layer for JSONL output.
//!
//! Writes one JSON object per event to stderr. Correlation fields
//! (`run_id`, `host_id`, `stage`) are lifted to the top level whether they
//! were recorded on the event itself or on an enclosing span.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

const CORRELATION_KEYS: [&str; 3] = ["run_id", "host_id", "stage"];

/// Correlation data stored on spans.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
}

impl SpanContext {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "run_id" => self.run_id = Some(value),
            "host_id" => self.host_id = Some(value),
            "stage" => self.stage = Some(value),
            _ => {}
        }
    }
}

/// Extracts event fields into a JSON map.
struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
    correlation: SpanContext,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            fields: serde_json::Map::new(),
            message: None,
            correlation: SpanContext::default(),
        }
    }

    fn record_string(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
        } else if CORRELATION_KEYS.contains(&name) {
            self.correlation.set(name, value);
        } else {
            self.fields
                .insert(name.to_string(), serde_json::Value::String(value));
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_string(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_string(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

struct SpanContextVisitor {
    context: SpanContext,
}

impl Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.context.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.context.set(field.name(), format!("{:?}", value));
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor {
            context: SpanContext::default(),
        };
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);
        let mut correlation = visitor.correlation;

        // Event fields win; spans fill the gaps, innermost first.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if correlation.run_id.is_none() {
                        correlation.run_id.clone_from(&span_ctx.run_id);
                    }
                    if correlation.host_id.is_none() {
                        correlation.host_id.clone_from(&span_ctx.host_id);
                    }
                    if correlation.stage.is_none() {
                        correlation.stage.clone_from(&span_ctx.stage);
                    }
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );
        if let Some(id) = correlation.run_id {
            obj.insert("run_id".to_string(), serde_json::json!(id));
        }
        if let Some(id) = correlation.host_id {
            obj.insert("host_id".to_string(), serde_json::json!(id));
        }
        if let Some(s) = correlation.stage {
            obj.insert("stage".to_string(), serde_json::json!(s));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> serde_json::Value {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        let output = buffer.lock().unwrap();
        let line = String::from_utf8_lossy(&output);
        serde_json::from_str(line.trim()).expect("valid json line")
    }

    #[test]
    fn layer_writes_level_target_and_message() {
        let v = capture(|| {
            tracing::warn!(target: "fetch.source_failed", message = "usgs timed out");
        });
        assert_eq!(v["level"], "warn");
        assert_eq!(v["event"], "fetch.source_failed");
        assert_eq!(v["message"], "usgs timed out");
        assert!(v["ts"].is_string());
    }

    #[test]
    fn correlation_fields_are_lifted() {
        let v = capture(|| {
            tracing::info!(target: "dedup.finished", run_id = "run-1", stage = "dedup", kept = 7u64, message = "done");
        });
        assert_eq!(v["run_id"], "run-1");
        assert_eq!(v["stage"], "dedup");
        assert_eq!(v["fields"]["kept"], 7);
        assert!(v["fields"].get("run_id").is_none());
    }

    #[test]
    fn span_context_fills_missing_correlation() {
        let v = capture(|| {
            let span = tracing::info_span!("analysis", run_id = "run-span", host_id = "host-1");
            let _enter = span.enter();
            tracing::info!(target: "predict.finished", stage = "predict", message = "ok");
        });
        assert_eq!(v["run_id"], "run-span");
        assert_eq!(v["host_id"], "host-1");
        assert_eq!(v["stage"], "predict");
    }
}

//! Payload parsers: GeoJSON and RSS into [`RawRecord`]s.

use quick_xml::events::Event;
use quick_xml::Reader;
use qr_config::PayloadFormat;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::normalize::RawRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{source_name}: invalid JSON: {message}")]
    Json { source_name: String, message: String },

    #[error("{source_name}: invalid XML: {message}")]
    Xml { source_name: String, message: String },

    #[error("{source_name}: unexpected payload shape: {message}")]
    Shape { source_name: String, message: String },
}

impl ParseError {
    pub fn source_name(&self) -> &str {
        match self {
            ParseError::Json { source_name, .. }
            | ParseError::Xml { source_name, .. }
            | ParseError::Shape { source_name, .. } => source_name,
        }
    }
}

impl From<ParseError> for qr_common::Error {
    fn from(err: ParseError) -> Self {
        qr_common::Error::PayloadParse {
            source_name: err.source_name().to_string(),
            message: err.to_string(),
        }
    }
}

/// Turns one payload into raw records. Record-level problems are left to
/// the normalizer; only an unreadable payload is an error.
pub trait Parser: Send + Sync {
    fn parse(&self, payload: &str, source_name: &str) -> Result<Vec<RawRecord>, ParseError>;
}

/// GeoJSON `FeatureCollection`. Also used for GeoNet, whose features differ
/// only in property names.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonParser;

impl Parser for GeoJsonParser {
    fn parse(&self, payload: &str, source_name: &str) -> Result<Vec<RawRecord>, ParseError> {
        let root: Value = serde_json::from_str(payload).map_err(|e| ParseError::Json {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::Shape {
                source_name: source_name.to_string(),
                message: "missing features array".to_string(),
            })?;

        Ok(features
            .iter()
            .map(|feature| {
                let properties = feature
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let coordinates = feature
                    .pointer("/geometry/coordinates")
                    .and_then(Value::as_array)
                    .map(|c| c.iter().filter_map(Value::as_f64).collect::<Vec<f64>>())
                    .filter(|c| c.len() >= 2);
                RawRecord {
                    source: source_name.to_string(),
                    properties,
                    coordinates,
                }
            })
            .collect())
    }
}

/// RSS 2.0 `<item>` elements. Each child element becomes a string property
/// keyed by its local name, so `geo:lat` lands under `lat`. `geo:long` is
/// stored as `lon`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RssParser;

impl Parser for RssParser {
    fn parse(&self, payload: &str, source_name: &str) -> Result<Vec<RawRecord>, ParseError> {
        let xml_err = |message: String| ParseError::Xml {
            source_name: source_name.to_string(),
            message,
        };

        let mut reader = Reader::from_str(payload);
        reader.config_mut().trim_text(true);

        let mut records = Vec::new();
        let mut item: Option<Map<String, Value>> = None;
        let mut field: Option<String> = None;
        let mut text = String::new();
        let mut saw_channel = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = local_name(e.local_name().as_ref());
                    match name.as_str() {
                        "rss" | "channel" | "feed" | "RDF" => saw_channel = true,
                        "item" => item = Some(Map::new()),
                        _ if item.is_some() => {
                            field = Some(name);
                            text.clear();
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(t)) => {
                    if field.is_some() {
                        let s = t.unescape().map_err(|e| xml_err(e.to_string()))?;
                        text.push_str(&s);
                    }
                }
                Ok(Event::CData(c)) => {
                    if field.is_some() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Ok(Event::End(e)) => {
                    let name = local_name(e.local_name().as_ref());
                    if name == "item" {
                        if let Some(properties) = item.take() {
                            records.push(RawRecord {
                                source: source_name.to_string(),
                                properties,
                                coordinates: None,
                            });
                        }
                        field = None;
                    } else if field.as_deref() == Some(name.as_str()) {
                        if let Some(props) = item.as_mut() {
                            let key = if name == "long" { "lon".to_string() } else { name };
                            props
                                .entry(key)
                                .or_insert_with(|| Value::String(text.trim().to_string()));
                        }
                        field = None;
                        text.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(xml_err(e.to_string())),
            }
        }

        if !saw_channel && records.is_empty() {
            return Err(ParseError::Shape {
                source_name: source_name.to_string(),
                message: "no rss channel".to_string(),
            });
        }
        Ok(records)
    }
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parser for a payload format.
pub fn parser_for(format: PayloadFormat) -> &'static dyn Parser {
    match format {
        PayloadFormat::Geojson | PayloadFormat::Geonet => &GeoJsonParser,
        PayloadFormat::Rss => &RssParser,
    }
}

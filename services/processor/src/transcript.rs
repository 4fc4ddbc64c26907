use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

pub const UNKNOWN_SPEAKER_ID: &str = "unknown";
pub const UNKNOWN_SPEAKER_NAME: &str = "Unknown";

fn segment() -> String {
    "segment".to_string()
}

fn unknown_speaker() -> String {
    UNKNOWN_SPEAKER_ID.to_string()
}

/// Strings as-is, numbers and booleans in their JSON spelling, anything else absent.
fn scalar_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(JsonValue::deserialize(deserializer)?).unwrap_or_else(segment))
}

fn lenient_speaker<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(JsonValue::deserialize(deserializer)?)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(unknown_speaker))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(JsonValue::deserialize(deserializer)?).unwrap_or_default())
}

/// Integer, float or numeric string milliseconds; anything else reads as 0.
fn lenient_ts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let millis = match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    Ok(millis.unwrap_or(0))
}

/// One line of a call transcript. Timestamps are milliseconds from call start.
///
/// Field types are read leniently so that any JSON object line yields an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptItem {
    #[serde(rename = "type", default = "segment", deserialize_with = "lenient_kind")]
    pub kind: String,
    #[serde(default = "unknown_speaker", deserialize_with = "lenient_speaker")]
    pub speaker_id: String,
    #[serde(default, alias = "content", deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_ts")]
    pub start_ts: i64,
    #[serde(default, deserialize_with = "lenient_ts")]
    pub stop_ts: i64,
}

impl TranscriptItem {
    /// Item for a line that is valid JSON. Objects map field by field; bare
    /// strings become the text of an unattributed item.
    fn from_json(value: JsonValue, line: &str) -> Self {
        match value {
            JsonValue::Object(_) => {
                serde_json::from_value(value).unwrap_or_else(|_| Self::unattributed(line))
            }
            JsonValue::String(text) => Self::unattributed(&text),
            _ => Self::unattributed(line),
        }
    }

    /// Stand-in for a line that could not be parsed.
    pub fn unattributed(text: &str) -> Self {
        Self {
            kind: segment(),
            speaker_id: UNKNOWN_SPEAKER_ID.to_string(),
            text: text.to_string(),
            start_ts: 0,
            stop_ts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: TranscriptItem,
    pub user: SpeakerRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTranscript {
    Items(Vec<TranscriptItem>),
    /// The body was not valid JSONL; every non-empty line became an
    /// unattributed item.
    Fallback {
        items: Vec<TranscriptItem>,
        error: String,
    },
}

/// Parses a JSONL transcript. A single line that is not JSON switches the
/// whole body to line-by-line fallback records.
pub fn parse_transcript(body: &str) -> ParsedTranscript {
    let lines = body.lines().map(str::trim).filter(|line| !line.is_empty());

    let mut items = Vec::new();
    for (index, line) in lines.clone().enumerate() {
        match serde_json::from_str::<JsonValue>(line) {
            Ok(value) => items.push(TranscriptItem::from_json(value, line)),
            Err(e) => {
                return ParsedTranscript::Fallback {
                    items: lines.map(TranscriptItem::unattributed).collect(),
                    error: format!("line {}: {}", index + 1, e),
                }
            }
        }
    }

    ParsedTranscript::Items(items)
}

/// Distinct speaker ids in order of first appearance.
pub fn speaker_ids(items: &[TranscriptItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.speaker_id.as_str()))
        .map(|item| item.speaker_id.clone())
        .collect()
}

pub fn enrich(items: Vec<TranscriptItem>, names: &HashMap<String, String>) -> Vec<EnrichedItem> {
    items
        .into_iter()
        .map(|item| {
            let name = names
                .get(&item.speaker_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SPEAKER_NAME.to_string());
            EnrichedItem {
                item,
                user: SpeakerRef { name },
            }
        })
        .collect()
}

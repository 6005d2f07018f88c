//! Transcript narrowing and time-window formatting.
//!
//! The transcription tool returns a free-form JSON document. It is narrowed
//! into [`Transcription`] as soon as it is received; everything downstream
//! works on typed units.

use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;

const NO_TEXT: &str = "<NO_TEXT_FIELD>";

/// One aligned unit as emitted by the tool. Timestamps may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedUnit {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
}

/// A unit with both timestamps present.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedUnit {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A narrowed transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub language: String,
    /// Segment-level text in order.
    pub segments: Vec<String>,
    /// Word-level aligned units in order.
    pub units: Vec<AlignedUnit>,
}

#[derive(Deserialize)]
struct RawTranscription {
    language: String,
    segments: Vec<RawSegment>,
    #[serde(default)]
    word_segments: Vec<RawUnit>,
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawUnit {
    start: Option<f64>,
    end: Option<f64>,
    text: Option<String>,
    word: Option<String>,
}

impl Transcription {
    /// Narrows the tool's raw document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ToolError> {
        let raw: RawTranscription = serde_json::from_value(value)
            .map_err(|e| ToolError::invalid_output(format!("transcription document: {e}")))?;
        Ok(Self {
            language: raw.language,
            segments: raw.segments.into_iter().map(|s| s.text).collect(),
            units: raw
                .word_segments
                .into_iter()
                .map(|u| {
                    let text = u
                        .text
                        .filter(|t| !t.is_empty())
                        .or(u.word.filter(|w| !w.is_empty()));
                    // Only units that will be emitted on their own need a placeholder.
                    let fallback = match (u.start, u.end) {
                        (Some(_), Some(_)) => NO_TEXT,
                        _ => "",
                    };
                    AlignedUnit {
                        start: u.start,
                        end: u.end,
                        text: text.unwrap_or_else(|| fallback.to_string()),
                    }
                })
                .collect(),
        })
    }

    /// Segment texts joined by single spaces.
    pub fn full_text(&self) -> String {
        self.segments.join(" ")
    }
}

/// Folds untimestamped units into the preceding timestamped unit.
///
/// Text is joined with a single space. Untimestamped units before the first
/// timestamped one are carried forward and prepended to it; if no unit has
/// timestamps at all, nothing is returned.
pub fn merge_untimestamped(units: &[AlignedUnit]) -> Vec<TimedUnit> {
    let mut merged: Vec<TimedUnit> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for unit in units {
        match (unit.start, unit.end) {
            (Some(start), Some(end)) => {
                let text = if pending.is_empty() {
                    unit.text.clone()
                } else {
                    let mut carried = pending.join(" ");
                    carried.push(' ');
                    carried.push_str(&unit.text);
                    pending.clear();
                    carried.trim().to_string()
                };
                merged.push(TimedUnit { start, end, text });
            }
            _ if unit.text.trim().is_empty() => {}
            _ => match merged.last_mut() {
                Some(prev) => {
                    prev.text = format!("{} {}", prev.text, unit.text).trim().to_string();
                }
                None => pending.push(&unit.text),
            },
        }
    }

    if !pending.is_empty() {
        debug!(
            dropped = pending.len(),
            "No timestamped unit to attach leading fragments to"
        );
    }
    merged
}

/// `{start:.2} --> {end:.2}: {text}`
pub fn format_unit(unit: &TimedUnit) -> String {
    format!("{:.2} --> {:.2}: {}", unit.start, unit.end, unit.text)
}

/// One line per unit, each terminated by a newline.
pub fn format_units(units: &[TimedUnit]) -> String {
    let mut out = String::new();
    for unit in units {
        out.push_str(&format_unit(unit));
        out.push('\n');
    }
    out
}

/// Groups units into consecutive windows of `window` seconds.
///
/// Each window gets a `Chunk {i} ({start} - {end} seconds):` header. Windows
/// with no units still get their header, so boundaries in the output are
/// always contiguous. A unit belongs to the window its start falls in.
/// A zero window is treated as one second.
pub fn chunk_by_window(units: &[TimedUnit], window: u32) -> String {
    let step = u64::from(window.max(1));
    let mut out = String::new();
    let mut index = 0u64;
    let mut window_start = 0u64;
    let mut window_end = step;

    out.push_str(&format!(
        "Chunk {index} ({window_start} - {window_end} seconds):"
    ));
    for unit in units {
        while unit.start >= window_end as f64 {
            index += 1;
            window_start = window_end;
            window_end += step;
            out.push_str(&format!(
                "\n\nChunk {index} ({window_start} - {window_end} seconds):"
            ));
        }
        out.push('\n');
        out.push_str(&format_unit(unit));
    }
    out
}

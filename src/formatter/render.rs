use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::aggregator::Chunk;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Serialization shape for a finished chunk sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Structured record list for machine consumption
    Json,
    /// SubRip subtitle cues, comma millisecond separator
    Srt,
    /// WebVTT subtitle cues, dot millisecond separator
    Vtt,
    /// Chunk texts joined by newlines, no timing
    Txt,
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            "txt" => Ok(OutputFormat::Txt),
            other => Err(FormatError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Txt => "txt",
        };
        f.write_str(name)
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    text: &'a str,
    start_offset_ms: u64,
    end_offset_ms: u64,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    transcriptions: Vec<JsonRecord<'a>>,
    total_chunks: usize,
    format: &'static str,
}

/// Render a finished chunk sequence into the requested shape.
///
/// Pure transform over the aggregator's output; chunks are never mutated.
pub fn render(chunks: &[Chunk], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => render_json(chunks),
        OutputFormat::Srt => render_srt(chunks),
        OutputFormat::Vtt => render_vtt(chunks),
        OutputFormat::Txt => render_txt(chunks),
    }
}

fn render_json(chunks: &[Chunk]) -> String {
    let document = JsonDocument {
        transcriptions: chunks
            .iter()
            .map(|c| JsonRecord {
                text: &c.text,
                start_offset_ms: c.start_offset_ms,
                end_offset_ms: c.end_offset_ms,
            })
            .collect(),
        total_chunks: chunks.len(),
        format: "json",
    };
    // Serialization of a struct of strings and integers cannot fail
    serde_json::to_string_pretty(&document).unwrap_or_default()
}

fn render_srt(chunks: &[Chunk]) -> String {
    let cues: Vec<String> = chunks
        .iter()
        .map(|c| {
            format!(
                "{}\n{} --> {}\n{}\n",
                c.sequence_number,
                ms_to_timestamp(c.start_offset_ms, ','),
                ms_to_timestamp(c.end_offset_ms, ','),
                c.text
            )
        })
        .collect();
    cues.join("\n")
}

fn render_vtt(chunks: &[Chunk]) -> String {
    let mut cues = vec!["WEBVTT\n".to_string()];
    cues.extend(chunks.iter().map(|c| {
        format!(
            "{}\n{} --> {}\n{}\n",
            c.sequence_number,
            ms_to_timestamp(c.start_offset_ms, '.'),
            ms_to_timestamp(c.end_offset_ms, '.'),
            c.text
        )
    }));
    cues.join("\n")
}

fn render_txt(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render milliseconds as HH:MM:SS + separator + mmm, shared by both
/// subtitle variants
fn ms_to_timestamp(milliseconds: u64, separator: char) -> String {
    let ms = milliseconds % 1_000;
    let seconds = (milliseconds / 1_000) % 60;
    let minutes = (milliseconds / 60_000) % 60;
    let hours = milliseconds / 3_600_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{ms:03}")
}

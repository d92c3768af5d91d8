//! JSON response types and formatting for CLI output.

use chrono::DateTime;
use serde::Serialize;

use mnemos::{DialogueRecord, RawMemoryHit, SummaryMemoryHit, SummaryRecord};

/// Response for a stored dialogue turn.
#[derive(Serialize)]
pub struct InsertResponse {
    pub status: String,
    pub id: i64,
    pub indexed: bool,
}

/// Response for raw memory retrieval.
#[derive(Serialize)]
pub struct RawQueryResponse {
    pub results: Vec<RawMemoryHit>,
}

/// Response for summary memory retrieval.
#[derive(Serialize)]
pub struct SummaryQueryResponse {
    pub results: Vec<SummaryMemoryHit>,
}

/// Response for listing recent dialogues.
#[derive(Serialize)]
pub struct RecentResponse {
    pub dialogues: Vec<DialogueRecord>,
}

/// Response for listing summaries.
#[derive(Serialize)]
pub struct SummariesResponse {
    pub summaries: Vec<SummaryRecord>,
}

/// Response for errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// RFC 3339 rendering of epoch seconds, or the raw number if out of range.
pub fn format_timestamp(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

//! Narrative insight from aggregate statistics
//!
//! `build_summary` condenses a dataset into structured statistics,
//! `InsightRequest` turns them into a prompt, and an `InsightClient`
//! sends the prompt to the text-generation service.

mod client;
mod history;
mod prompt;
mod summary;

pub use client::{classify_failure, extract_text, generate_narrative, GeminiClient, InsightClient, InsightError, MockClient};
pub use history::{HistoryEntry, InsightHistory};
pub use prompt::InsightRequest;
pub use summary::{build_summary, RegionGrowth, RegionTotal, StructuredSummary};

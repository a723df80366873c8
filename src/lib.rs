// Public API exports
pub mod aggregator;
pub mod db;
pub mod formatter;
pub mod segment;
pub mod tokenizer;

// Re-export main types for convenience
pub use segment::{Segment, TICKS_PER_MS, load_segments, ticks_to_ms};

pub use tokenizer::{TiktokenCounter, TokenCounter, TokenizerError};

pub use aggregator::{
    AggregateError, Chunk, ChunkAggregator, DEFAULT_TARGET_TOKENS, aggregate_segments,
};

pub use formatter::{FormatError, OutputFormat, render};

pub use db::{
    Document, DocumentStats, DocumentUpdate, NewDocument, StoredChunk, TranscriptDb,
    document_from_media,
};

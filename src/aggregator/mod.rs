mod engine;


pub use engine::{AggregateError, Chunk, ChunkAggregator, aggregate_segments};

/// Default token budget per chunk (configurable)
pub const DEFAULT_TARGET_TOKENS: usize = 250;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::{Segment, ticks_to_ms};
use crate::tokenizer::TokenCounter;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Target tokens per chunk must be positive, got {0}")]
    InvalidTokenBudget(usize),
}

/// A token-budget-bounded group of concatenated segments with derived
/// metrics and a timing span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based position in output order, dense with no gaps
    pub sequence_number: u32,
    /// Space-joined trimmed segment texts, never empty
    pub text: String,
    /// Encoder count of `text`, measured over the whole chunk at finalize
    pub token_count: usize,
    /// Whitespace-delimited word count of `text`
    pub word_count: usize,
    /// Start of the first folded segment, in milliseconds
    pub start_offset_ms: u64,
    /// End of the last folded segment, in milliseconds
    pub end_offset_ms: u64,
}

/// Folds an ordered segment stream into token-budgeted chunks.
///
/// Greedy single-pass accumulation: a segment joins the current chunk while
/// the re-encoded combined text stays within the budget, otherwise the chunk
/// is finalized and the segment opens the next one. The first segment of a
/// chunk is always accepted, so a single segment that alone exceeds the
/// budget still produces exactly one (oversized) chunk and the fold always
/// makes progress.
///
/// Candidate text is re-encoded in full at every step rather than summing
/// per-segment counts; token boundaries shift across concatenation, and a
/// running sum would drift from the count of the final chunk text.
pub struct ChunkAggregator<'a> {
    counter: &'a dyn TokenCounter,
    target_tokens: usize,
    current_text: String,
    current_tokens: usize,
    current_start_tick: u64,
    current_end_tick: u64,
    finished: Vec<Chunk>,
}

impl<'a> ChunkAggregator<'a> {
    /// Create an aggregator for one run. Fails fast on a zero token budget
    /// before any segment is consumed.
    pub fn new(
        counter: &'a dyn TokenCounter,
        target_tokens: usize,
    ) -> Result<Self, AggregateError> {
        if target_tokens == 0 {
            return Err(AggregateError::InvalidTokenBudget(target_tokens));
        }
        Ok(Self {
            counter,
            target_tokens,
            current_text: String::new(),
            current_tokens: 0,
            current_start_tick: 0,
            current_end_tick: 0,
            finished: Vec::new(),
        })
    }

    /// Consume the next segment in stream order
    pub fn push(&mut self, segment: &Segment) {
        let trimmed = segment.text.trim();
        if trimmed.is_empty() {
            return;
        }

        if self.current_text.is_empty() {
            // First segment of a chunk is always accepted, even when it
            // alone exceeds the budget
            self.current_text.push_str(trimmed);
            self.current_tokens = self.counter.count_tokens(&self.current_text);
            self.current_start_tick = segment.start_tick;
            self.current_end_tick = segment.end_tick;
            return;
        }

        let candidate = format!("{} {}", self.current_text, trimmed);
        let candidate_tokens = self.counter.count_tokens(&candidate);

        if candidate_tokens <= self.target_tokens {
            self.current_text = candidate;
            self.current_tokens = candidate_tokens;
            self.current_end_tick = segment.end_tick;
        } else {
            self.finalize_current();
            self.current_text.push_str(trimmed);
            self.current_tokens = self.counter.count_tokens(&self.current_text);
            self.current_start_tick = segment.start_tick;
            self.current_end_tick = segment.end_tick;
        }
    }

    /// Flush the trailing partial chunk and return the finished sequence
    pub fn finish(mut self) -> Vec<Chunk> {
        if !self.current_text.is_empty() {
            self.finalize_current();
        }
        self.finished
    }

    fn finalize_current(&mut self) {
        let text = std::mem::take(&mut self.current_text);
        let word_count = text.split_whitespace().count();
        self.finished.push(Chunk {
            sequence_number: self.finished.len() as u32 + 1,
            token_count: self.current_tokens,
            word_count,
            start_offset_ms: ticks_to_ms(self.current_start_tick),
            end_offset_ms: ticks_to_ms(self.current_end_tick),
            text,
        });
        self.current_tokens = 0;
    }
}

/// Fold a materialized segment stream into chunks in one call.
///
/// An empty stream yields an empty chunk list.
pub fn aggregate_segments(
    segments: &[Segment],
    target_tokens: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<Chunk>, AggregateError> {
    let mut aggregator = ChunkAggregator::new(counter, target_tokens)?;
    for segment in segments {
        aggregator.push(segment);
    }
    Ok(aggregator.finish())
}

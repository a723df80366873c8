use thiserror::Error;
use tiktoken_rs::CoreBPE;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Token encoder unavailable: {0}")]
    EncoderUnavailable(String),
}

/// Measures text in LLM tokens. Implementations must be pure and
/// deterministic; the same counter instance is used for every chunk in
/// one aggregation run so counts stay comparable.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Token counter backed by the cl100k_base BPE encoding
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| TokenizerError::EncoderUnavailable(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

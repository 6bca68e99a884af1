//! Streaming output types

use std::pin::Pin;

use futures_util::Stream;

use crate::HuginnError;

/// A piece of incremental output.
///
/// The final chunk of a stream has `done == true` or carries an `error`.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
    pub error: Option<HuginnError>,
}

impl StreamChunk {
    pub fn content(content: impl Into<String>, done: bool) -> Self {
        Self {
            content: content.into(),
            done,
            error: None,
        }
    }

    pub fn error(err: HuginnError) -> Self {
        Self {
            content: String::new(),
            done: false,
            error: Some(err),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Boxed stream of chunks returned by `generate_stream`.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

//! Emulated streaming.
//!
//! Neither backend is driven through its native streaming API. Instead the
//! full response is fetched and replayed as a sequence of [`CHUNK_SIZE`]
//! character pieces, [`CHUNK_DELAY`] apart. Callers get the streaming shape
//! without incremental latency benefits.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;

use crate::Result;
use crate::types::{ChunkStream, GenerateResponse, StreamChunk};

/// Characters per emitted chunk.
pub const CHUNK_SIZE: usize = 50;

/// Pause between consecutive chunks.
pub const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Turn the outcome of a full generate call into a chunk stream.
pub fn emulate(result: Result<GenerateResponse>) -> ChunkStream {
    match result {
        Ok(response) => {
            let pieces = split_chunks(&response.content, CHUNK_SIZE);
            let last = pieces.len() - 1;
            Box::pin(
                stream::iter(pieces.into_iter().enumerate()).then(move |(i, piece)| async move {
                    if i > 0 {
                        tokio::time::sleep(CHUNK_DELAY).await;
                    }
                    StreamChunk::content(piece, i == last)
                }),
            )
        }
        Err(err) => Box::pin(stream::iter([StreamChunk::error(err)])),
    }
}

/// Split `content` into pieces of at most `size` characters.
///
/// Always returns at least one piece (empty content yields one empty piece).
pub fn split_chunks(content: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_char_boundaries() {
        let text = "å".repeat(120);
        let pieces = split_chunks(&text, 50);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].chars().count(), 50);
        assert_eq!(pieces[2].chars().count(), 20);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn empty_content_yields_one_piece() {
        assert_eq!(split_chunks("", 50), vec![String::new()]);
    }
}

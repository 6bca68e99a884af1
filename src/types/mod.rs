//! Public types for the Huginn API.

mod generate;
mod response;
mod stream;

pub use generate::{GenerateRequest, MAX_EXTRA_METADATA, RequestMetadata};
pub use response::{GenerateResponse, Usage};
pub use stream::{ChunkStream, StreamChunk};

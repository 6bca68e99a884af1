//! Model client contract and provider adapters.
//!
//! [`ModelClient`] is the provider-neutral interface every backend and
//! decorator implements. Adapters translate requests into the provider's
//! wire format and map its failures onto [`ErrorCode`](crate::ErrorCode).

pub mod azure;
pub mod bedrock;
pub mod http;
pub mod stream;
pub mod traits;

pub use azure::AzureClient;
pub use bedrock::BedrockClient;
pub use traits::ModelClient;

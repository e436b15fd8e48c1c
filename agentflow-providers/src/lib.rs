//! Provider gateway: a uniform completion/stream/health contract over
//! heterogeneous LLM backends, with credential override, request
//! rewriting, and a typed error taxonomy shared with the rest of
//! agentflow.

pub mod config;
pub mod error;
pub mod gateway;
pub mod remote;
pub mod rewriters;

pub use config::RemoteProviderConfig;
pub use error::{ProviderError, Result};
pub use gateway::{ChunkStream, CredentialOverride, Gateway, HealthStatus, Provider, RequestRewriter, RewriterChain};

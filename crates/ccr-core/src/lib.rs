//! Wires together configuration, routing, credential resolution, the
//! per-provider transformers, and the request engine into one pipeline.

pub mod api_key;
pub mod config;
pub mod gemini_transformer;
pub mod openai_transformer;
pub mod orchestrator;
pub mod routing;
pub mod transformer;

pub use api_key::{resolve_api_key, ApiKeySource};
pub use config::{
    patch_from_env, patch_from_file, ProviderConfig, ProviderKind, RouteTarget, RouterConfig,
    RouterConfigError, RouterConfigPatch, RouterRules,
};
pub use gemini_transformer::GeminiTransformer;
pub use openai_transformer::OpenAiTransformer;
pub use orchestrator::{run, OrchestratorError, PipelineResponse};
pub use routing::resolve_route;
pub use transformer::{ResponseContext, StreamDecoder, Transformer, TransformerError};

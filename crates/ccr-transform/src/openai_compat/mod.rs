//! OpenAI-compatible transformer: incoming Anthropic-shaped caller bodies,
//! outgoing OpenAI-compatible upstream bodies, and response/SSE pass-through
//! (spec §4.6).

pub mod incoming;
pub mod outgoing;
pub mod response;
pub mod sse;

pub use incoming::transform_request_out;
pub use outgoing::transform_request_in;
pub use response::to_caller_response;
pub use sse::SsePassthrough;

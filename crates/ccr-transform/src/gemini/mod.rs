//! Gemini-direction request builder and response translators (spec §4.4, §4.5).

pub mod request;
pub mod response;
pub mod sse;
pub mod stream;

pub use request::build_request;
pub use response::translate_unary_response;
pub use sse::GeminiSseDecoder;
pub use stream::GeminiStreamTranslator;

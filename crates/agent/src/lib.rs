pub mod contact;
pub mod documents;
pub mod gemini;
pub mod llm;
pub mod runtime;
pub mod safety;

#[cfg(test)]
mod test_http;

pub use contact::{ContactSink, ContactSinkError};
pub use documents::{DocumentCache, DocumentError, DocumentSource};
pub use gemini::GeminiClient;
pub use llm::{GenerationClient, GenerationError, GenerationRequest};
pub use runtime::ChatRuntime;
pub use safety::{Classified, ErrorClassifier, SafetySettings};

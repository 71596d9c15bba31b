pub mod backend;
pub mod gemini;

pub use backend::RestBackendAdapter;
pub use gemini::GeminiAdapter;

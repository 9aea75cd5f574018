pub mod gemini;
mod gemini_types;
pub mod traits;

pub use gemini::GeminiProvider;
pub use traits::ChatProvider;

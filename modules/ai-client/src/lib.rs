pub mod claude;
pub mod gemini;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use gemini::Gemini;
pub use traits::TextCompletion;

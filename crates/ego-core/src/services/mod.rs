pub mod image;
pub mod input;
pub mod search;
pub mod voice;

pub use image::{GenerationOptions, ImageAnalysis, ImageService, ImageStyle};
pub use input::{categorize_input, process_text, InputCategory};
pub use search::{SearchResult, SearchService};
pub use voice::{Transcription, VoiceService, VoiceSettings};

//! Deep research client (OpenAI Responses API, background mode).

pub mod api;
mod parser;

pub use api::{ResearchClient, ResearchSettings};
pub use parser::paragraphs;

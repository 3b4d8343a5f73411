pub mod generator;
pub mod handlers;
pub mod scoring;
#[cfg(test)]
mod tests;

pub use generator::{GenerationError, GenerationReport, RecommendationGenerator};
pub use handlers::{create_handler, generate_handler, get_handler, list_handler, update_handler};
pub use scoring::{HttpScorer, RecommendationScorer, RulesScorer, ScoringInput, ScoringOutput};

pub mod explanation;
pub mod filters;
pub mod profile;
pub mod providers;
pub mod query;
pub mod recommendations;
pub mod synopsis;
pub mod vectors;

pub use explanation::{ExplanationGenerator, ExplanationSettings};
pub use recommendations::{RecommendationService, RecommendationSettings};
pub use synopsis::SynopsisTable;

pub mod analysis;
pub mod candidate;
pub mod lead;
pub mod loaders;

pub use analysis::{Classification, DocumentationAnalysis, SentimentAnalysis};
pub use candidate::Candidate;
pub use lead::LeadResult;
pub use loaders::{dedup_candidates, load_candidates};

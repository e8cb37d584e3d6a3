pub mod candidate_loader;

pub use candidate_loader::{dedup_candidates, load_candidates, parse_candidates};

pub mod lead_analyzer;
pub mod lead_ctx;

pub use lead_analyzer::LeadAnalyzer;
pub use lead_ctx::LeadCtx;

//! Shared domain types for the opportunity pipeline.

pub mod error;
pub mod profile;
pub mod types;

pub use error::Error;
pub use profile::ItemProfile;
pub use types::{
    BatchSummary, CompetitorPricing, ConstraintVerdict, DimensionScores, MarketSizeEstimate,
    OpportunityRecord, OpportunityStatus, RawItem, SimilarLaunch, TrustIndicators, TrustLevel,
    ValidationEvidence, DIMENSION_WEIGHTS, TRUST_WEIGHTS,
};

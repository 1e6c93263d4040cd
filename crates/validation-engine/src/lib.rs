//! Market evidence synthesis: search, fetch, structured extraction and
//! fusion into a validation score, all under a shared cost ledger.

pub mod extract;
pub mod ledger;
pub mod synthesizer;

pub use ledger::{CostLedger, CostModel};
pub use synthesizer::{MarketValidator, SynthesisReport, ValidationConfig};

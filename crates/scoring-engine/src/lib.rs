//! Pure scoring logic: the five-dimension opportunity scorer and the
//! simplicity constraint gate. No I/O anywhere in this crate, so repeated
//! calls over the same input are byte-identical.

pub mod constraint;
mod lexicon;
pub mod scorer;

pub use constraint::{adjusted_total, evaluate_functions};
pub use scorer::score;

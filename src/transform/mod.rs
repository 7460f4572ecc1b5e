//! Frame transforms behind the command line tools.
//!
//! Every transform takes its frames by value and hands back new ones, so a
//! source frame is never shared between two outputs.

pub mod filter;
pub mod label;
pub mod merge;
pub mod sample;
pub mod supercell;

/// Name of the per-atom reference force array.
pub const REF_FORCES: &str = "REF_forces";
/// Name of the frame reference energy.
pub const REF_ENERGY: &str = "REF_energy";

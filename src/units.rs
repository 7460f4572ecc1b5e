//! Unit conversion constants (CODATA 2014, as used by ASE).
//!
//! Energies are converted to eV and lengths to Å.

/// Hartree energy in eV.
pub const HARTREE: f64 = 27.211386024367243;

/// Rydberg energy in eV.
pub const RYDBERG: f64 = HARTREE / 2.0;

/// Bohr radius in Å.
pub const BOHR: f64 = 0.52917721067;

/// Rounded Hartree used when labeling single-point CP2K energies.
pub const HARTREE_ROUNDED: f64 = 27.2114;

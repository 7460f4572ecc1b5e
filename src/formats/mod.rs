pub mod espresso;
pub mod poscar;
pub mod ulm;
pub mod xyz;

//! Temperature sensors

pub mod nct375;

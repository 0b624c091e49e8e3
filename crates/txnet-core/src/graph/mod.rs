//! Transmission graph storage and synthetic outbreak generation.

pub mod network;
pub mod outbreak;

pub use network::NetworkGraph;
pub use outbreak::{OutbreakConfig, OutbreakGenerator};

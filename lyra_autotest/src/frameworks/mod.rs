// Frameworks layer: environment configuration and the scenario harness.

pub mod config;
pub mod harness;

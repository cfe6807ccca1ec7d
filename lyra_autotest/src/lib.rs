pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::{AutomationDriver, DriverError, RemoteEntity, ScenarioError};
pub use frameworks::config::AutotestConfig;
pub use frameworks::harness::{Scenario, run_all, run_scenario, session_from_env};
pub use use_cases::Session;

// Use cases layer: discovery, aiming and the scenario workflows, all driven
// through a `Session` over the automation port.

pub mod aim_kill;
pub mod aiming;
pub mod discovery;
pub mod dispatch;
pub mod engine_positions;
pub mod gameplay;
pub mod menu;
pub mod scenarios;
pub mod session;
pub mod test_support;

pub use aim_kill::{Acquisition, KillReport};
pub use aiming::AimOutcome;
pub use discovery::PlayerSource;
pub use gameplay::MoveTowardOptions;
pub use scenarios::MovementEvidence;
pub use session::{LogThrottle, Session};

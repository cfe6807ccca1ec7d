// Domain layer: snapshot types, pure targeting rules and the driver port.

pub mod classify;
pub mod engagement;
pub mod entity;
pub mod errors;
pub mod geometry;
pub mod parse;
pub mod ports;
pub mod tiles;

pub use entity::{EntityId, RemoteEntity, ScreenPoint, Vec3, Viewport};
pub use errors::{DriverError, KillFailure, ScenarioError};
pub use ports::{AutomationDriver, By, CallArg, Key, MethodCall, RemoteValue};

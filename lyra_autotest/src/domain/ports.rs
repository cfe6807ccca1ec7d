use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entity::{EntityId, RemoteEntity, ScreenPoint, Viewport};
use crate::domain::errors::DriverError;

// Lookup key for object queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum By {
    Name,
    Id,
}

// Keys the suite injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    D,
    Mouse0,
    Return,
    Space,
    Escape,
    JoystickButton0,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::W => "W",
            Key::A => "A",
            Key::D => "D",
            Key::Mouse0 => "Mouse0",
            Key::Return => "Return",
            Key::Space => "Space",
            Key::Escape => "Escape",
            Key::JoystickButton0 => "JoystickButton0",
        }
    }
}

/// Positional argument for a remote call. Each variant carries the type name
/// the remote side uses to pick the overload.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Int(i64),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl CallArg {
    pub fn type_name(&self) -> &'static str {
        match self {
            CallArg::Int(_) => "System.Int32",
            CallArg::Float(_) => "System.Single",
            CallArg::Bool(_) => "System.Boolean",
            CallArg::Str(_) => "System.String",
        }
    }
}

/// One remote method invocation: which component and module own the method,
/// plus its arguments. Static calls use `component` as the class name.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub component: String,
    pub method: String,
    pub module: String,
    pub args: Vec<CallArg>,
}

impl MethodCall {
    pub fn new(
        component: impl Into<String>,
        method: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            method: method.into(),
            module: module.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: CallArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = CallArg>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.args.iter().map(CallArg::type_name).collect()
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.method)?;
        if !self.module.is_empty() {
            write!(f, "@{}", self.module)?;
        }
        Ok(())
    }
}

// Typed result of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f32),
    Str(String),
}

impl RemoteValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RemoteValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            RemoteValue::Float(v) => Some(*v),
            RemoteValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

// Port for the remote automation transport driving the game process.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn find_objects(
        &self,
        by: By,
        value: &str,
        enabled: bool,
    ) -> Result<Vec<RemoteEntity>, DriverError>;

    async fn find_objects_containing(
        &self,
        by: By,
        value: &str,
        enabled: bool,
    ) -> Result<Vec<RemoteEntity>, DriverError>;

    async fn all_elements(&self, enabled: bool) -> Result<Vec<RemoteEntity>, DriverError>;

    async fn find_object(
        &self,
        by: By,
        value: &str,
        enabled: bool,
    ) -> Result<Option<RemoteEntity>, DriverError> {
        Ok(self.find_objects(by, value, enabled).await?.into_iter().next())
    }

    async fn find_object_containing(
        &self,
        by: By,
        value: &str,
        enabled: bool,
    ) -> Result<Option<RemoteEntity>, DriverError> {
        Ok(self
            .find_objects_containing(by, value, enabled)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_id(
        &self,
        id: EntityId,
        enabled: bool,
    ) -> Result<Option<RemoteEntity>, DriverError> {
        self.find_object(By::Id, &id.to_string(), enabled).await
    }

    // Hit-test: topmost object under a screen point.
    async fn object_at(&self, point: ScreenPoint) -> Result<Option<RemoteEntity>, DriverError>;

    async fn call_component_method(
        &self,
        target: EntityId,
        call: &MethodCall,
    ) -> Result<RemoteValue, DriverError>;

    async fn call_static_method(&self, call: &MethodCall) -> Result<RemoteValue, DriverError>;

    async fn key_down(&self, key: Key) -> Result<(), DriverError>;
    async fn key_up(&self, key: Key) -> Result<(), DriverError>;
    async fn press_key(&self, key: Key, hold: Duration) -> Result<(), DriverError>;
    async fn tap(&self, point: ScreenPoint) -> Result<(), DriverError>;
    async fn click(&self, point: ScreenPoint) -> Result<(), DriverError>;

    async fn load_scene(&self, name: &str) -> Result<(), DriverError>;
    async fn wait_for_scene(&self, name: &str, timeout: Duration) -> Result<(), DriverError>;
    async fn current_scene(&self) -> Result<String, DriverError>;

    async fn screen_size(&self) -> Result<Viewport, DriverError>;
}

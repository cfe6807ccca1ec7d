// Scripted in-memory game shared by the integration tests.
#![allow(dead_code)]

use std::{
    // Handlers are looked up by remote method name.
    collections::HashMap,
    // Every driver call locks the world; no await happens while it is held.
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use lyra_autotest::domain::{
    AutomationDriver, By, DriverError, EntityId, Key, MethodCall, RemoteEntity, RemoteValue, ScreenPoint, Viewport,
};
use lyra_autotest::frameworks::config::AutotestConfig;
use lyra_autotest::interface_adapters::protocol::entities_from_json;
use lyra_autotest::Session;

// Answers a remote call against the world; None reads as "method unavailable".
pub type CallHandler = Box<dyn Fn(&mut World, EntityId, &MethodCall) -> Option<RemoteValue> + Send + Sync>;
// Side effect of a key press or a tap on a named widget.
pub type Hook = Box<dyn Fn(&mut World) + Send + Sync>;

/// One injected input, in the order the suite sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    KeyDown(Key),
    KeyUp(Key),
    Press(Key),
    Tap(ScreenPoint),
    Click(ScreenPoint),
}

/// Observable game state behind the driver.
#[derive(Debug, Clone)]
pub struct World {
    pub entities: Vec<RemoteEntity>,
    pub scene: String,
    pub viewport: Viewport,
    pub inputs: Vec<Input>,
    // `Component.Method` of every call that reached a handler.
    pub calls: Vec<String>,
    // `Component.Method` of every call made, answered or not.
    pub attempts: Vec<String>,
    pub loaded_scenes: Vec<String>,
}

impl World {
    pub fn remove(&mut self, id: EntityId) {
        self.entities.retain(|e| e.id != id);
    }

    pub fn enable(&mut self, name: &str) {
        for entity in self.entities.iter_mut().filter(|e| e.name == name) {
            entity.enabled = true;
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&RemoteEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn visible(&self, enabled: bool) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.iter().filter(move |e| !enabled || e.enabled)
    }
}

pub struct ScriptedDriver {
    world: Mutex<World>,
    component_handlers: HashMap<String, CallHandler>,
    static_handlers: HashMap<String, CallHandler>,
    key_hooks: HashMap<Key, Hook>,
    tap_hooks: HashMap<String, Hook>,
}

impl ScriptedDriver {
    pub fn new(entities: Vec<RemoteEntity>) -> Self {
        Self {
            world: Mutex::new(World {
                entities,
                scene: "L_LyraFrontEnd".to_string(),
                viewport: Viewport {
                    width: 1920.0,
                    height: 1080.0,
                },
                inputs: Vec::new(),
                calls: Vec::new(),
                attempts: Vec::new(),
                loaded_scenes: Vec::new(),
            }),
            component_handlers: HashMap::new(),
            static_handlers: HashMap::new(),
            key_hooks: HashMap::new(),
            tap_hooks: HashMap::new(),
        }
    }

    // Fixtures use the automation tool's own JSON shape.
    pub fn from_json(fixture: serde_json::Value) -> Self {
        let entities = entities_from_json(&fixture.to_string()).expect("fixture entities");
        Self::new(entities)
    }

    pub fn in_scene(self, scene: &str) -> Self {
        self.world().scene = scene.to_string();
        self
    }

    pub fn with_viewport(self, width: f32, height: f32) -> Self {
        self.world().viewport = Viewport { width, height };
        self
    }

    pub fn on_call<F>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(&mut World, EntityId, &MethodCall) -> Option<RemoteValue> + Send + Sync + 'static,
    {
        self.component_handlers.insert(method.to_string(), Box::new(handler));
        self
    }

    pub fn on_static<F>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(&mut World, EntityId, &MethodCall) -> Option<RemoteValue> + Send + Sync + 'static,
    {
        self.static_handlers.insert(method.to_string(), Box::new(handler));
        self
    }

    pub fn on_key<F>(mut self, key: Key, hook: F) -> Self
    where
        F: Fn(&mut World) + Send + Sync + 'static,
    {
        self.key_hooks.insert(key, Box::new(hook));
        self
    }

    pub fn on_tap<F>(mut self, widget: &str, hook: F) -> Self
    where
        F: Fn(&mut World) + Send + Sync + 'static,
    {
        self.tap_hooks.insert(widget.to_string(), Box::new(hook));
        self
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().expect("world lock")
    }

    pub fn presses(&self, key: Key) -> usize {
        self.world()
            .inputs
            .iter()
            .filter(|i| matches!(i, Input::Press(k) if *k == key))
            .count()
    }

    pub fn taps(&self) -> Vec<ScreenPoint> {
        self.world()
            .inputs
            .iter()
            .filter_map(|i| match i {
                Input::Tap(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        let suffix = format!(".{method}");
        self.world().calls.iter().filter(|c| c.ends_with(&suffix)).count()
    }

    pub fn attempts_of(&self, method: &str) -> usize {
        let suffix = format!(".{method}");
        self.world().attempts.iter().filter(|c| c.ends_with(&suffix)).count()
    }

    fn dispatch(
        &self,
        handlers: &HashMap<String, CallHandler>,
        target: EntityId,
        call: &MethodCall,
    ) -> Result<RemoteValue, DriverError> {
        let mut world = self.world();
        world.attempts.push(format!("{}.{}", call.component, call.method));
        let handler = handlers
            .get(&call.method)
            .ok_or_else(|| DriverError::MethodUnavailable(call.to_string()))?;
        match handler(&mut *world, target, call) {
            Some(value) => {
                world.calls.push(format!("{}.{}", call.component, call.method));
                Ok(value)
            }
            None => Err(DriverError::MethodUnavailable(call.to_string())),
        }
    }

    fn run_key_hook(&self, key: Key) {
        if let Some(hook) = self.key_hooks.get(&key) {
            hook(&mut *self.world());
        }
    }
}

fn name_matches(entity: &RemoteEntity, by: By, value: &str) -> bool {
    match by {
        By::Name => entity.name == value,
        By::Id => value.parse::<EntityId>().is_ok_and(|id| id == entity.id),
    }
}

#[async_trait]
impl AutomationDriver for ScriptedDriver {
    async fn find_objects(&self, by: By, value: &str, enabled: bool) -> Result<Vec<RemoteEntity>, DriverError> {
        let world = self.world();
        Ok(world
            .visible(enabled)
            .filter(|e| name_matches(e, by, value))
            .cloned()
            .collect())
    }

    async fn find_objects_containing(
        &self,
        by: By,
        value: &str,
        enabled: bool,
    ) -> Result<Vec<RemoteEntity>, DriverError> {
        let world = self.world();
        let needle = value.to_ascii_lowercase();
        Ok(world
            .visible(enabled)
            .filter(|e| match by {
                By::Name => e.name.to_ascii_lowercase().contains(&needle),
                By::Id => e.id.to_string().contains(value),
            })
            .cloned()
            .collect())
    }

    async fn all_elements(&self, enabled: bool) -> Result<Vec<RemoteEntity>, DriverError> {
        Ok(self.world().visible(enabled).cloned().collect())
    }

    async fn object_at(&self, point: ScreenPoint) -> Result<Option<RemoteEntity>, DriverError> {
        Ok(self
            .world()
            .visible(true)
            .find(|e| e.screen == point)
            .cloned())
    }

    async fn call_component_method(&self, target: EntityId, call: &MethodCall) -> Result<RemoteValue, DriverError> {
        if self.world().entity(target).is_none() {
            return Err(DriverError::NotFound(format!("id {target}")));
        }
        self.dispatch(&self.component_handlers, target, call)
    }

    async fn call_static_method(&self, call: &MethodCall) -> Result<RemoteValue, DriverError> {
        self.dispatch(&self.static_handlers, 0, call)
    }

    async fn key_down(&self, key: Key) -> Result<(), DriverError> {
        self.world().inputs.push(Input::KeyDown(key));
        self.run_key_hook(key);
        Ok(())
    }

    async fn key_up(&self, key: Key) -> Result<(), DriverError> {
        self.world().inputs.push(Input::KeyUp(key));
        Ok(())
    }

    async fn press_key(&self, key: Key, hold: Duration) -> Result<(), DriverError> {
        self.world().inputs.push(Input::Press(key));
        self.run_key_hook(key);
        tokio::time::sleep(hold).await;
        Ok(())
    }

    async fn tap(&self, point: ScreenPoint) -> Result<(), DriverError> {
        let mut world = self.world();
        world.inputs.push(Input::Tap(point));
        let hit = world.visible(true).find(|e| e.screen == point).map(|e| e.name.clone());
        if let Some(hook) = hit.and_then(|name| self.tap_hooks.get(&name)) {
            hook(&mut *world);
        }
        Ok(())
    }

    async fn click(&self, point: ScreenPoint) -> Result<(), DriverError> {
        self.world().inputs.push(Input::Click(point));
        Ok(())
    }

    async fn load_scene(&self, name: &str) -> Result<(), DriverError> {
        let mut world = self.world();
        world.loaded_scenes.push(name.to_string());
        // Travel options after `?` are not part of the scene name.
        world.scene = name.split('?').next().unwrap_or(name).to_string();
        Ok(())
    }

    async fn wait_for_scene(&self, name: &str, timeout: Duration) -> Result<(), DriverError> {
        if self.world().scene == name {
            return Ok(());
        }
        Err(DriverError::Timeout {
            what: format!("scene {name}"),
            timeout_secs: timeout.as_secs_f64(),
        })
    }

    async fn current_scene(&self) -> Result<String, DriverError> {
        Ok(self.world().scene.clone())
    }

    async fn screen_size(&self) -> Result<Viewport, DriverError> {
        Ok(self.world().viewport)
    }
}

// Shorthand for the usual `LyraCharacter` pawn fixture.
pub fn pawn(id: EntityId, name: &str, x: f32, y: f32, z: f32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "type": "LyraCharacter",
        "worldX": x,
        "worldY": y,
        "worldZ": z,
    })
}

pub fn session(driver: ScriptedDriver) -> Session<ScriptedDriver> {
    session_with(driver, &[])
}

// Session whose configuration reads only the given `ALTTESTER_*` pairs.
pub fn session_with(driver: ScriptedDriver, pairs: &[(&str, &str)]) -> Session<ScriptedDriver> {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = AutotestConfig::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    });
    Session::new(driver, Arc::new(config))
}

// Read-only snapshots of remote game objects and the coordinate types they carry.

/// Numeric id of a live remote object. Reused by the game after destruction.
pub type EntityId = i64;

/// World-space point or direction in the game's single shared frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (other - self).length()
    }

    /// Distance on the ground plane, ignoring height.
    pub fn horizontal_distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Same point raised by `dz` units.
    pub fn raised(self, dz: f32) -> Self {
        Self {
            z: self.z + dz,
            ..self
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Pixel coordinates on the game viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size of the application viewport in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn contains(&self, point: ScreenPoint) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

/// Snapshot of a remote object as reported by the automation driver.
///
/// The suite never owns or mutates these; a fresh lookup is the only way to
/// observe newer state.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: EntityId,
    pub name: String,
    /// Fully-qualified class-like tag, e.g. `B_Hero_ShooterMannequin_C`.
    pub type_name: String,
    pub world: Vec3,
    pub screen: ScreenPoint,
    pub enabled: bool,
}

impl RemoteEntity {
    pub fn new(id: EntityId, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            type_name: type_name.into(),
            world: Vec3::ZERO,
            screen: ScreenPoint::default(),
            enabled: true,
        }
    }

    pub fn at(mut self, world: Vec3) -> Self {
        self.world = world;
        self
    }

    pub fn on_screen(mut self, screen: ScreenPoint) -> Self {
        self.screen = screen;
        self
    }
}

// Wire DTOs for object snapshots as the automation tool serializes them, and
// the run summary the harness emits. Field names follow the tool's JSON.

use serde::{Deserialize, Serialize};

use crate::domain::{RemoteEntity, ScreenPoint, Vec3};

/// Object snapshot as reported by the automation tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObjectDto {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub world_x: f32,
    #[serde(default)]
    pub world_y: f32,
    #[serde(default)]
    pub world_z: f32,
    // Screen-space position in pixels.
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl From<RemoteObjectDto> for RemoteEntity {
    fn from(dto: RemoteObjectDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            type_name: dto.type_name,
            world: Vec3::new(dto.world_x, dto.world_y, dto.world_z),
            screen: ScreenPoint::new(dto.x, dto.y),
            enabled: dto.enabled,
        }
    }
}

impl From<&RemoteEntity> for RemoteObjectDto {
    fn from(entity: &RemoteEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            type_name: entity.type_name.clone(),
            world_x: entity.world.x,
            world_y: entity.world.y,
            world_z: entity.world.z,
            x: entity.screen.x,
            y: entity.screen.y,
            enabled: entity.enabled,
        }
    }
}

/// Decodes a JSON array of snapshots.
pub fn entities_from_json(raw: &str) -> Result<Vec<RemoteEntity>, serde_json::Error> {
    let dtos: Vec<RemoteObjectDto> = serde_json::from_str(raw)?;
    Ok(dtos.into_iter().map(RemoteEntity::from).collect())
}

/// Outcome of one scenario run, logged as a single structured line.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScenarioReportDto {
    pub scenario: String,
    pub passed: bool,
    pub attempts: u32,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired: Option<u32>,
}

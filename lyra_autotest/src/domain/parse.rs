// Parsers for the string payloads the engine hands back: delimited position
// lists, rotators and vectors. Formatting helpers live here too so the
// strings we send match what the engine expects.

use crate::domain::entity::Vec3;
use crate::domain::geometry::{PITCH_MAX_DEG, PITCH_MIN_DEG, PitchYaw};

/// Player and enemy positions decoded from a `role,x,y,z|...` payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnginePositions {
    pub player: Option<Vec3>,
    pub enemies: Vec<Vec3>,
}

impl EnginePositions {
    pub fn is_empty(&self) -> bool {
        self.player.is_none() && self.enemies.is_empty()
    }
}

fn parse_float(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Decodes the `P,x,y,z|E,x,y,z|...` format produced by the test-support
/// queries. Unknown roles and malformed segments are skipped; a later `P`
/// segment overrides an earlier one. Returns `None` when nothing usable was
/// found.
pub fn parse_test_positions(raw: &str) -> Option<EnginePositions> {
    let mut out = EnginePositions::default();
    for part in raw.split('|') {
        let seg = part.trim();
        if seg.len() < 5 {
            continue;
        }
        let fields: Vec<&str> = seg.split(',').collect();
        if fields.len() < 4 {
            continue;
        }
        let (Some(x), Some(y), Some(z)) = (
            parse_float(fields[1]),
            parse_float(fields[2]),
            parse_float(fields[3]),
        ) else {
            continue;
        };
        let point = Vec3::new(x, y, z);
        let role = fields[0].trim();
        if role.eq_ignore_ascii_case("P") {
            out.player = Some(point);
        } else if role.eq_ignore_ascii_case("E") {
            out.enemies.push(point);
        }
    }
    (!out.is_empty()).then_some(out)
}

/// Decodes the legacy enemy-only `x,y,z|x,y,z` format.
pub fn parse_enemy_locations(raw: &str) -> Vec<Vec3> {
    raw.split('|')
        .filter_map(|part| {
            let fields: Vec<&str> = part.split(',').collect();
            if fields.len() < 3 {
                return None;
            }
            Some(Vec3::new(
                parse_float(fields[0])?,
                parse_float(fields[1])?,
                parse_float(fields[2])?,
            ))
        })
        .collect()
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

// Reads the numeric token right after `start`, skipping leading spaces.
fn float_after(s: &str, start: usize) -> Option<f32> {
    let rest = s.get(start..)?.trim_start_matches(' ');
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    rest[..end].parse::<f32>().ok()
}

fn labelled_float(s: &str, label: &str) -> Option<f32> {
    let at = find_ignore_case(s, label)?;
    float_after(s, at + label.len())
}

/// Parses an engine rotator string such as `Pitch=10 Yaw=20 Roll=0` or
/// `(Pitch=10.000000,Yaw=20.000000,Roll=0.000000)`. Pitch is clamped.
pub fn parse_rotator(raw: &str) -> Option<PitchYaw> {
    if raw.is_empty() {
        return None;
    }
    let pitch = labelled_float(raw, "Pitch=")?;
    let yaw = labelled_float(raw, "Yaw=")?;
    Some(PitchYaw {
        pitch: pitch.clamp(PITCH_MIN_DEG, PITCH_MAX_DEG),
        yaw,
    })
}

/// Parses `X=.. Y=.. Z=..` in any of the engine's vector spellings.
pub fn parse_vector(raw: &str) -> Option<Vec3> {
    if raw.is_empty() {
        return None;
    }
    Some(Vec3::new(
        labelled_float(raw, "X=")?,
        labelled_float(raw, "Y=")?,
        labelled_float(raw, "Z=")?,
    ))
}

pub fn format_rotator(pitch: f32, yaw: f32, roll: f32) -> String {
    format!("(Pitch={pitch:.6},Yaw={yaw:.6},Roll={roll:.6})")
}

/// Vector spellings accepted by the location setters, most specific first.
pub fn vector_formats(point: Vec3) -> [String; 2] {
    let Vec3 { x, y, z } = point;
    [format!("(X={x},Y={y},Z={z})"), format!("X={x} Y={y} Z={z}")]
}

pub fn preview(raw: &str, max_chars: usize) -> String {
    if raw.trim().is_empty() {
        return "(empty)".to_string();
    }
    match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

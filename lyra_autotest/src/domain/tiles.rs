// Experience tiles in the host menu are made of several widgets stacked in the
// same column. Widgets are grouped into vertical bands by screen x so a tile
// can be picked by its position from the left.

use std::collections::{BTreeMap, HashSet};

use crate::domain::entity::RemoteEntity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayout {
    /// Width of one column band in pixels.
    pub band_px: f32,
    /// Widgets at or above this screen y (header, tabs) are ignored.
    pub min_screen_y: f32,
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            band_px: 120.0,
            min_screen_y: 100.0,
        }
    }
}

/// Groups on-screen widgets into tiles ordered left to right. Each tile lists
/// its widgets sorted by x. Duplicate ids and off-screen widgets are dropped.
pub fn group_into_tiles<'a>(widgets: &'a [RemoteEntity], layout: TileLayout) -> Vec<Vec<&'a RemoteEntity>> {
    let band_px = if layout.band_px > 0.0 { layout.band_px } else { 120.0 };
    let mut seen = HashSet::new();
    let mut bands: BTreeMap<i64, Vec<&RemoteEntity>> = BTreeMap::new();

    for widget in widgets {
        let pos = widget.screen;
        if !(pos.x > 0.0 && pos.y > layout.min_screen_y) || !seen.insert(widget.id) {
            continue;
        }
        let band = (pos.x / band_px).floor() as i64;
        bands.entry(band).or_default().push(widget);
    }

    let mut tiles: Vec<Vec<&RemoteEntity>> = bands.into_values().collect();
    for tile in &mut tiles {
        tile.sort_by(|a, b| a.screen.x.total_cmp(&b.screen.x));
    }
    tiles.sort_by(|a, b| a[0].screen.x.total_cmp(&b[0].screen.x));
    tiles
}

/// Leftmost widget of the tile at `index`, clamped to the last tile.
pub fn pick_tile(widgets: &[RemoteEntity], layout: TileLayout, index: usize) -> Option<&RemoteEntity> {
    let tiles = group_into_tiles(widgets, layout);
    let last = tiles.len().checked_sub(1)?;
    tiles.get(index.min(last)).and_then(|tile| tile.first().copied())
}

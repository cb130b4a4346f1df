//! Sprite sheet slicing into uniform frames.

use serde::{Deserialize, Serialize};

use crate::core::error::{BattleError, Result};

/// A frame region within a sprite sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteFrame {
    /// X position in pixels.
    pub x: u32,
    /// Y position in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SpriteFrame {
    /// Create a new frame region.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get UV coordinates (offset and size) for this frame.
    pub fn uv(&self, sheet_width: u32, sheet_height: u32) -> ([f32; 2], [f32; 2]) {
        let u0 = self.x as f32 / sheet_width as f32;
        let v0 = self.y as f32 / sheet_height as f32;
        let u_size = self.width as f32 / sheet_width as f32;
        let v_size = self.height as f32 / sheet_height as f32;
        ([u0, v0], [u_size, v_size])
    }

    /// True when the two regions share at least one pixel.
    pub fn overlaps(&self, other: &SpriteFrame) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Layout of a sprite sheet as authored in a unit config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheet {
    /// Image reference, opaque to the battle core.
    pub image: String,
    /// Sheet width in pixels.
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
    pub rows: u32,
    pub cols: u32,
    /// Number of used frames when the last row is partially filled.
    #[serde(default, alias = "frameCount")]
    pub frame_count: Option<u32>,
}

impl SpriteSheet {
    /// Slice this sheet into frames.
    pub fn frames(&self) -> Result<Vec<SpriteFrame>> {
        slice_frames(self.width, self.height, self.rows, self.cols, self.frame_count)
    }

    /// Check the grid fits the image without slicing it.
    pub fn validate(&self) -> Result<()> {
        grid_cells(self.width, self.height, self.rows, self.cols).map(|_| ())
    }

    /// Number of frames the sheet yields.
    pub fn frame_total(&self) -> u32 {
        let cells = self.rows.saturating_mul(self.cols);
        self.frame_count.map_or(cells, |count| count.min(cells))
    }
}

/// Frame width, frame height and cell count of a grid over an image.
fn grid_cells(width: u32, height: u32, rows: u32, cols: u32) -> Result<(u32, u32, u32)> {
    if rows == 0 || cols == 0 {
        return Err(BattleError::InvalidConfig(format!(
            "sprite sheet needs at least one row and column (got {}x{})",
            rows, cols
        )));
    }

    let frame_width = width / cols;
    let frame_height = height / rows;
    if frame_width == 0 || frame_height == 0 {
        return Err(BattleError::InvalidConfig(format!(
            "sprite sheet {}x{} is too small for a {}x{} grid",
            width, height, rows, cols
        )));
    }

    let cells = rows.checked_mul(cols).ok_or_else(|| {
        BattleError::InvalidConfig(format!("sprite sheet grid {}x{} is too large", rows, cols))
    })?;
    Ok((frame_width, frame_height, cells))
}

/// Slice an image into a row-major grid of uniform frames.
///
/// Frame size is `width / cols` by `height / rows` (integer division, so any
/// remainder pixels on the right and bottom edges stay unused). When
/// `frame_count` is given only the first `min(frame_count, rows * cols)`
/// frames are returned.
pub fn slice_frames(
    width: u32,
    height: u32,
    rows: u32,
    cols: u32,
    frame_count: Option<u32>,
) -> Result<Vec<SpriteFrame>> {
    let (frame_width, frame_height, cells) = grid_cells(width, height, rows, cols)?;
    let total = frame_count.map_or(cells, |count| count.min(cells));

    let frames = (0..total)
        .map(|index| {
            let col = index % cols;
            let row = index / cols;
            SpriteFrame::new(col * frame_width, row * frame_height, frame_width, frame_height)
        })
        .collect();

    Ok(frames)
}

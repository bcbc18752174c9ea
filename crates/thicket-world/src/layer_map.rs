//! Fixed-size 2-D character grid for one spatial layer of a zone.
//!
//! A [`LayerMap`] is `height` rows of exactly `width` characters each.
//! The row/length invariant is validated at construction and preserved by
//! every write: [`LayerMap::set_at`] replaces exactly one character and is
//! a no-op outside the bounds, so the grid can never become ragged.

use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// The character grid of one (layer, zone) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMap {
    /// The zone this map belongs to.
    zone_name: String,
    /// Grid width in cells (> 0).
    width: u32,
    /// Grid height in cells (> 0).
    height: u32,
    /// Row-major cell data; each row holds exactly `width` characters.
    rows: Vec<Vec<char>>,
    /// Horizontal offset of the map origin within the zone.
    origin_x: u32,
    /// Vertical offset of the map origin within the zone.
    origin_y: u32,
}

impl LayerMap {
    /// Build a map from raw lines, validating the grid invariant.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MapDataInvalid`] if the dimensions are zero,
    /// the line count differs from `height`, or any line's character count
    /// differs from `width`.
    pub fn from_lines(
        zone_name: impl Into<String>,
        width: u32,
        height: u32,
        lines: &[String],
    ) -> Result<Self, WorldError> {
        let zone_name = zone_name.into();
        if width == 0 || height == 0 {
            return Err(WorldError::MapDataInvalid {
                zone: zone_name,
                reason: format!("dimensions must be positive, got {width}x{height}"),
            });
        }

        let expected_rows = height as usize;
        if lines.len() != expected_rows {
            return Err(WorldError::MapDataInvalid {
                zone: zone_name,
                reason: format!("expected {expected_rows} lines, got {}", lines.len()),
            });
        }

        let expected_cols = width as usize;
        let mut rows = Vec::with_capacity(expected_rows);
        for (index, line) in lines.iter().enumerate() {
            let row: Vec<char> = line.chars().collect();
            if row.len() != expected_cols {
                return Err(WorldError::MapDataInvalid {
                    zone: zone_name,
                    reason: format!(
                        "line {index} has {} characters, expected {expected_cols}",
                        row.len()
                    ),
                });
            }
            rows.push(row);
        }

        Ok(Self {
            zone_name,
            width,
            height,
            rows,
            origin_x: 0,
            origin_y: 0,
        })
    }

    /// Build a map filled with a single character.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MapDataInvalid`] if either dimension is zero.
    pub fn filled(
        zone_name: impl Into<String>,
        width: u32,
        height: u32,
        fill: char,
    ) -> Result<Self, WorldError> {
        let line: String = std::iter::repeat_n(fill, width as usize).collect();
        let lines: Vec<String> = std::iter::repeat_n(line, height as usize).collect();
        Self::from_lines(zone_name, width, height, &lines)
    }

    /// Set the origin offset of the map within its zone.
    #[must_use]
    pub const fn with_origin(mut self, origin_x: u32, origin_y: u32) -> Self {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self
    }

    /// The zone this map belongs to.
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// Grid width in cells.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Origin offset within the zone.
    pub const fn origin(&self) -> (u32, u32) {
        (self.origin_x, self.origin_y)
    }

    /// Whether `(x, y)` falls inside the grid.
    pub const fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Read the character at `(x, y)`, or `None` if out of bounds.
    pub fn get_at(&self, x: u32, y: u32) -> Option<char> {
        self.rows
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Replace the character at `(x, y)`. A no-op outside the bounds;
    /// within them, exactly one cell changes and the row length is
    /// preserved.
    pub fn set_at(&mut self, x: u32, y: u32, ch: char) {
        if let Some(row) = self.rows.get_mut(y as usize)
            && let Some(cell) = row.get_mut(x as usize)
        {
            *cell = ch;
        }
    }

    /// Extract a `w`-by-`h` region with its top-left corner at `(x, y)`.
    ///
    /// Returns `h` strings of `w` characters each, or an empty vector if
    /// any part of the region falls outside the map (or if either
    /// dimension is zero).
    pub fn get_region(&self, x: u32, y: u32, w: u32, h: u32) -> Vec<String> {
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let Some(x_end) = x.checked_add(w) else {
            return Vec::new();
        };
        let Some(y_end) = y.checked_add(h) else {
            return Vec::new();
        };
        if x_end > self.width || y_end > self.height {
            return Vec::new();
        }

        let mut region = Vec::with_capacity(h as usize);
        for row in self
            .rows
            .iter()
            .skip(y as usize)
            .take(h as usize)
        {
            let slice: String = row
                .iter()
                .skip(x as usize)
                .take(w as usize)
                .collect();
            region.push(slice);
        }
        region
    }

    /// Render the grid back to one string per row.
    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.iter().collect()).collect()
    }
}

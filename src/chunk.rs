// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The [`DataChunk`] value type: a bounded, self-contained unit
//! of mesh geometry emitted by a [`crate::loader::LoaderIterator`].

use crate::error::{Error, Result};
use crate::material::Material;
use std::rc::Rc;

/// Componentwise axis-aligned bounding box, updated as vertices are
/// appended. An empty chunk reports the sentinel
/// `(+inf, +inf, +inf, -inf, -inf, -inf)` and every `*_available` flag
/// returns false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }

    fn update(&mut self, x: f32, y: f32, z: f32) {
        self.min[0] = self.min[0].min(x);
        self.min[1] = self.min[1].min(y);
        self.min[2] = self.min[2].min(z);
        self.max[0] = self.max[0].max(x);
        self.max[1] = self.max[1].max(y);
        self.max[2] = self.max[2].max(z);
    }

    /// `true` unless the chunk is empty; min <= max componentwise
    /// otherwise.
    pub fn min_available(&self) -> bool {
        !self.is_empty()
    }

    pub fn max_available(&self) -> bool {
        !self.is_empty()
    }
}

/// Number of 8-bit channels a chunk's color array uses per vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponents {
    Rgb = 3,
    Rgba = 4,
}

impl ColorComponents {
    pub fn count(self) -> usize {
        self as usize
    }

    pub fn from_count(n: usize) -> Result<Self> {
        match n {
            3 => Ok(ColorComponents::Rgb),
            4 => Ok(ColorComponents::Rgba),
            _ => Err(Error::InvalidArgument {
                field: "componentCount",
            }),
        }
    }
}

/// A bounded, self-contained unit of mesh geometry.
///
/// Every index in [`DataChunk::indices`] refers to a vertex within this
/// same chunk (`index < vertex_count()`); chunks never share indices
/// across their boundary.
#[derive(Debug, Clone, Default)]
pub struct DataChunk {
    vertices: Vec<f32>,
    normals: Vec<f32>,
    texture_coordinates: Vec<f32>,
    colors: Vec<u8>,
    color_components: Option<ColorComponents>,
    indices: Vec<i32>,
    bbox: BoundingBox,
    material: Option<Rc<Material>>,
}

impl DataChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn texture_coordinates(&self) -> &[f32] {
        &self.texture_coordinates
    }

    pub fn has_texture_coordinates(&self) -> bool {
        !self.texture_coordinates.is_empty()
    }

    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn color_components(&self) -> Option<ColorComponents> {
        self.color_components
    }

    pub fn indices(&self) -> &[i32] {
        &self.indices
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn material(&self) -> Option<&Rc<Material>> {
        self.material.as_ref()
    }

    pub fn set_material(&mut self, material: Option<Rc<Material>>) {
        self.material = material;
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Appends one vertex (and, if present, its normal/texcoord/color) and
    /// returns its chunk-local index. Updates the bounding box.
    pub fn push_vertex(&mut self, x: f32, y: f32, z: f32) -> u32 {
        let idx = self.vertex_count() as u32;
        self.vertices.push(x);
        self.vertices.push(y);
        self.vertices.push(z);
        self.bbox.update(x, y, z);
        idx
    }

    pub fn push_normal(&mut self, x: f32, y: f32, z: f32) {
        self.normals.push(x);
        self.normals.push(y);
        self.normals.push(z);
    }

    pub fn push_texture_coordinate(&mut self, u: f32, v: f32) {
        self.texture_coordinates.push(u);
        self.texture_coordinates.push(v);
    }

    /// Appends one vertex's color. `components` must stay consistent for
    /// the lifetime of the chunk; the first call fixes it.
    pub fn push_color(&mut self, components: ColorComponents, channels: &[u8]) -> Result<()> {
        if channels.len() != components.count() {
            return Err(Error::InvalidArgument {
                field: "componentCount",
            });
        }
        match self.color_components {
            None => self.color_components = Some(components),
            Some(existing) if existing == components => {}
            Some(_) => {
                return Err(Error::InvalidArgument {
                    field: "componentCount",
                })
            }
        }
        self.colors.extend_from_slice(channels);
        Ok(())
    }

    pub fn push_index(&mut self, index: u32) -> Result<()> {
        if index as usize >= self.vertex_count() {
            return Err(Error::loader("index out of range for chunk"));
        }
        self.indices.push(index as i32);
        Ok(())
    }

    /// `true` when every structural invariant holds: indices in
    /// range, normals length matching vertices when present, colors sized
    /// to `componentCount * vertexCount`, and bbox min <= max unless empty.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertex_count();
        if self.vertices.len() % 3 != 0 {
            return Err(Error::loader("vertex array length not divisible by 3"));
        }
        if self.has_normals() && self.normals.len() != self.vertices.len() {
            return Err(Error::loader("normals length does not match vertices"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::loader("index array length not divisible by 3"));
        }
        for &i in &self.indices {
            if i < 0 || i as usize >= vertex_count {
                return Err(Error::loader("index out of range for chunk"));
            }
        }
        if let Some(components) = self.color_components {
            if self.colors.len() != components.count() * vertex_count {
                return Err(Error::loader("colors length does not match vertexCount"));
            }
        }
        if !self.bbox.is_empty() {
            for axis in 0..3 {
                if self.bbox.min[axis] > self.bbox.max[axis] {
                    return Err(Error::loader("bounding box min exceeds max"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chunk_reports_sentinel_bounds() {
        let chunk = DataChunk::new();
        assert!(!chunk.bbox().min_available());
        assert!(!chunk.bbox().max_available());
        assert_eq!(chunk.bbox().min, [f32::INFINITY; 3]);
        assert_eq!(chunk.bbox().max, [f32::NEG_INFINITY; 3]);
    }

    #[test]
    fn populated_chunk_updates_bbox_and_validates() {
        let mut chunk = DataChunk::new();
        chunk.push_vertex(1.0, 2.0, 3.0);
        chunk.push_vertex(-1.0, 5.0, 0.0);
        chunk.push_index(0).unwrap();
        chunk.push_index(1).unwrap();
        chunk.push_index(0).unwrap();
        let bbox = chunk.bbox();
        assert_eq!(bbox.min, [-1.0, 2.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 5.0, 3.0]);
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn index_out_of_range_rejected() {
        let mut chunk = DataChunk::new();
        chunk.push_vertex(0.0, 0.0, 0.0);
        assert!(chunk.push_index(1).is_err());
    }

    #[test]
    fn mismatched_color_component_count_rejected() {
        let mut chunk = DataChunk::new();
        chunk.push_vertex(0.0, 0.0, 0.0);
        chunk
            .push_color(ColorComponents::Rgb, &[255, 0, 0])
            .unwrap();
        chunk.push_vertex(1.0, 0.0, 0.0);
        assert!(chunk
            .push_color(ColorComponents::Rgba, &[0, 255, 0, 255])
            .is_err());
    }

    #[test]
    fn zero_component_count_is_invalid_argument() {
        assert!(matches!(
            ColorComponents::from_count(0),
            Err(Error::InvalidArgument { .. })
        ));
    }
}

// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Material attributes (spec §3), grounded on the ambient/diffuse/specular
//! field layout `physis::mtrl` uses for FFXIV materials, reshaped to the
//! ten-value OBJ illumination model and the five texture map slots this
//! spec requires.

use crate::texture::Texture;
use std::rc::Rc;

/// Three unsigned 8-bit channels. `None` means "unset" (spec's -1 sentinel
/// made explicit as an `Option`).
pub type Color3 = Option<[u8; 3]>;

/// The ten OBJ `illum` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IlluminationModel {
    ColorOnly = 0,
    Diffuse = 1,
    DiffuseSpecular = 2,
    ReflectionRayTrace = 3,
    TransparencyGlassRayTrace = 4,
    ReflectionFresnelRayTrace = 5,
    TransparencyRefractionRayTrace = 6,
    TransparencyRefractionFresnelRayTrace = 7,
    Reflection = 8,
    TransparencyGlass = 9,
    ShadowOnInvisibleSurfaces = 10,
}

impl IlluminationModel {
    pub fn from_u32(v: u32) -> Option<Self> {
        use IlluminationModel::*;
        Some(match v {
            0 => ColorOnly,
            1 => Diffuse,
            2 => DiffuseSpecular,
            3 => ReflectionRayTrace,
            4 => TransparencyGlassRayTrace,
            5 => ReflectionFresnelRayTrace,
            6 => TransparencyRefractionRayTrace,
            7 => TransparencyRefractionFresnelRayTrace,
            8 => Reflection,
            9 => TransparencyGlass,
            10 => ShadowOnInvisibleSurfaces,
            _ => return None,
        })
    }
}

/// Which of a material's five texture map slots is being referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Ambient,
    Diffuse,
    Specular,
    Alpha,
    Bump,
}

/// Material attributes (spec §3). Every color/coefficient field is
/// individually optional; `material_id` is unique within the loader that
/// produced it.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub material_id: u32,
    pub name: Option<String>,

    pub ambient_color: Color3,
    pub diffuse_color: Color3,
    pub specular_color: Color3,

    pub specular_coefficient: Option<f32>,
    /// Transparency in `0..=255`; spec's unset sentinel is `-1`.
    pub transparency: Option<u8>,
    pub illumination_model: Option<IlluminationModel>,

    pub ambient_texture: Option<Rc<Texture>>,
    pub diffuse_texture: Option<Rc<Texture>>,
    pub specular_texture: Option<Rc<Texture>>,
    pub alpha_texture: Option<Rc<Texture>>,
    pub bump_texture: Option<Rc<Texture>>,
}

impl Material {
    pub fn new(material_id: u32) -> Self {
        Self {
            material_id,
            ..Default::default()
        }
    }

    /// `true` if any of the ambient/diffuse/specular channels is set —
    /// the "any channel set" availability flag spec §3 calls for in
    /// addition to per-field "has value".
    pub fn has_any_color(&self) -> bool {
        self.ambient_color.is_some() || self.diffuse_color.is_some() || self.specular_color.is_some()
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Rc<Texture>> {
        match slot {
            TextureSlot::Ambient => self.ambient_texture.as_ref(),
            TextureSlot::Diffuse => self.diffuse_texture.as_ref(),
            TextureSlot::Specular => self.specular_texture.as_ref(),
            TextureSlot::Alpha => self.alpha_texture.as_ref(),
            TextureSlot::Bump => self.bump_texture.as_ref(),
        }
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: Option<Rc<Texture>>) {
        match slot {
            TextureSlot::Ambient => self.ambient_texture = texture,
            TextureSlot::Diffuse => self.diffuse_texture = texture,
            TextureSlot::Specular => self.specular_texture = texture,
            TextureSlot::Alpha => self.alpha_texture = texture,
            TextureSlot::Bump => self.bump_texture = texture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_material_has_no_colors() {
        let m = Material::new(0);
        assert!(!m.has_any_color());
    }

    #[test]
    fn illum_round_trips_the_ten_values() {
        for v in 0..=10u32 {
            assert_eq!(IlluminationModel::from_u32(v).map(|m| m as u32), Some(v));
        }
        assert_eq!(IlluminationModel::from_u32(11), None);
    }
}

// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! MTL material sub-parser (spec §4.2.2): `newmtl`, the three color
//! triples, `Ns`/`d`/`Tr`/`illum`, and the five texture map directives.

use crate::listener::MaterialListener;
use crate::material::{IlluminationModel, Material, TextureSlot};
use crate::texture::Texture;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedMaterialListener = Rc<RefCell<Box<dyn MaterialListener>>>;

fn parse_color<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<[u8; 3]> {
    let r: f32 = tokens.next()?.parse().ok()?;
    let g: f32 = tokens.next()?.parse().ok()?;
    let b: f32 = tokens.next()?.parse().ok()?;
    let scale = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Some([scale(r), scale(g), scale(b)])
}

/// Parses MTL source text into `(name, Material)` pairs in declaration
/// order. `next_texture_id` is shared across every MTL file resolved
/// within one load so texture ids stay stable (spec §8 scenario 6).
pub fn parse_mtl(
    text: &str,
    next_texture_id: &mut u32,
    next_material_id: &mut u32,
    material_listener: Option<&SharedMaterialListener>,
) -> Vec<(String, Rc<Material>)> {
    let mut out = Vec::new();
    let mut current: Option<Material> = None;
    let mut current_name: Option<String> = None;

    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = match tokens.next() {
            Some(d) => d,
            None => continue,
        };
        match directive {
            "newmtl" => {
                if let (Some(name), Some(mat)) = (current_name.take(), current.take()) {
                    out.push((name, Rc::new(mat)));
                }
                let name = tokens.next().unwrap_or("").to_string();
                let id = *next_material_id;
                *next_material_id += 1;
                current_name = Some(name);
                current = Some(Material::new(id));
            }
            "Ka" | "Kd" | "Ks" => {
                if let (Some(mat), Some(color)) = (current.as_mut(), parse_color(tokens)) {
                    match directive {
                        "Ka" => mat.ambient_color = Some(color),
                        "Kd" => mat.diffuse_color = Some(color),
                        _ => mat.specular_color = Some(color),
                    }
                }
            }
            "Ns" => {
                if let (Some(mat), Some(tok)) = (current.as_mut(), tokens.next()) {
                    if let Ok(v) = tok.parse::<f32>() {
                        mat.specular_coefficient = Some(v);
                    }
                }
            }
            "d" | "Tr" => {
                if let (Some(mat), Some(tok)) = (current.as_mut(), tokens.next()) {
                    if let Ok(v) = tok.parse::<f32>() {
                        let opacity = if directive == "Tr" { 1.0 - v } else { v };
                        mat.transparency = Some((opacity.clamp(0.0, 1.0) * 255.0).round() as u8);
                    }
                }
            }
            "illum" => {
                if let (Some(mat), Some(tok)) = (current.as_mut(), tokens.next()) {
                    if let Ok(v) = tok.parse::<u32>() {
                        mat.illumination_model = IlluminationModel::from_u32(v);
                    }
                }
            }
            "map_Ka" | "map_Kd" | "map_Ks" | "map_d" | "map_Bump" | "bump" => {
                let path = tokens.last().map(|s| s.to_string());
                if let (Some(mat), Some(path)) = (current.as_mut(), path) {
                    let id = *next_texture_id;
                    *next_texture_id += 1;
                    let texture = Texture::new(id, Some(path));
                    let valid = material_listener
                        .map(|l| l.borrow_mut().on_validate_texture(&texture))
                        .unwrap_or(true);
                    texture.set_valid(valid);
                    let slot = match directive {
                        "map_Ka" => TextureSlot::Ambient,
                        "map_Kd" => TextureSlot::Diffuse,
                        "map_Ks" => TextureSlot::Specular,
                        "map_d" => TextureSlot::Alpha,
                        _ => TextureSlot::Bump,
                    };
                    mat.set_texture(slot, Some(Rc::new(texture)));
                }
            }
            _ => {}
        }
    }
    if let (Some(name), Some(mat)) = (current_name, current) {
        out.push((name, Rc::new(mat)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colors_coefficients_and_textures() {
        let text = "newmtl wood\nKd 1.0 0.5 0.0\nNs 12.5\nd 0.75\nillum 2\nmap_Kd wood.png\n";
        let mut tex_id = 0;
        let mut mat_id = 0;
        let materials = parse_mtl(text, &mut tex_id, &mut mat_id, None);
        assert_eq!(materials.len(), 1);
        let (name, mat) = &materials[0];
        assert_eq!(name, "wood");
        assert_eq!(mat.diffuse_color, Some([255, 128, 0]));
        assert_eq!(mat.specular_coefficient, Some(12.5));
        assert_eq!(mat.transparency, Some(191));
        assert_eq!(
            mat.illumination_model,
            Some(IlluminationModel::DiffuseSpecular)
        );
        assert!(mat.diffuse_texture.is_some());
        assert_eq!(tex_id, 1);
    }

    #[test]
    fn multiple_materials_keep_independent_state() {
        let text = "newmtl a\nKd 1 1 1\nnewmtl b\nKd 0 0 0\n";
        let mut tex_id = 0;
        let mut mat_id = 0;
        let materials = parse_mtl(text, &mut tex_id, &mut mat_id, None);
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].1.diffuse_color, Some([255, 255, 255]));
        assert_eq!(materials[1].1.diffuse_color, Some([0, 0, 0]));
        assert_eq!(materials[0].1.material_id, 0);
        assert_eq!(materials[1].1.material_id, 1);
    }
}

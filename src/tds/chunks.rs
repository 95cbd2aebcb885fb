// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! 3DS chunk ids (spec §4.2.3) and the 6-byte chunk header record.

use binrw::BinRead;

pub const MAIN: u16 = 0x4D4D;
pub const EDIT3DS: u16 = 0x3D3D;
pub const MATERIAL_BLOCK: u16 = 0xAFFF;
pub const NAMED_OBJECT: u16 = 0x4000;
pub const TRIANGULAR_MESH: u16 = 0x4100;
pub const VERTICES: u16 = 0x4110;
pub const FACES: u16 = 0x4120;
pub const FACES_MATERIAL: u16 = 0x4130;
pub const TEXCOORDS: u16 = 0x4140;
pub const SMOOTH_GROUP: u16 = 0x4150;
pub const LOCAL_COORDINATES: u16 = 0x4160;

pub const MAT_NAME: u16 = 0xA000;
pub const MAT_AMBIENT: u16 = 0xA010;
pub const MAT_DIFFUSE: u16 = 0xA020;
pub const MAT_SPECULAR: u16 = 0xA030;
pub const MAT_SHININESS: u16 = 0xA040;
pub const MAT_TRANSPARENCY: u16 = 0xA050;
pub const MAT_TEXMAP: u16 = 0xA200;
pub const MAT_MAPNAME: u16 = 0xA300;

pub const COLOR_F: u16 = 0x0010;
pub const COLOR_24: u16 = 0x0011;
pub const LIN_COLOR_24: u16 = 0x0012;
pub const LIN_COLOR_F: u16 = 0x0013;
pub const INT_PERCENTAGE: u16 = 0x0030;
pub const FLOAT_PERCENTAGE: u16 = 0x0031;

/// A chunk's 2-byte id and 4-byte length (including these six header
/// bytes), read through `binrw` since it's the one genuinely
/// fixed-layout binary record this decoder needs.
#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct ChunkHeader {
    pub id: u16,
    pub length: u32,
}

// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

#![doc = include_str!("../README.md")]

#[doc(hidden)]
pub const MESHSTREAM_VERSION: &str = env!("CARGO_PKG_VERSION");

// NOTE: brought up to the top-level because these are the most used types.
mod error;
pub use error::{Error, Result};

/// Per-instance loader configuration (spec §6).
pub mod config;

/// Endian-aware primitive byte conversions shared by every format.
pub mod endian;

/// Positioned, endian-aware reader/writer over a file or memory map.
pub mod reader;

/// The [`chunk::DataChunk`] value type every loader emits.
pub mod chunk;

/// Material attributes referenced by a chunk.
pub mod material;

/// Texture descriptors referenced by a material.
pub mod texture;

/// Host-supplied callback interfaces (progress, locking, material/texture
/// resolution).
pub mod listener;

/// Fan triangulation shared by the PLY and OBJ decoders.
pub mod triangulate;

/// The [`loader::Loader`]/[`loader::LoaderIterator`] contracts, the locking
/// protocol, and the magic-sniffing factory every concrete decoder plugs
/// into.
pub mod loader;

/// The Stanford PLY decoder (ASCII and binary, either endianness).
pub mod ply;

/// The Wavefront OBJ decoder and its MTL material sub-parser.
pub mod obj;

/// The Autodesk 3DS decoder.
pub mod tds;

/// The STL decoder (ASCII and binary, including the VisCAM/Materialise
/// per-facet color convention).
pub mod stl;

/// The crate's own internal binary codec (spec §4.2.5): a compact
/// re-encoding of any loader's chunk stream, with texture side files.
pub mod binary;

pub use chunk::{BoundingBox, ColorComponents, DataChunk};
pub use loader::{open, Loader, LoaderIterator, MeshFormat};
pub use material::{IlluminationModel, Material, TextureSlot};
pub use texture::Texture;

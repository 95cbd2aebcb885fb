// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Callback interfaces supplied by the host (spec §6 "Listener
//! interfaces"). physis has no callback protocol of its own (it reports
//! progress purely through `tracing`); these traits generalize that into
//! an explicit, typed listener hierarchy per format family.

use crate::texture::Texture;

/// Fired by every [`crate::loader::Loader`] regardless of format.
///
/// During any of these callbacks the loader is locked (spec §5); the
/// trait receives no mutable loader handle, only enforcing that at the
/// type level the way physis enforces read-only access to `GameData`
/// during extraction.
pub trait LoaderListener {
    /// Fires exactly once before the first chunk is produced.
    fn on_load_start(&mut self) {}

    /// Fires exactly once after the last chunk is produced.
    fn on_load_end(&mut self) {}

    /// Fires with monotonically non-decreasing `progress` in `[0, 1]`;
    /// consecutive calls differ by at least 0.01.
    fn on_load_progress_change(&mut self, progress: f32) {
        let _ = progress;
    }
}

/// A listener that does nothing; the default for loaders constructed
/// without `set_listener`.
#[derive(Default)]
pub struct NullListener;

impl LoaderListener for NullListener {}

/// OBJ-specific: resolves `mtllib` directives to a material sub-loader.
pub trait MaterialLoaderRequest {
    /// `path` is the path as written in the `mtllib` directive, typically
    /// resolved relative to the OBJ file's directory by the host.
    fn on_material_loader_requested(&mut self, path: &str) -> Option<Box<dyn std::io::Read>>;
}

/// Material-specific: lets the host accept or reject a referenced texture
/// (e.g. by checking the image actually decodes).
pub trait MaterialListener {
    fn on_validate_texture(&mut self, texture: &Texture) -> bool {
        let _ = texture;
        true
    }
}

/// Binary-read specific: asks the host for a destination to materialize
/// a referenced texture into, and reports when its bytes are available.
pub trait BinaryReadListener {
    fn on_texture_received(&mut self, texture_id: u32, width: u32, height: u32) -> std::io::Result<std::fs::File>;

    fn on_texture_data_available(
        &mut self,
        texture_id: u32,
        width: u32,
        height: u32,
    ) -> bool {
        let _ = (texture_id, width, height);
        true
    }
}

/// Mesh-write specific: the internal binary encoder's progress and
/// texture side-file protocol (spec §6).
pub trait BinaryWriteListener {
    fn on_write_start(&mut self) {}
    fn on_write_end(&mut self) {}
    fn on_write_progress_change(&mut self, progress: f32) {
        let _ = progress;
    }

    /// Called once per chunk as it is serialized; lets the host observe
    /// the stream being written without affecting it.
    fn on_chunk_available(&mut self, chunk: &crate::chunk::DataChunk) {
        let _ = chunk;
    }

    /// Lets the host supply a destination file for a texture's raw bytes;
    /// returning `None` skips writing that texture's side file.
    fn on_texture_received(&mut self, width: u32, height: u32) -> Option<std::fs::File> {
        let _ = (width, height);
        None
    }

    fn on_texture_data_processed(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }
}

/// A listener that does nothing; the default for the binary writer
/// constructed without an explicit one.
#[derive(Default)]
pub struct NullWriteListener;

impl BinaryWriteListener for NullWriteListener {}

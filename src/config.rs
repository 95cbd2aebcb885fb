// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-instance loader configuration. All fields have
//! documented defaults and minimums; construction never fails, but
//! [`LoaderConfig::validate`] must be called (as every `Loader::set_file`
//! implementation does) before a value is trusted.

use crate::error::{Error, Result};

/// Configuration for the PLY decoder (and, where noted, the chunking
/// policy shared by OBJ/3DS/STL).
#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// Upper bound on vertices held by a single [`crate::chunk::DataChunk`].
    /// Default `0xFFFF`; minimum `1`.
    pub max_vertices_in_chunk: u32,
    /// When `false` (default), a vertex referenced again within the same
    /// chunk reuses its existing chunk-local index instead of being
    /// appended a second time.
    pub allow_duplicate_vertices_in_chunk: bool,
    /// Bound on the PLY stream-position cache (spec §4.2.1). Default
    /// 1,000,000; minimum `1`.
    pub max_stream_positions: u32,
    /// Files smaller than this many bytes may be loaded entirely into
    /// memory; larger files rely on positioned I/O. Default 50,000,000.
    pub file_size_limit_to_keep_in_memory: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_vertices_in_chunk: 0xFFFF,
            allow_duplicate_vertices_in_chunk: false,
            max_stream_positions: 1_000_000,
            file_size_limit_to_keep_in_memory: 50_000_000,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_vertices_in_chunk < 1 {
            return Err(Error::InvalidArgument {
                field: "maxVerticesInChunk",
            });
        }
        if self.max_stream_positions < 1 {
            return Err(Error::InvalidArgument {
                field: "maxStreamPositions",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(LoaderConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_vertices_is_rejected() {
        let mut cfg = LoaderConfig::default();
        cfg.max_vertices_in_chunk = 0;
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidArgument {
                field: "maxVerticesInChunk"
            })
        ));
    }

    #[test]
    fn zero_max_stream_positions_is_rejected() {
        let mut cfg = LoaderConfig::default();
        cfg.max_stream_positions = 0;
        assert!(cfg.validate().is_err());
    }
}

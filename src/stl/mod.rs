// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! STL decoder (spec §4.2.4): ASCII `facet normal ... outer loop ...
//! endloop endfacet` blocks, or the 80-byte-header/triangle-count binary
//! layout. Every triangle contributes three fresh vertices — STL has no
//! shared-vertex concept, so no de-duplication is attempted here.

use crate::chunk::{ColorComponents, DataChunk};
use crate::config::LoaderConfig;
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::loader::{
    null_listener, FileBinding, Lock, Loader, LoaderIterator, MeshFormat, SharedListener,
    SharedLock,
};
use crate::reader::Source;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Scans a binary STL's 80-byte header for the VisCAM/Materialise Magics
/// `COLOR=` convention: a literal ASCII marker followed by a default RGB
/// triple. Only binary STL carries a header to scan; ASCII STL has no
/// equivalent attribute byte to decode a per-facet color from.
fn scan_color_header(header: &[u8; 80]) -> Option<[u8; 3]> {
    let marker = b"COLOR=";
    let pos = header
        .windows(marker.len())
        .position(|w| w == marker)?;
    let start = pos + marker.len();
    if start + 3 > header.len() {
        return None;
    }
    Some([header[start], header[start + 1], header[start + 2]])
}

/// Decodes a VisCAM-style facet attribute word into an RGB triple: if bit
/// 15 is set the facet carries its own 5-5-5 color, otherwise the
/// header's default color applies.
fn facet_color(attribute: u16, default_color: [u8; 3]) -> [u8; 3] {
    if attribute & 0x8000 == 0 {
        return default_color;
    }
    let scale = |v: u16| ((v as u32 * 255) / 31) as u8;
    [
        scale((attribute >> 10) & 0x1F),
        scale((attribute >> 5) & 0x1F),
        scale(attribute & 0x1F),
    ]
}

/// STL [`Loader`]. `load()` sniffs ASCII vs. binary by the same rule as
/// [`crate::loader::sniff_format_bytes`] and dispatches to [`StlIterator`].
pub struct StlLoader {
    lock: SharedLock,
    file: FileBinding,
    config: LoaderConfig,
    listener: SharedListener,
}

impl StlLoader {
    pub fn new() -> Self {
        Self {
            lock: Rc::new(Lock::default()),
            file: FileBinding::default(),
            config: LoaderConfig::default(),
            listener: null_listener(),
        }
    }

    pub fn with_config(config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }
}

impl Default for StlLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for StlLoader {
    fn mesh_format(&self) -> MeshFormat {
        MeshFormat::Stl
    }

    fn has_file(&self) -> bool {
        self.file.is_bound()
    }

    fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    fn set_file(&mut self, path: &Path) -> Result<()> {
        self.lock.check_unlocked()?;
        self.file.bind(path);
        Ok(())
    }

    fn set_listener(&mut self, listener: SharedListener) -> Result<()> {
        self.lock.check_unlocked()?;
        self.listener = listener;
        Ok(())
    }

    fn is_valid_file(&self) -> Result<bool> {
        let path = self.file.require()?;
        let bytes = std::fs::read(path)?;
        Ok(matches!(
            crate::loader::sniff_format_bytes(&bytes),
            MeshFormat::Stl
        ))
    }

    fn load(&mut self) -> Result<Box<dyn LoaderIterator>> {
        self.lock.acquire()?;
        let path = match self.file.require() {
            Ok(p) => p.to_path_buf(),
            Err(e) => {
                self.lock.release();
                return Err(e);
            }
        };
        match StlIterator::open(&path, self.config, Rc::clone(&self.listener), Rc::clone(&self.lock)) {
            Ok(iter) => Ok(Box::new(iter)),
            Err(e) => {
                self.lock.release();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        self.lock.release();
    }
}

/// Drives chunk assembly over a single opened STL file (spec §4.2.4).
pub struct StlIterator {
    source: Source,
    config: LoaderConfig,
    listener: SharedListener,
    lock: SharedLock,

    ascii: bool,
    total_triangles: u64,
    triangles_emitted: u64,
    default_color: Option<[u8; 3]>,

    current_chunk: DataChunk,
    started: bool,
    finished: bool,
    last_progress: f32,
}

impl StlIterator {
    fn open(path: &Path, config: LoaderConfig, listener: SharedListener, lock: SharedLock) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ascii = !bytes.starts_with(b"solid ") || {
            // An ASCII-looking "solid " prefix can still be a binary file
            // (spec §6); trust the binary length formula first.
            bytes.len() < 84
                || u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as u64 * 50 + 84
                    != bytes.len() as u64
        };

        let mut source = Source::open(path, config.file_size_limit_to_keep_in_memory, Endian::Little)?;
        let (total_triangles, default_color) = if ascii {
            (0, None)
        } else {
            let mut header = [0u8; 80];
            source.read_fully(&mut header)?;
            let count = source.read_unsigned_int_endian(Endian::Little)? as u64;
            (count, scan_color_header(&header))
        };

        debug!(ascii, total_triangles, "opened STL file");

        Ok(Self {
            source,
            config,
            listener,
            lock,
            ascii,
            total_triangles,
            triangles_emitted: 0,
            default_color,
            current_chunk: DataChunk::new(),
            started: false,
            finished: false,
            last_progress: 0.0,
        })
    }

    fn report_progress(&mut self) {
        let progress = if self.ascii {
            let len = self.source.len();
            if len > 0 {
                self.source.position() as f32 / len as f32
            } else {
                1.0
            }
        } else if self.total_triangles > 0 {
            self.triangles_emitted as f32 / self.total_triangles as f32
        } else {
            1.0
        };
        if progress - self.last_progress >= 0.01 || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.listener.borrow_mut().on_load_progress_change(progress);
        }
    }

    fn push_triangle(&mut self, normal: [f32; 3], verts: [[f32; 3]; 3], color: Option<[u8; 3]>) -> Result<()> {
        let mut locals = [0u32; 3];
        for (i, v) in verts.iter().enumerate() {
            locals[i] = self.current_chunk.push_vertex(v[0], v[1], v[2]);
            self.current_chunk.push_normal(normal[0], normal[1], normal[2]);
            if let Some(c) = color {
                self.current_chunk.push_color(ColorComponents::Rgb, &c)?;
            }
        }
        for local in locals {
            self.current_chunk.push_index(local)?;
        }
        Ok(())
    }

    fn fill_chunk_binary(&mut self) -> Result<()> {
        loop {
            if self.triangles_emitted >= self.total_triangles {
                self.finished = true;
                break;
            }
            let normal = [
                self.source.read_float_endian(Endian::Little)?,
                self.source.read_float_endian(Endian::Little)?,
                self.source.read_float_endian(Endian::Little)?,
            ];
            let mut verts = [[0.0f32; 3]; 3];
            for v in verts.iter_mut() {
                *v = [
                    self.source.read_float_endian(Endian::Little)?,
                    self.source.read_float_endian(Endian::Little)?,
                    self.source.read_float_endian(Endian::Little)?,
                ];
            }
            let attribute = self.source.read_unsigned_short_endian(Endian::Little)? as u16;
            let color = self.default_color.map(|d| facet_color(attribute, d));
            self.push_triangle(normal, verts, color)?;
            self.triangles_emitted += 1;
            self.report_progress();
            if self.current_chunk.vertex_count() + 3 > self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }

    fn next_ascii_word(&mut self) -> Result<Option<String>> {
        self.source.read_word()
    }

    fn expect_word(&mut self, expected: &str) -> Result<()> {
        match self.next_ascii_word()? {
            Some(w) if w.eq_ignore_ascii_case(expected) => Ok(()),
            Some(w) => Err(Error::loader(format!("expected '{expected}', found '{w}'"))),
            None => Err(Error::loader(format!("expected '{expected}', found end of file"))),
        }
    }

    fn read_ascii_float(&mut self) -> Result<f32> {
        let tok = self
            .next_ascii_word()?
            .ok_or_else(|| Error::loader("unexpected end of ASCII STL body"))?;
        tok.parse()
            .map_err(|_| Error::loader(format!("'{tok}' is not a number")))
    }

    fn read_ascii_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_ascii_float()?, self.read_ascii_float()?, self.read_ascii_float()?])
    }

    fn fill_chunk_ascii(&mut self) -> Result<()> {
        loop {
            let Some(word) = self.next_ascii_word()? else {
                self.finished = true;
                break;
            };
            match word.to_ascii_lowercase().as_str() {
                "solid" => {
                    // Optional name token; skip it unless the next word is
                    // itself a keyword (an unnamed solid).
                }
                "facet" => {
                    self.expect_word("normal")?;
                    let normal = self.read_ascii_vec3()?;
                    self.expect_word("outer")?;
                    self.expect_word("loop")?;
                    let mut verts = [[0.0f32; 3]; 3];
                    for v in verts.iter_mut() {
                        self.expect_word("vertex")?;
                        *v = self.read_ascii_vec3()?;
                    }
                    self.expect_word("endloop")?;
                    self.expect_word("endfacet")?;
                    self.push_triangle(normal, verts, None)?;
                    self.triangles_emitted += 1;
                }
                "endsolid" => {
                    self.finished = true;
                    break;
                }
                _ => {}
            }
            self.report_progress();
            if self.current_chunk.vertex_count() + 3 > self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for StlIterator {
    /// Releases the shared lock if the iterator is dropped before
    /// exhaustion, so an abandoned "read a few chunks" caller doesn't
    /// leave the loader permanently locked.
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl LoaderIterator for StlIterator {
    fn has_next(&self) -> bool {
        !self.finished || !self.current_chunk.is_empty()
    }

    fn next(&mut self) -> Result<Option<DataChunk>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            self.listener.borrow_mut().on_load_start();
        }
        self.current_chunk = DataChunk::new();

        let result = if self.ascii {
            self.fill_chunk_ascii()
        } else {
            self.fill_chunk_binary()
        };

        if let Err(e) = result {
            self.finished = true;
            self.lock.release();
            return Err(e);
        }

        if self.finished {
            self.listener.borrow_mut().on_load_end();
            self.lock.release();
        }

        if self.current_chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(std::mem::replace(&mut self.current_chunk, DataChunk::new())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("meshstream-stl-{}-{}", std::process::id(), name));
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[test]
    fn ascii_single_triangle() {
        let text = b"solid cube\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid cube\n";
        let path = write_temp("ascii.stl", text);
        let mut loader = StlLoader::new();
        loader.set_file(&path).unwrap();
        assert!(loader.is_valid_file().unwrap());
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk");
        assert_eq!(chunk.vertex_count(), 3);
        assert_eq!(chunk.indices(), &[0, 1, 2]);
        assert!(chunk.has_normals());
        assert!(!chunk.has_colors());
        assert!(iter.next().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn binary_triangle_without_color_header() {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let path = write_temp("binary.stl", &bytes);
        let mut loader = StlLoader::new();
        loader.set_file(&path).unwrap();
        assert!(loader.is_valid_file().unwrap());
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk");
        assert_eq!(chunk.vertex_count(), 3);
        assert!(!chunk.has_colors());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn binary_triangle_with_viscam_color_header() {
        let mut header = vec![0u8; 80];
        header[0..6].copy_from_slice(b"COLOR=");
        header[6] = 255;
        header[7] = 0;
        header[8] = 0;
        let mut bytes = header;
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let path = write_temp("color.stl", &bytes);
        let mut loader = StlLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().unwrap();
        assert!(chunk.has_colors());
        assert_eq!(chunk.colors(), &[255, 0, 0, 255, 0, 0, 255, 0, 0]);
        std::fs::remove_file(&path).ok();
    }
}

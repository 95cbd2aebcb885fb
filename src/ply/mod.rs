// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! PLY decoder (spec §4.2.1): header parsing, ASCII/binary body readers,
//! and a chunk assembler that triangulates faces and resolves vertex
//! references through a bounded stream-position cache.

mod cache;
mod header;

use crate::chunk::{ColorComponents, DataChunk};
use crate::config::LoaderConfig;
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::loader::{
    null_listener, FileBinding, Lock, Loader, LoaderIterator, MeshFormat, SharedListener,
    SharedLock,
};
use crate::reader::Source;
use crate::triangulate::fan_triangulate;
use cache::PositionCache;
use header::{Element, Header, PropertyKind, ScalarType, StorageMode, TEXCOORD_ALIASES};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Reads one scalar, in text or binary form depending on `ascii`.
fn read_scalar(source: &mut Source, ascii: bool, endian: Endian, t: ScalarType) -> Result<f64> {
    if ascii {
        let tok = source
            .read_word()?
            .ok_or_else(|| Error::loader("unexpected end of PLY body"))?;
        t.parse_ascii(&tok)
    } else {
        t.read_binary(source, endian)
    }
}

fn read_list_values(
    source: &mut Source,
    ascii: bool,
    endian: Endian,
    length_type: ScalarType,
    value_type: ScalarType,
) -> Result<Vec<f64>> {
    let len = read_scalar(source, ascii, endian, length_type)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_scalar(source, ascii, endian, value_type)?);
    }
    Ok(out)
}

/// Reads every property of one element instance in declared order.
/// Scalars land at their declared position in the returned vector; list
/// properties are fully consumed (so the cursor lands correctly on the
/// next instance) but contribute no slot, since schemas never reference a
/// list-typed property by position.
fn read_element_scalars(
    source: &mut Source,
    ascii: bool,
    endian: Endian,
    element: &Element,
) -> Result<Vec<f64>> {
    let mut values = vec![0.0f64; element.properties.len()];
    for (idx, property) in element.properties.iter().enumerate() {
        match property.kind {
            PropertyKind::Scalar(t) => values[idx] = read_scalar(source, ascii, endian, t)?,
            PropertyKind::List {
                length_type,
                value_type,
            } => {
                read_list_values(source, ascii, endian, length_type, value_type)?;
            }
        }
    }
    Ok(values)
}

/// Reads one face instance, returning the values of its designated
/// vertex-index list property (other properties are read and discarded,
/// in declared order, so the cursor advances correctly).
fn read_face_instance(
    source: &mut Source,
    ascii: bool,
    endian: Endian,
    element: &Element,
    list_prop_index: usize,
) -> Result<Vec<i64>> {
    let mut result = Vec::new();
    for (idx, property) in element.properties.iter().enumerate() {
        match property.kind {
            PropertyKind::Scalar(t) => {
                read_scalar(source, ascii, endian, t)?;
            }
            PropertyKind::List {
                length_type,
                value_type,
            } => {
                let values = read_list_values(source, ascii, endian, length_type, value_type)?;
                if idx == list_prop_index {
                    result = values.into_iter().map(|v| v.round() as i64).collect();
                }
            }
        }
    }
    Ok(result)
}

fn scalar_index(element: &Element, name: &str) -> Option<usize> {
    element
        .properties
        .iter()
        .position(|p| p.name == name && matches!(p.kind, PropertyKind::Scalar(_)))
}

struct ColorSchema {
    r: usize,
    g: usize,
    b: usize,
    a: Option<usize>,
    components: ColorComponents,
}

struct VertexSchema {
    x: usize,
    y: usize,
    z: usize,
    normal: Option<(usize, usize, usize)>,
    texcoord: Option<(usize, usize)>,
    color: Option<ColorSchema>,
}

fn build_vertex_schema(element: &Element) -> Result<VertexSchema> {
    let x = scalar_index(element, "x").ok_or_else(|| Error::loader("vertex element missing 'x'"))?;
    let y = scalar_index(element, "y").ok_or_else(|| Error::loader("vertex element missing 'y'"))?;
    let z = scalar_index(element, "z").ok_or_else(|| Error::loader("vertex element missing 'z'"))?;

    let normal = match (
        scalar_index(element, "nx"),
        scalar_index(element, "ny"),
        scalar_index(element, "nz"),
    ) {
        (Some(a), Some(b), Some(c)) => Some((a, b, c)),
        _ => None,
    };

    let mut texcoord = None;
    for (u_name, v_name) in TEXCOORD_ALIASES {
        if let (Some(a), Some(b)) = (scalar_index(element, u_name), scalar_index(element, v_name)) {
            texcoord = Some((a, b));
            break;
        }
    }

    let color = match (
        scalar_index(element, "red"),
        scalar_index(element, "green"),
        scalar_index(element, "blue"),
    ) {
        (Some(r), Some(g), Some(b)) => {
            let a = scalar_index(element, "alpha");
            let components = if a.is_some() {
                ColorComponents::Rgba
            } else {
                ColorComponents::Rgb
            };
            Some(ColorSchema { r, g, b, a, components })
        }
        _ => None,
    };

    Ok(VertexSchema {
        x,
        y,
        z,
        normal,
        texcoord,
        color,
    })
}

fn find_face_list_property(element: &Element) -> Option<usize> {
    element.properties.iter().position(|p| {
        matches!(p.kind, PropertyKind::List { .. }) && (p.name == "vertex_indices" || p.name == "vertex_index")
    })
}

/// PLY [`Loader`]. Handles all three storage modes; `load()` dispatches to
/// [`PlyIterator`] which does the actual header/body work.
pub struct PlyLoader {
    lock: SharedLock,
    file: FileBinding,
    config: LoaderConfig,
    listener: SharedListener,
}

impl PlyLoader {
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

impl Default for PlyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for PlyLoader {
    fn mesh_format(&self) -> MeshFormat {
        MeshFormat::Ply
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
        use std::io::Read;
        let path = self.file.require()?;
        let mut magic = [0u8; 4];
        let mut f = std::fs::File::open(path)?;
        match f.read_exact(&mut magic) {
            Ok(()) => Ok(&magic == b"ply\n"),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(Error::from(e)),
        }
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
        match PlyIterator::open(&path, self.config, Rc::clone(&self.listener), Rc::clone(&self.lock)) {
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

/// Drives chunk assembly over a single opened PLY file (spec §4.2.1).
pub struct PlyIterator {
    source: Source,
    ascii: bool,
    endian: Endian,
    config: LoaderConfig,
    listener: SharedListener,
    lock: SharedLock,

    vertex_element: Element,
    vertex_schema: VertexSchema,
    vertex_base_offset: u64,
    vertex_fixed_size: Option<usize>,
    vertex_total: u64,
    vertices_emitted: u64,
    position_cache: PositionCache,

    face_element: Option<Element>,
    face_list_prop_index: usize,
    faces_total: u64,
    faces_read: u64,
    face_cursor: u64,

    current_chunk: DataChunk,
    dedup: HashMap<u64, u32>,
    started: bool,
    finished: bool,
    last_progress: f32,
}

impl PlyIterator {
    fn open(path: &Path, config: LoaderConfig, listener: SharedListener, lock: SharedLock) -> Result<Self> {
        let mut source = Source::open(path, config.file_size_limit_to_keep_in_memory, Endian::NATIVE)?;
        let header = Header::parse(&mut source)?;
        let endian = header.storage_mode.endian().unwrap_or(Endian::NATIVE);
        source.set_default_endian(endian);
        let ascii = header.storage_mode == StorageMode::Ascii;

        let vertex_idx = header
            .elements
            .iter()
            .position(|e| e.name == "vertex")
            .ok_or_else(|| Error::loader("missing 'vertex' element"))?;
        let vertex_element = header.elements[vertex_idx].clone();
        let vertex_schema = build_vertex_schema(&vertex_element)?;

        let face_idx = header
            .elements
            .iter()
            .enumerate()
            .find(|(idx, e)| *idx > vertex_idx && find_face_list_property(e).is_some())
            .map(|(idx, _)| idx);

        source.seek(header.body_offset)?;
        for element in &header.elements[..vertex_idx] {
            for _ in 0..element.count {
                read_element_scalars(&mut source, ascii, endian, element)?;
            }
        }

        let vertex_base_offset = source.position();
        let vertex_fixed_size = if ascii {
            None
        } else {
            vertex_element.fixed_record_size()
        };
        let mut position_cache = PositionCache::new(config.max_stream_positions as usize);

        let (face_element, face_list_prop_index, faces_total) = if let Some(fidx) = face_idx {
            if let Some(size) = vertex_fixed_size {
                source.skip(vertex_element.count * size as u64)?;
            } else {
                for idx in 0..vertex_element.count {
                    position_cache.insert(idx, source.position());
                    read_element_scalars(&mut source, ascii, endian, &vertex_element)?;
                }
            }
            for element in &header.elements[vertex_idx + 1..fidx] {
                for _ in 0..element.count {
                    read_element_scalars(&mut source, ascii, endian, element)?;
                }
            }
            let face_element = header.elements[fidx].clone();
            let list_idx = find_face_list_property(&face_element)
                .ok_or_else(|| Error::loader("face element missing vertex_indices"))?;
            let total = face_element.count;
            (Some(face_element), list_idx, total)
        } else {
            (None, 0, 0)
        };

        debug!(
            vertices = vertex_element.count,
            faces = faces_total,
            ascii,
            "opened PLY body"
        );

        let face_cursor = source.position();
        Ok(Self {
            source,
            ascii,
            endian,
            config,
            listener,
            lock,
            vertex_total: vertex_element.count,
            vertex_element,
            vertex_schema,
            vertex_base_offset,
            vertex_fixed_size,
            vertices_emitted: 0,
            position_cache,
            face_element,
            face_list_prop_index,
            faces_total,
            faces_read: 0,
            face_cursor,
            current_chunk: DataChunk::new(),
            dedup: HashMap::new(),
            started: false,
            finished: false,
            last_progress: 0.0,
        })
    }

    fn vertex_offset(&mut self, i: u64) -> Result<u64> {
        if let Some(size) = self.vertex_fixed_size {
            return Ok(self.vertex_base_offset + i * size as u64);
        }
        if let Some(offset) = self.position_cache.get(i) {
            return Ok(offset);
        }
        self.rescan_to(i)
    }

    /// Cache miss fallback (spec §9): rescans the vertex element from its
    /// start, reseeding the cache as it goes.
    fn rescan_to(&mut self, target: u64) -> Result<u64> {
        self.source.seek(self.vertex_base_offset)?;
        let mut offset = self.vertex_base_offset;
        for idx in 0..=target {
            self.position_cache.insert(idx, offset);
            if idx == target {
                return Ok(offset);
            }
            read_element_scalars(&mut self.source, self.ascii, self.endian, &self.vertex_element)?;
            offset = self.source.position();
        }
        unreachable!("loop always returns at idx == target")
    }

    fn resolve_vertex(&mut self, vref: u64) -> Result<u32> {
        if !self.config.allow_duplicate_vertices_in_chunk {
            if let Some(&local) = self.dedup.get(&vref) {
                return Ok(local);
            }
        }
        let offset = self.vertex_offset(vref)?;
        self.source.seek(offset)?;
        let values = read_element_scalars(&mut self.source, self.ascii, self.endian, &self.vertex_element)?;
        let schema = &self.vertex_schema;
        let local = self
            .current_chunk
            .push_vertex(values[schema.x] as f32, values[schema.y] as f32, values[schema.z] as f32);
        if let Some((a, b, c)) = schema.normal {
            self.current_chunk
                .push_normal(values[a] as f32, values[b] as f32, values[c] as f32);
        }
        if let Some((a, b)) = schema.texcoord {
            self.current_chunk
                .push_texture_coordinate(values[a] as f32, values[b] as f32);
        }
        if let Some(color) = &schema.color {
            let mut channels = [values[color.r] as u8, values[color.g] as u8, values[color.b] as u8, 0u8];
            let n = if let Some(a) = color.a {
                channels[3] = values[a] as u8;
                4
            } else {
                3
            };
            self.current_chunk.push_color(color.components, &channels[..n])?;
        }
        self.dedup.insert(vref, local);
        Ok(local)
    }

    fn report_progress(&mut self) {
        let progress = if self.faces_total > 0 {
            self.faces_read as f32 / self.faces_total as f32
        } else if self.vertex_total > 0 {
            self.vertices_emitted as f32 / self.vertex_total as f32
        } else {
            1.0
        };
        if progress - self.last_progress >= 0.01 || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.listener.borrow_mut().on_load_progress_change(progress);
        }
    }

    fn fill_chunk_from_faces(&mut self) -> Result<()> {
        let face_element = self.face_element.clone().expect("checked by caller");
        loop {
            if self.faces_read >= self.faces_total {
                self.finished = true;
                break;
            }
            self.source.seek(self.face_cursor)?;
            let indices = read_face_instance(
                &mut self.source,
                self.ascii,
                self.endian,
                &face_element,
                self.face_list_prop_index,
            )?;
            self.faces_read += 1;
            self.face_cursor = self.source.position();

            for tri in fan_triangulate(&indices) {
                for vref in tri {
                    let local = self.resolve_vertex(vref as u64)?;
                    self.current_chunk.push_index(local)?;
                }
            }
            self.report_progress();
            if self.current_chunk.vertex_count() >= self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }

    fn fill_chunk_from_vertices(&mut self) -> Result<()> {
        loop {
            if self.vertices_emitted >= self.vertex_total {
                self.finished = true;
                break;
            }
            let values =
                read_element_scalars(&mut self.source, self.ascii, self.endian, &self.vertex_element)?;
            let schema = &self.vertex_schema;
            self.current_chunk
                .push_vertex(values[schema.x] as f32, values[schema.y] as f32, values[schema.z] as f32);
            if let Some((a, b, c)) = schema.normal {
                self.current_chunk
                    .push_normal(values[a] as f32, values[b] as f32, values[c] as f32);
            }
            if let Some((a, b)) = schema.texcoord {
                self.current_chunk
                    .push_texture_coordinate(values[a] as f32, values[b] as f32);
            }
            if let Some(color) = &schema.color {
                let mut channels = [values[color.r] as u8, values[color.g] as u8, values[color.b] as u8, 0u8];
                let n = if let Some(a) = color.a {
                    channels[3] = values[a] as u8;
                    4
                } else {
                    3
                };
                self.current_chunk.push_color(color.components, &channels[..n])?;
            }
            self.vertices_emitted += 1;
            self.report_progress();
            if self.current_chunk.vertex_count() >= self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for PlyIterator {
    /// Releases the shared lock if the iterator is dropped before
    /// exhaustion, so an abandoned "read a few chunks" caller doesn't
    /// leave the loader permanently locked.
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl LoaderIterator for PlyIterator {
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
        self.dedup.clear();

        let result = if self.face_element.is_some() {
            self.fill_chunk_from_faces()
        } else {
            self.fill_chunk_from_vertices()
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
    use crate::listener::LoaderListener;
    use std::cell::RefCell;
    use std::io::Write as _;

    fn write_temp(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("meshstream-ply-{}-{}", std::process::id(), name));
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[derive(Default)]
    struct RecordingListener {
        starts: u32,
        ends: u32,
        progress: Vec<f32>,
    }

    impl LoaderListener for RecordingListener {
        fn on_load_start(&mut self) {
            self.starts += 1;
        }
        fn on_load_end(&mut self) {
            self.ends += 1;
        }
        fn on_load_progress_change(&mut self, progress: f32) {
            self.progress.push(progress);
        }
    }

    #[test]
    fn ascii_smoke_test_yields_one_chunk_with_three_indices() {
        let text = b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        let path = write_temp("ascii-smoke.ply", text);
        let mut loader = PlyLoader::new();
        loader.set_file(&path).unwrap();
        assert!(loader.is_valid_file().unwrap());
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk");
        assert_eq!(chunk.vertex_count(), 3);
        assert_eq!(chunk.indices(), &[0, 1, 2]);
        assert_eq!(chunk.bbox().min, [0.0, 0.0, 0.0]);
        assert_eq!(chunk.bbox().max, [1.0, 1.0, 0.0]);
        assert!(iter.next().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn binary_little_and_big_endian_agree() {
        fn build(endian_token: &str, write: impl Fn(&mut Source)) -> std::path::PathBuf {
            let header = format!(
                "ply\nformat {endian_token} 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n"
            );
            let path = std::env::temp_dir().join(format!(
                "meshstream-ply-{}-{endian_token}.ply",
                std::process::id()
            ));
            {
                use crate::reader::{PositionedIo, StreamBackend};
                let backend = StreamBackend::create(&path).unwrap();
                let mut io = PositionedIo::new(backend);
                io.write_ascii(&header).unwrap();
                let mut source = Source::Stream(io);
                write(&mut source);
            }
            path
        }

        let endian = if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        };
        let _ = endian;

        let write_body = |endian: Endian| {
            move |source: &mut Source| {
                if let Source::Stream(io) = source {
                    io.write_float_endian(endian, 1.0).unwrap();
                    io.write_float_endian(endian, 2.0).unwrap();
                    io.write_float_endian(endian, 3.0).unwrap();
                    io.write_byte(10).unwrap();
                    io.write_byte(20).unwrap();
                    io.write_byte(30).unwrap();
                    io.write_float_endian(endian, 4.0).unwrap();
                    io.write_float_endian(endian, 5.0).unwrap();
                    io.write_float_endian(endian, 6.0).unwrap();
                    io.write_byte(40).unwrap();
                    io.write_byte(50).unwrap();
                    io.write_byte(60).unwrap();
                    io.write_float_endian(endian, 7.0).unwrap();
                    io.write_float_endian(endian, 8.0).unwrap();
                    io.write_float_endian(endian, 9.0).unwrap();
                    io.write_byte(70).unwrap();
                    io.write_byte(80).unwrap();
                    io.write_byte(90).unwrap();
                    io.write_byte(3).unwrap();
                    io.write_int_endian(endian, 0).unwrap();
                    io.write_int_endian(endian, 1).unwrap();
                    io.write_int_endian(endian, 2).unwrap();
                }
            }
        };

        let big_path = build("binary_big_endian", write_body(Endian::Big));
        let little_path = build("binary_little_endian", write_body(Endian::Little));

        let mut big_loader = PlyLoader::new();
        big_loader.set_file(&big_path).unwrap();
        let mut big_iter = big_loader.load().unwrap();
        let big_chunk = big_iter.next().unwrap().unwrap();

        let mut little_loader = PlyLoader::new();
        little_loader.set_file(&little_path).unwrap();
        let mut little_iter = little_loader.load().unwrap();
        let little_chunk = little_iter.next().unwrap().unwrap();

        assert_eq!(big_chunk.vertices(), little_chunk.vertices());
        assert_eq!(big_chunk.colors(), little_chunk.colors());
        assert_eq!(big_chunk.indices(), little_chunk.indices());
        assert_eq!(big_chunk.bbox(), little_chunk.bbox());

        std::fs::remove_file(&big_path).ok();
        std::fs::remove_file(&little_path).ok();
    }

    #[test]
    fn listener_sees_one_start_and_one_end() {
        let text = b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        let path = write_temp("listener.ply", text);
        let listener = Rc::new(RefCell::new(Box::new(RecordingListener::default()) as Box<dyn LoaderListener>));
        let mut loader = PlyLoader::new();
        loader.set_file(&path).unwrap();
        loader.set_listener(Rc::clone(&listener)).unwrap();
        // set_file/set_listener reject with Error::Locked while an
        // iterator is live (spec §5); the lock is the runtime Rc<Lock>
        // shared with the iterator, not a borrow of `loader`.
        assert!(!loader.is_locked());
        {
            let mut iter = loader.load().unwrap();
            while iter.next().unwrap().is_some() {}
        }
        assert!(!loader.is_locked());
        assert_eq!(listener.borrow().starts, 1);
        assert_eq!(listener.borrow().ends, 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn duplicate_vertex_references_reuse_chunk_local_index() {
        let text = b"ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nelement face 2\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n3 0 1 2\n3 0 2 3\n";
        let path = write_temp("dedup.ply", text);
        let mut loader = PlyLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().unwrap();
        assert_eq!(chunk.vertex_count(), 4);
        assert_eq!(chunk.indices(), &[0, 1, 2, 0, 2, 3]);
        std::fs::remove_file(&path).ok();
    }
}

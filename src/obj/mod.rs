// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! OBJ decoder (spec §4.2.2): a single forward pass over `v`/`vn`/`vt`/`f`
//! directives, `mtllib`/`usemtl` material resolution through the host, and
//! a chunk assembler that flushes on material boundaries.

mod mtl;

use crate::chunk::DataChunk;
use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::loader::{
    null_listener, FileBinding, Lock, Loader, LoaderIterator, MeshFormat, SharedListener,
    SharedLock,
};
use crate::material::Material;
use crate::reader::Source;
use crate::triangulate::fan_triangulate;
use mtl::{parse_mtl, SharedMaterialListener};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read as _;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

pub use crate::listener::{MaterialListener, MaterialLoaderRequest};

pub type SharedMaterialRequest = Rc<RefCell<Box<dyn MaterialLoaderRequest>>>;

/// `(posIdx, normIdx, texIdx)`; `-1` marks a component absent from the
/// face-vertex reference (spec §4.2.2).
type VertexKey = (i64, i64, i64);

fn resolve_index(raw: &str, len: usize) -> Result<i64> {
    let v: i64 = raw
        .parse()
        .map_err(|_| Error::loader(format!("'{raw}' is not a face index")))?;
    if v > 0 {
        Ok(v - 1)
    } else if v < 0 {
        Ok(len as i64 + v)
    } else {
        Err(Error::loader("face index is 0"))
    }
}

fn parse_face_vertex(tok: &str, pos_len: usize, norm_len: usize, tex_len: usize) -> Result<VertexKey> {
    let mut parts = tok.split('/');
    let pos_raw = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::loader("empty face vertex reference"))?;
    let pos = resolve_index(pos_raw, pos_len)?;
    let tex_raw = parts.next().unwrap_or("");
    let norm_raw = parts.next().unwrap_or("");
    let tex = if tex_raw.is_empty() {
        -1
    } else {
        resolve_index(tex_raw, tex_len)?
    };
    let norm = if norm_raw.is_empty() {
        -1
    } else {
        resolve_index(norm_raw, norm_len)?
    };
    Ok((pos, norm, tex))
}

fn parse_floats<'a>(tokens: impl Iterator<Item = &'a str>, out: &mut [f32]) -> Result<()> {
    for (slot, tok) in out.iter_mut().zip(tokens) {
        *slot = tok
            .parse()
            .map_err(|_| Error::loader(format!("'{tok}' is not a number")))?;
    }
    Ok(())
}

/// OBJ [`Loader`]. `load()` dispatches to [`ObjIterator`], which performs
/// the single streaming pass over the file.
pub struct ObjLoader {
    lock: SharedLock,
    file: FileBinding,
    config: LoaderConfig,
    listener: SharedListener,
    material_request: Option<SharedMaterialRequest>,
    material_listener: Option<SharedMaterialListener>,
}

impl ObjLoader {
    pub fn new() -> Self {
        Self {
            lock: Rc::new(Lock::default()),
            file: FileBinding::default(),
            config: LoaderConfig::default(),
            listener: null_listener(),
            material_request: None,
            material_listener: None,
        }
    }

    pub fn with_config(config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Registers the callback that resolves `mtllib` directives to a
    /// readable MTL stream. Fails with `Error::Locked` if a load is in
    /// flight.
    pub fn set_material_request_listener(
        &mut self,
        listener: Rc<RefCell<Box<dyn MaterialLoaderRequest>>>,
    ) -> Result<()> {
        self.lock.check_unlocked()?;
        self.material_request = Some(listener);
        Ok(())
    }

    /// Registers the callback that validates referenced texture maps.
    /// Fails with `Error::Locked` if a load is in flight.
    pub fn set_material_listener(&mut self, listener: SharedMaterialListener) -> Result<()> {
        self.lock.check_unlocked()?;
        self.material_listener = Some(listener);
        Ok(())
    }
}

impl Default for ObjLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for ObjLoader {
    fn mesh_format(&self) -> MeshFormat {
        MeshFormat::Obj
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
        // OBJ has no magic of its own; it's the sniffing fallback (spec
        // §6), so any bound, readable file is accepted here.
        let path = self.file.require()?;
        Ok(path.exists())
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
        match ObjIterator::open(
            &path,
            self.config,
            Rc::clone(&self.listener),
            self.material_request.clone(),
            self.material_listener.clone(),
            Rc::clone(&self.lock),
        ) {
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

/// Drives chunk assembly over a single opened OBJ file (spec §4.2.2). No
/// backward seeks ever happen: progress tracks linearly against the file's
/// byte length.
pub struct ObjIterator {
    source: Source,
    config: LoaderConfig,
    listener: SharedListener,
    material_request: Option<SharedMaterialRequest>,
    material_listener: Option<SharedMaterialListener>,
    lock: SharedLock,

    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    materials: HashMap<String, Rc<Material>>,
    next_material_id: u32,
    next_texture_id: u32,
    current_material_name: Option<String>,
    pending_material_name: Option<String>,

    current_chunk: DataChunk,
    dedup: HashMap<VertexKey, u32>,
    started: bool,
    finished: bool,
    last_progress: f32,
}

impl ObjIterator {
    fn open(
        path: &Path,
        config: LoaderConfig,
        listener: SharedListener,
        material_request: Option<SharedMaterialRequest>,
        material_listener: Option<SharedMaterialListener>,
        lock: SharedLock,
    ) -> Result<Self> {
        let source = Source::open(path, config.file_size_limit_to_keep_in_memory, crate::endian::Endian::NATIVE)?;
        debug!(path = %path.display(), "opened OBJ file");
        Ok(Self {
            source,
            config,
            listener,
            material_request,
            material_listener,
            lock,
            positions: Vec::new(),
            normals: Vec::new(),
            texcoords: Vec::new(),
            materials: HashMap::new(),
            next_material_id: 0,
            next_texture_id: 0,
            current_material_name: None,
            pending_material_name: None,
            current_chunk: DataChunk::new(),
            dedup: HashMap::new(),
            started: false,
            finished: false,
            last_progress: 0.0,
        })
    }

    fn load_mtl(&mut self, filename: &str) -> Result<()> {
        let Some(request) = self.material_request.as_ref() else {
            debug!(filename, "no material-loader-request listener registered, skipping mtllib");
            return Ok(());
        };
        let reader = request.borrow_mut().on_material_loader_requested(filename);
        let Some(mut reader) = reader else {
            return Ok(());
        };
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let parsed = parse_mtl(
            &text,
            &mut self.next_texture_id,
            &mut self.next_material_id,
            self.material_listener.as_ref(),
        );
        for (name, material) in parsed {
            self.materials.insert(name, material);
        }
        Ok(())
    }

    fn resolve_vertex(&mut self, key: VertexKey) -> Result<u32> {
        if !self.config.allow_duplicate_vertices_in_chunk {
            if let Some(&local) = self.dedup.get(&key) {
                return Ok(local);
            }
        }
        let (pos, norm, tex) = key;
        let p = *self
            .positions
            .get(pos as usize)
            .ok_or_else(|| Error::loader("face position index out of range"))?;
        let local = self.current_chunk.push_vertex(p[0], p[1], p[2]);
        if norm >= 0 {
            let n = *self
                .normals
                .get(norm as usize)
                .ok_or_else(|| Error::loader("face normal index out of range"))?;
            self.current_chunk.push_normal(n[0], n[1], n[2]);
        }
        if tex >= 0 {
            let t = *self
                .texcoords
                .get(tex as usize)
                .ok_or_else(|| Error::loader("face texcoord index out of range"))?;
            self.current_chunk.push_texture_coordinate(t[0], t[1]);
        }
        self.dedup.insert(key, local);
        Ok(local)
    }

    fn report_progress(&mut self) {
        let len = self.source.len();
        let progress = if len > 0 {
            self.source.position() as f32 / len as f32
        } else {
            1.0
        };
        if progress - self.last_progress >= 0.01 || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.listener.borrow_mut().on_load_progress_change(progress);
        }
    }

    /// Runs the line-processing loop until a chunk-flush trigger fires:
    /// `usemtl` naming a new material while the chunk already holds
    /// vertices, `maxVerticesInChunk` reached, or end of file.
    fn fill_chunk(&mut self) -> Result<()> {
        loop {
            let Some(raw_line) = self.source.read_line()? else {
                self.finished = true;
                break;
            };
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let directive = tokens.next().unwrap_or("");
            match directive {
                "v" => {
                    let mut v = [0.0f32; 3];
                    parse_floats(tokens, &mut v)?;
                    self.positions.push(v);
                }
                "vn" => {
                    let mut v = [0.0f32; 3];
                    parse_floats(tokens, &mut v)?;
                    self.normals.push(v);
                }
                "vt" => {
                    let mut v = [0.0f32; 2];
                    parse_floats(tokens, &mut v)?;
                    self.texcoords.push(v);
                }
                "f" => {
                    let face: Vec<VertexKey> = tokens
                        .map(|tok| {
                            parse_face_vertex(tok, self.positions.len(), self.normals.len(), self.texcoords.len())
                        })
                        .collect::<Result<_>>()?;
                    for tri in fan_triangulate(&face) {
                        for key in tri {
                            let local = self.resolve_vertex(key)?;
                            self.current_chunk.push_index(local)?;
                        }
                    }
                }
                "usemtl" => {
                    let name = tokens.next().unwrap_or("").to_string();
                    if self.current_chunk.is_empty() {
                        self.current_material_name = Some(name.clone());
                        self.current_chunk.set_material(self.materials.get(&name).cloned());
                    } else {
                        self.pending_material_name = Some(name);
                        self.report_progress();
                        break;
                    }
                }
                "mtllib" => {
                    for filename in tokens {
                        self.load_mtl(filename)?;
                    }
                }
                // "s", "g", "o" and anything else are silently skipped
                // (spec §4.2.2).
                _ => {}
            }
            self.report_progress();
            if self.current_chunk.vertex_count() >= self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for ObjIterator {
    /// Releases the shared lock if the iterator is dropped before
    /// exhaustion, so an abandoned "read a few chunks" caller doesn't
    /// leave the loader permanently locked.
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl LoaderIterator for ObjIterator {
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
        if let Some(name) = self.pending_material_name.take() {
            self.current_material_name = Some(name);
        }
        self.current_chunk
            .set_material(self.current_material_name.as_ref().and_then(|n| self.materials.get(n).cloned()));

        if let Err(e) = self.fill_chunk() {
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
        let path = std::env::temp_dir().join(format!("meshstream-obj-{}-{}", std::process::id(), name));
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[test]
    fn triangle_with_texcoords_and_normals_is_fan_triangulated() {
        let text = b"v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1 4/4/1\n";
        let path = write_temp("quad.obj", text);
        let mut loader = ObjLoader::new();
        loader.set_file(&path).unwrap();
        assert!(loader.is_valid_file().unwrap());
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk");
        assert_eq!(chunk.vertex_count(), 4);
        assert_eq!(chunk.indices(), &[0, 1, 2, 0, 2, 3]);
        assert!(chunk.has_normals());
        assert!(chunk.has_texture_coordinates());
        assert!(iter.next().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let path = write_temp("negative.obj", text);
        let mut loader = ObjLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().unwrap();
        assert_eq!(chunk.indices(), &[0, 1, 2]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn usemtl_change_flushes_a_chunk_boundary() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nusemtl red\nf 1 2 3\nusemtl blue\nf 2 4 3\n";
        let path = write_temp("materials.obj", text);
        let mut loader = ObjLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let first = iter.next().unwrap().expect("first chunk");
        assert_eq!(first.indices(), &[0, 1, 2]);
        let second = iter.next().unwrap().expect("second chunk");
        assert_eq!(second.vertex_count(), 3);
        assert!(iter.next().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mtllib_without_a_request_listener_is_silently_skipped() {
        let text = b"mtllib materials.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let path = write_temp("no-listener.obj", text);
        let mut loader = ObjLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("chunk despite missing mtl");
        assert_eq!(chunk.vertex_count(), 3);
        assert!(chunk.material().is_none());
        std::fs::remove_file(&path).ok();
    }

    struct InlineMaterialRequest {
        text: &'static str,
    }

    impl MaterialLoaderRequest for InlineMaterialRequest {
        fn on_material_loader_requested(&mut self, _path: &str) -> Option<Box<dyn std::io::Read>> {
            Some(Box::new(std::io::Cursor::new(self.text.as_bytes())))
        }
    }

    #[test]
    fn mtllib_resolves_materials_through_the_listener() {
        let text = b"mtllib stuff.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl wood\nf 1 2 3\n";
        let path = write_temp("with-mtl.obj", text);
        let mut loader = ObjLoader::new();
        loader.set_file(&path).unwrap();
        loader
            .set_material_request_listener(Rc::new(RefCell::new(Box::new(InlineMaterialRequest {
                text: "newmtl wood\nKd 1 0 0\n",
            }) as Box<dyn MaterialLoaderRequest>)))
            .unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().unwrap();
        let material = chunk.material().expect("material resolved from mtllib");
        assert_eq!(material.diffuse_color, Some([255, 0, 0]));
        std::fs::remove_file(&path).ok();
    }
}

// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! 3DS decoder (spec §4.2.3): a recursive chunk-tree walk that collects
//! every object and material up front, applies each object's local
//! coordinate frame, derives smoothing-group-aware normals, then an
//! iterator that serves the precomputed geometry as bounded chunks.

mod chunks;

use crate::chunk::DataChunk;
use crate::config::LoaderConfig;
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::listener::MaterialListener;
use crate::loader::{
    null_listener, FileBinding, Lock, Loader, LoaderIterator, MeshFormat, SharedListener,
    SharedLock,
};
use crate::material::Material;
use crate::reader::{Source, SourceAdapter};
use crate::texture::Texture;
use binrw::BinReaderExt;
use chunks::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

pub type SharedMaterialListener = Rc<RefCell<Box<dyn MaterialListener>>>;

fn read_header(source: &mut Source) -> Result<(ChunkHeader, u64)> {
    let start = source.position();
    let mut adapter = SourceAdapter::new(source);
    let header: ChunkHeader = adapter
        .read_le()
        .map_err(|e| Error::loader(format!("malformed 3DS chunk header: {e}")))?;
    Ok((header, start))
}

fn read_cstring(source: &mut Source) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = source.read_unsigned_byte()? as u8;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_vec3(source: &mut Source, endian: Endian) -> Result<[f32; 3]> {
    Ok([
        source.read_float_endian(endian)?,
        source.read_float_endian(endian)?,
        source.read_float_endian(endian)?,
    ])
}

fn read_vec2(source: &mut Source, endian: Endian) -> Result<[f32; 2]> {
    Ok([
        source.read_float_endian(endian)?,
        source.read_float_endian(endian)?,
    ])
}

struct Face {
    indices: [u32; 3],
    group: u32,
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 0.0 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        v
    }
}

/// One parsed TRI_OBJECT, fully resolved: local coordinate frame already
/// applied to `positions`, per-corner normals already computed.
struct Object3ds {
    name: String,
    positions: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    faces: Vec<Face>,
    /// Per-face, per-corner normal (spec §4.2.3 smoothing-group averaging).
    corner_normals: Vec<[[f32; 3]; 3]>,
    /// Material name -> face indices it was assigned to (`FACES_MATERIAL`).
    material_faces: HashMap<String, Vec<usize>>,
}

/// Applies the smoothing-group normal algorithm (spec §4.2.3, §9): faces
/// in smoothing group 0 get a fresh flat per-face normal; faces sharing a
/// smoothing-group bit at the same vertex position accumulate and average
/// their face normals together.
fn compute_corner_normals(positions: &[[f32; 3]], faces: &[Face]) -> Vec<[[f32; 3]; 3]> {
    let face_normal = |f: &Face| -> [f32; 3] {
        let p0 = positions[f.indices[0] as usize];
        let p1 = positions[f.indices[1] as usize];
        let p2 = positions[f.indices[2] as usize];
        normalize(cross(sub(p1, p0), sub(p2, p0)))
    };
    let normals: Vec<[f32; 3]> = faces.iter().map(face_normal).collect();

    // Accumulate per (vertex index, smoothing-group bit).
    let mut accum: HashMap<(u32, u32), [f32; 3]> = HashMap::new();
    for (fi, f) in faces.iter().enumerate() {
        if f.group == 0 {
            continue;
        }
        for bit in 0..32u32 {
            if f.group & (1 << bit) == 0 {
                continue;
            }
            for &vi in &f.indices {
                let entry = accum.entry((vi, bit)).or_insert([0.0, 0.0, 0.0]);
                entry[0] += normals[fi][0];
                entry[1] += normals[fi][1];
                entry[2] += normals[fi][2];
            }
        }
    }

    faces
        .iter()
        .enumerate()
        .map(|(fi, f)| {
            if f.group == 0 {
                [normals[fi]; 3]
            } else {
                let mut corners = [[0.0f32; 3]; 3];
                for (c, &vi) in f.indices.iter().enumerate() {
                    let mut acc = [0.0f32; 3];
                    for bit in 0..32u32 {
                        if f.group & (1 << bit) == 0 {
                            continue;
                        }
                        if let Some(sum) = accum.get(&(vi, bit)) {
                            let n = normalize(*sum);
                            acc[0] += n[0];
                            acc[1] += n[1];
                            acc[2] += n[2];
                        }
                    }
                    corners[c] = normalize(acc);
                }
                corners
            }
        })
        .collect()
}

fn apply_local_frame(positions: &mut [[f32; 3]], frame: [[f32; 3]; 4]) {
    let [x_axis, y_axis, z_axis, origin] = frame;
    for p in positions.iter_mut() {
        let world = [
            origin[0] + p[0] * x_axis[0] + p[1] * y_axis[0] + p[2] * z_axis[0],
            origin[1] + p[0] * x_axis[1] + p[1] * y_axis[1] + p[2] * z_axis[1],
            origin[2] + p[0] * x_axis[2] + p[1] * y_axis[2] + p[2] * z_axis[2],
        ];
        *p = world;
    }
}

fn parse_color_subchunk(source: &mut Source, end: u64) -> Result<[u8; 3]> {
    let mut color = [0u8; 3];
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        match header.id {
            COLOR_24 | LIN_COLOR_24 => {
                color = [
                    source.read_unsigned_byte()? as u8,
                    source.read_unsigned_byte()? as u8,
                    source.read_unsigned_byte()? as u8,
                ];
            }
            COLOR_F | LIN_COLOR_F => {
                let v = read_vec3(source, Endian::Little)?;
                let scale = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                color = [scale(v[0]), scale(v[1]), scale(v[2])];
            }
            _ => {}
        }
        source.seek(chunk_end)?;
    }
    Ok(color)
}

fn parse_percent_subchunk(source: &mut Source, end: u64) -> Result<f32> {
    let mut percent = 0.0f32;
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        match header.id {
            INT_PERCENTAGE => percent = source.read_short_endian(Endian::Little)? as f32,
            FLOAT_PERCENTAGE => percent = source.read_float_endian(Endian::Little)? * 100.0,
            _ => {}
        }
        source.seek(chunk_end)?;
    }
    Ok(percent)
}

fn parse_texmap(source: &mut Source, end: u64) -> Result<Option<String>> {
    let mut path = None;
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        if header.id == MAT_MAPNAME {
            path = Some(read_cstring(source)?);
        }
        source.seek(chunk_end)?;
    }
    Ok(path)
}

fn parse_material(
    source: &mut Source,
    end: u64,
    next_texture_id: &mut u32,
    material_listener: Option<&SharedMaterialListener>,
) -> Result<(String, Material)> {
    let mut name = String::new();
    let mut material = Material::default();
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        match header.id {
            MAT_NAME => name = read_cstring(source)?,
            MAT_AMBIENT => material.ambient_color = Some(parse_color_subchunk(source, chunk_end)?),
            MAT_DIFFUSE => material.diffuse_color = Some(parse_color_subchunk(source, chunk_end)?),
            MAT_SPECULAR => material.specular_color = Some(parse_color_subchunk(source, chunk_end)?),
            MAT_SHININESS => material.specular_coefficient = Some(parse_percent_subchunk(source, chunk_end)?),
            MAT_TRANSPARENCY => {
                let percent = parse_percent_subchunk(source, chunk_end)?;
                material.transparency = Some((percent.clamp(0.0, 100.0) / 100.0 * 255.0).round() as u8);
            }
            MAT_TEXMAP => {
                if let Some(path) = parse_texmap(source, chunk_end)? {
                    let id = *next_texture_id;
                    *next_texture_id += 1;
                    let texture = Texture::new(id, Some(path));
                    let valid = material_listener
                        .map(|l| l.borrow_mut().on_validate_texture(&texture))
                        .unwrap_or(true);
                    texture.set_valid(valid);
                    material.diffuse_texture = Some(Rc::new(texture));
                }
            }
            _ => {}
        }
        source.seek(chunk_end)?;
    }
    Ok((name, material))
}

fn parse_mesh(source: &mut Source, end: u64) -> Result<Object3ds> {
    let mut positions = Vec::new();
    let mut texcoords = Vec::new();
    let mut faces: Vec<Face> = Vec::new();
    let mut material_faces: HashMap<String, Vec<usize>> = HashMap::new();
    let mut local_frame: Option<[[f32; 3]; 4]> = None;

    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        match header.id {
            VERTICES => {
                let count = source.read_unsigned_short_endian(Endian::Little)? as usize;
                positions = (0..count)
                    .map(|_| read_vec3(source, Endian::Little))
                    .collect::<Result<_>>()?;
            }
            FACES => {
                let count = source.read_unsigned_short_endian(Endian::Little)? as usize;
                faces = (0..count)
                    .map(|_| {
                        let a = source.read_unsigned_short_endian(Endian::Little)? as u32;
                        let b = source.read_unsigned_short_endian(Endian::Little)? as u32;
                        let c = source.read_unsigned_short_endian(Endian::Little)? as u32;
                        let _flags = source.read_unsigned_short_endian(Endian::Little)?;
                        Ok(Face { indices: [a, b, c], group: 0 })
                    })
                    .collect::<Result<_>>()?;
                while source.position() < chunk_end {
                    let (sub, sub_start) = read_header(source)?;
                    let sub_end = sub_start + sub.length as u64;
                    match sub.id {
                        FACES_MATERIAL => {
                            let name = read_cstring(source)?;
                            let n = source.read_unsigned_short_endian(Endian::Little)? as usize;
                            let idxs = (0..n)
                                .map(|_| Ok(source.read_unsigned_short_endian(Endian::Little)? as usize))
                                .collect::<Result<Vec<_>>>()?;
                            material_faces.entry(name).or_default().extend(idxs);
                        }
                        SMOOTH_GROUP => {
                            for face in faces.iter_mut() {
                                face.group = source.read_unsigned_int_endian(Endian::Little)? as u32;
                            }
                        }
                        _ => {}
                    }
                    source.seek(sub_end)?;
                }
            }
            TEXCOORDS => {
                let count = source.read_unsigned_short_endian(Endian::Little)? as usize;
                texcoords = (0..count)
                    .map(|_| read_vec2(source, Endian::Little))
                    .collect::<Result<_>>()?;
            }
            LOCAL_COORDINATES => {
                let x_axis = read_vec3(source, Endian::Little)?;
                let y_axis = read_vec3(source, Endian::Little)?;
                let z_axis = read_vec3(source, Endian::Little)?;
                let origin = read_vec3(source, Endian::Little)?;
                local_frame = Some([x_axis, y_axis, z_axis, origin]);
            }
            _ => {}
        }
        source.seek(chunk_end)?;
    }

    if let Some(frame) = local_frame {
        apply_local_frame(&mut positions, frame);
    }
    let corner_normals = compute_corner_normals(&positions, &faces);

    Ok(Object3ds {
        name: String::new(),
        positions,
        texcoords,
        faces,
        corner_normals,
        material_faces,
    })
}

fn parse_object(
    source: &mut Source,
    end: u64,
) -> Result<Option<Object3ds>> {
    let name = read_cstring(source)?;
    let mut object = None;
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        if header.id == TRIANGULAR_MESH {
            let mut mesh = parse_mesh(source, chunk_end)?;
            mesh.name = name.clone();
            object = Some(mesh);
        }
        source.seek(chunk_end)?;
    }
    Ok(object)
}

fn parse_scene(
    source: &mut Source,
    end: u64,
    objects: &mut Vec<Object3ds>,
    materials: &mut HashMap<String, Rc<Material>>,
    next_texture_id: &mut u32,
    material_listener: Option<&SharedMaterialListener>,
) -> Result<()> {
    while source.position() < end {
        let (header, start) = read_header(source)?;
        let chunk_end = start + header.length as u64;
        match header.id {
            EDIT3DS => parse_scene(source, chunk_end, objects, materials, next_texture_id, material_listener)?,
            NAMED_OBJECT => {
                if let Some(object) = parse_object(source, chunk_end)? {
                    objects.push(object);
                }
            }
            MATERIAL_BLOCK => {
                let (name, material) = parse_material(source, chunk_end, next_texture_id, material_listener)?;
                materials.insert(name, Rc::new(material));
            }
            _ => {}
        }
        source.seek(chunk_end)?;
    }
    Ok(())
}

/// 3DS [`Loader`]. `load()` parses the entire chunk tree eagerly (the
/// scene graph, once built, is small relative to any one mesh's vertex
/// data) and hands the result to [`ThreeDsIterator`] to serve as bounded
/// chunks.
pub struct ThreeDsLoader {
    lock: SharedLock,
    file: FileBinding,
    config: LoaderConfig,
    listener: SharedListener,
    material_listener: Option<SharedMaterialListener>,
}

impl ThreeDsLoader {
    pub fn new() -> Self {
        Self {
            lock: Rc::new(Lock::default()),
            file: FileBinding::default(),
            config: LoaderConfig::default(),
            listener: null_listener(),
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

    pub fn set_material_listener(&mut self, listener: SharedMaterialListener) -> Result<()> {
        self.lock.check_unlocked()?;
        self.material_listener = Some(listener);
        Ok(())
    }
}

impl Default for ThreeDsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for ThreeDsLoader {
    fn mesh_format(&self) -> MeshFormat {
        MeshFormat::ThreeDs
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
        let mut magic = [0u8; 2];
        let mut f = std::fs::File::open(path)?;
        use std::io::Read;
        match f.read_exact(&mut magic) {
            Ok(()) => Ok(magic == [0x4D, 0x4D]),
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
        match ThreeDsIterator::open(
            &path,
            self.config,
            Rc::clone(&self.listener),
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

/// One (object, material) grouping queued for emission; `None` material
/// covers faces the file never assigned to a `FACES_MATERIAL` group.
struct FaceGroup {
    object_index: usize,
    material_name: Option<String>,
    face_indices: Vec<usize>,
}

pub struct ThreeDsIterator {
    config: LoaderConfig,
    listener: SharedListener,
    lock: SharedLock,

    objects: Vec<Object3ds>,
    materials: HashMap<String, Rc<Material>>,
    groups: Vec<FaceGroup>,
    group_index: usize,
    face_cursor: usize,

    total_faces: u64,
    faces_emitted: u64,

    current_chunk: DataChunk,
    dedup: HashMap<(u32, usize), u32>,
    started: bool,
    finished: bool,
    last_progress: f32,
}

impl ThreeDsIterator {
    fn open(
        path: &Path,
        config: LoaderConfig,
        listener: SharedListener,
        material_listener: Option<SharedMaterialListener>,
        lock: SharedLock,
    ) -> Result<Self> {
        let mut source = Source::open(path, config.file_size_limit_to_keep_in_memory, Endian::Little)?;
        let (header, start) = read_header(&mut source)?;
        if header.id != MAIN {
            return Err(Error::loader("expected 0x4D4D MAIN chunk"));
        }
        let end = start + header.length as u64;

        let mut objects = Vec::new();
        let mut materials = HashMap::new();
        let mut next_texture_id = 0u32;
        parse_scene(
            &mut source,
            end,
            &mut objects,
            &mut materials,
            &mut next_texture_id,
            material_listener.as_ref(),
        )?;

        let mut groups = Vec::new();
        for (object_index, object) in objects.iter().enumerate() {
            let mut assigned = vec![false; object.faces.len()];
            for (name, indices) in &object.material_faces {
                for &fi in indices {
                    assigned[fi] = true;
                }
                groups.push(FaceGroup {
                    object_index,
                    material_name: Some(name.clone()),
                    face_indices: indices.clone(),
                });
            }
            let unassigned: Vec<usize> = (0..object.faces.len()).filter(|&fi| !assigned[fi]).collect();
            if !unassigned.is_empty() {
                groups.push(FaceGroup {
                    object_index,
                    material_name: None,
                    face_indices: unassigned,
                });
            }
        }
        let total_faces = groups.iter().map(|g| g.face_indices.len() as u64).sum();

        debug!(
            objects = objects.len(),
            materials = materials.len(),
            total_faces,
            "parsed 3DS scene"
        );

        Ok(Self {
            config,
            listener,
            lock,
            objects,
            materials,
            groups,
            group_index: 0,
            face_cursor: 0,
            total_faces,
            faces_emitted: 0,
            current_chunk: DataChunk::new(),
            dedup: HashMap::new(),
            started: false,
            finished: false,
            last_progress: 0.0,
        })
    }

    fn report_progress(&mut self) {
        let progress = if self.total_faces > 0 {
            self.faces_emitted as f32 / self.total_faces as f32
        } else {
            1.0
        };
        if progress - self.last_progress >= 0.01 || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.listener.borrow_mut().on_load_progress_change(progress);
        }
    }

    fn flush_material(&mut self, group_start: usize) {
        let material = self.groups[group_start]
            .material_name
            .clone()
            .and_then(|n| self.materials.get(&n).cloned());
        self.current_chunk.set_material(material);
    }

    /// Re-indexes `self.objects`/`self.groups` fresh at every step rather
    /// than holding a borrow across the loop body, since `report_progress`
    /// and the chunk mutators below all need `&mut self` (spec §9: no
    /// cross-call aliasing, everything goes back through `self`).
    fn fill_chunk(&mut self) -> Result<()> {
        loop {
            if self.group_index >= self.groups.len() {
                self.finished = true;
                break;
            }
            let group_start = self.group_index;
            let object_index = self.groups[group_start].object_index;
            let face_count = self.groups[group_start].face_indices.len();

            if self.face_cursor >= face_count {
                self.flush_material(group_start);
                self.group_index += 1;
                self.face_cursor = 0;
                continue;
            }

            let fi = self.groups[group_start].face_indices[self.face_cursor];
            let face_indices3 = self.objects[object_index].faces[fi].indices;
            let corners = self.objects[object_index].corner_normals[fi];

            for (c, vi) in face_indices3.into_iter().enumerate() {
                let key = (vi, group_start);
                let existing = if self.config.allow_duplicate_vertices_in_chunk {
                    None
                } else {
                    self.dedup.get(&key).copied()
                };
                let local = match existing {
                    Some(local) => local,
                    None => {
                        let p = self.objects[object_index].positions[vi as usize];
                        let local = self.current_chunk.push_vertex(p[0], p[1], p[2]);
                        let n = corners[c];
                        self.current_chunk.push_normal(n[0], n[1], n[2]);
                        let texcoord = self.objects[object_index]
                            .texcoords
                            .get(vi as usize)
                            .copied();
                        if let Some(t) = texcoord {
                            self.current_chunk.push_texture_coordinate(t[0], t[1]);
                        }
                        self.dedup.insert(key, local);
                        local
                    }
                };
                self.current_chunk.push_index(local)?;
            }
            self.face_cursor += 1;
            self.faces_emitted += 1;
            self.report_progress();

            if self.face_cursor >= face_count {
                self.flush_material(group_start);
                self.group_index += 1;
                self.face_cursor = 0;
                break;
            }
            if self.current_chunk.vertex_count() >= self.config.max_vertices_in_chunk as usize {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for ThreeDsIterator {
    /// Releases the shared lock if the iterator is dropped before
    /// exhaustion, so an abandoned "read a few chunks" caller doesn't
    /// leave the loader permanently locked.
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl LoaderIterator for ThreeDsIterator {
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

    fn write_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn write_cstring(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    /// Wraps `payload` in a chunk with the given id, returning the whole
    /// chunk's bytes (header included).
    fn chunk(id: u16, payload: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        write_u16(&mut out, id);
        write_u32(&mut out, 6 + payload.len() as u32);
        out.extend(payload);
        out
    }

    fn build_single_triangle_3ds() -> Vec<u8> {
        let mut points = Vec::new();
        write_u16(&mut points, 3);
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            write_f32(&mut points, p[0]);
            write_f32(&mut points, p[1]);
            write_f32(&mut points, p[2]);
        }
        let vertices_chunk = chunk(VERTICES, points);

        let mut face_payload = Vec::new();
        write_u16(&mut face_payload, 1);
        write_u16(&mut face_payload, 0);
        write_u16(&mut face_payload, 1);
        write_u16(&mut face_payload, 2);
        write_u16(&mut face_payload, 0);
        let faces_chunk = chunk(FACES, face_payload);

        let mut object_payload = Vec::new();
        write_cstring(&mut object_payload, "Box01");
        let mut mesh_payload = Vec::new();
        mesh_payload.extend(vertices_chunk);
        mesh_payload.extend(faces_chunk);
        object_payload.extend(chunk(TRIANGULAR_MESH, mesh_payload));
        let named_object = chunk(NAMED_OBJECT, object_payload);

        let edit = chunk(EDIT3DS, named_object);
        chunk(MAIN, edit)
    }

    fn write_temp(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("meshstream-3ds-{}-{}", std::process::id(), name));
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[test]
    fn single_triangle_yields_one_chunk() {
        let bytes = build_single_triangle_3ds();
        let path = write_temp("triangle.3ds", &bytes);
        let mut loader = ThreeDsLoader::new();
        loader.set_file(&path).unwrap();
        assert!(loader.is_valid_file().unwrap());
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk");
        assert_eq!(chunk.vertex_count(), 3);
        assert_eq!(chunk.indices(), &[0, 1, 2]);
        assert!(chunk.has_normals());
        assert!(iter.next().unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn flat_shaded_face_gets_face_normal_at_every_corner() {
        let bytes = build_single_triangle_3ds();
        let path = write_temp("flat.3ds", &bytes);
        let mut loader = ThreeDsLoader::new();
        loader.set_file(&path).unwrap();
        let mut iter = loader.load().unwrap();
        let chunk = iter.next().unwrap().unwrap();
        let normals = chunk.normals();
        assert_eq!(&normals[0..3], &normals[3..6]);
        assert_eq!(&normals[3..6], &normals[6..9]);
        std::fs::remove_file(&path).ok();
    }
}

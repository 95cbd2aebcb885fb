// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The internal binary codec (spec §4.2.5): a [`BinaryWriter`] that
//! serializes any [`crate::loader::Loader`]'s chunk stream into the
//! crate's own compact format, and a [`BinaryLoader`] that reads it back.
//!
//! Layout, little-endian throughout except the length-prefixed UTF
//! strings (magic, texture side-file names, material names), which use
//! the big-endian 16-bit length prefix `readUTF`/`writeUTF` share with
//! every other format in this crate:
//!
//! 1. magic `"MESH_WRITER_BIN"` (UTF)
//! 2. version: u8 (`2`)
//! 3. texture count: u32, then per texture: id (u32), width (u32),
//!    height (u32), side-file name (UTF)
//! 4. chunk count: u32
//! 5. per chunk: a u16 bitmask of present arrays, vertex count (u32),
//!    index count (u32), each present array as (u32 length, raw
//!    little-endian payload; colors additionally prefixed with a u8
//!    component count), the bbox as 6 f32s, and if the material bit is
//!    set, a material id (u32) plus a self-contained material record.
//!
//! Textures are metadata-only in the stream; their bytes live in sibling
//! side files named by the recorded side-file name, copied byte for byte
//! (spec §4, §6: "textures are copied as opaque byte streams").

use crate::chunk::{ColorComponents, DataChunk};
use crate::config::LoaderConfig;
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::loader::{
    null_listener, FileBinding, Lock, Loader, LoaderIterator, MeshFormat, SharedListener,
    SharedLock,
};
use crate::material::{IlluminationModel, Material, TextureSlot};
use crate::reader::{Backend, PositionedIo, Source, StreamBackend};
use crate::texture::Texture;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

pub use crate::listener::{BinaryReadListener, BinaryWriteListener, NullWriteListener};

pub type SharedBinaryReadListener = Rc<RefCell<Box<dyn BinaryReadListener>>>;
pub type SharedBinaryWriteListener = Rc<RefCell<Box<dyn BinaryWriteListener>>>;

pub fn null_write_listener() -> SharedBinaryWriteListener {
    Rc::new(RefCell::new(Box::new(NullWriteListener)))
}

const MAGIC: &str = "MESH_WRITER_BIN";
const VERSION: u8 = 2;

const BIT_VERTICES: u16 = 1 << 0;
const BIT_NORMALS: u16 = 1 << 1;
const BIT_TEXCOORDS: u16 = 1 << 2;
const BIT_COLORS: u16 = 1 << 3;
const BIT_INDICES: u16 = 1 << 4;
const BIT_MATERIAL: u16 = 1 << 5;

const MAT_NAME: u16 = 1 << 0;
const MAT_AMBIENT: u16 = 1 << 1;
const MAT_DIFFUSE: u16 = 1 << 2;
const MAT_SPECULAR: u16 = 1 << 3;
const MAT_SPEC_COEF: u16 = 1 << 4;
const MAT_TRANSPARENCY: u16 = 1 << 5;
const MAT_ILLUM: u16 = 1 << 6;
const MAT_TEX_AMBIENT: u16 = 1 << 7;
const MAT_TEX_DIFFUSE: u16 = 1 << 8;
const MAT_TEX_SPECULAR: u16 = 1 << 9;
const MAT_TEX_ALPHA: u16 = 1 << 10;
const MAT_TEX_BUMP: u16 = 1 << 11;

const TEXTURE_SLOTS: [TextureSlot; 5] = [
    TextureSlot::Ambient,
    TextureSlot::Diffuse,
    TextureSlot::Specular,
    TextureSlot::Alpha,
    TextureSlot::Bump,
];

fn slot_bit(slot: TextureSlot) -> u16 {
    match slot {
        TextureSlot::Ambient => MAT_TEX_AMBIENT,
        TextureSlot::Diffuse => MAT_TEX_DIFFUSE,
        TextureSlot::Specular => MAT_TEX_SPECULAR,
        TextureSlot::Alpha => MAT_TEX_ALPHA,
        TextureSlot::Bump => MAT_TEX_BUMP,
    }
}

fn side_file_name(texture_id: u32) -> String {
    format!("tex{texture_id:04}.bin")
}

/// Collects the distinct textures referenced (by id, first-seen order)
/// across every chunk's material, across all five slots.
fn collect_textures(chunks: &[DataChunk]) -> Vec<Rc<Texture>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for chunk in chunks {
        let Some(material) = chunk.material() else {
            continue;
        };
        for slot in TEXTURE_SLOTS {
            if let Some(tex) = material.texture(slot) {
                if seen.insert(tex.id) {
                    out.push(Rc::clone(tex));
                }
            }
        }
    }
    out
}

/// Serializes any [`Loader`]'s chunk stream to the internal binary format.
pub struct BinaryWriter;

impl BinaryWriter {
    /// Drives `loader` to exhaustion, then writes `output_path` plus one
    /// side file per distinct texture referenced by the chunks' materials.
    ///
    /// `texture_source_dir`, when given, is the directory textures'
    /// `relative_path` is resolved against (typically the source mesh
    /// file's own directory) so their bytes can be copied into the
    /// canonical side files this writer creates next to `output_path`.
    pub fn write(
        loader: &mut dyn Loader,
        output_path: &Path,
        texture_source_dir: Option<&Path>,
        listener: SharedBinaryWriteListener,
    ) -> Result<()> {
        let mut iterator = loader.load()?;
        let mut chunks = Vec::new();
        while let Some(chunk) = iterator.next()? {
            chunks.push(chunk);
        }
        drop(iterator);
        loader.close();

        listener.borrow_mut().on_write_start();

        let textures = collect_textures(&chunks);
        let side_dir = output_path.parent().unwrap_or_else(|| Path::new("."));

        let backend = StreamBackend::create(output_path)?;
        let mut out = PositionedIo::with_default_endian(backend, Endian::Little);
        out.write_utf(MAGIC)?;
        out.write_byte(VERSION)?;

        out.write_unsigned_int_endian(Endian::Little, textures.len() as u32)?;
        for texture in &textures {
            let name = side_file_name(texture.id);
            out.write_unsigned_int_endian(Endian::Little, texture.id)?;
            out.write_unsigned_int_endian(Endian::Little, texture.width.unwrap_or(0))?;
            out.write_unsigned_int_endian(Endian::Little, texture.height.unwrap_or(0))?;
            out.write_utf(&name)?;

            let side_path = side_dir.join(&name);
            let copied = Self::copy_texture_bytes(texture, texture_source_dir, &side_path);
            if copied {
                if let Some(mirror) = listener
                    .borrow_mut()
                    .on_texture_received(texture.width.unwrap_or(0), texture.height.unwrap_or(0))
                {
                    Self::mirror_side_file(&side_path, mirror);
                }
            }
            listener
                .borrow_mut()
                .on_texture_data_processed(texture.width.unwrap_or(0), texture.height.unwrap_or(0));
        }

        out.write_unsigned_int_endian(Endian::Little, chunks.len() as u32)?;
        let total = chunks.len().max(1);
        for (i, chunk) in chunks.iter().enumerate() {
            Self::write_chunk(&mut out, chunk)?;
            listener.borrow_mut().on_chunk_available(chunk);
            listener
                .borrow_mut()
                .on_write_progress_change((i + 1) as f32 / total as f32);
        }

        listener.borrow_mut().on_write_end();
        debug!(chunks = chunks.len(), textures = textures.len(), path = %output_path.display(), "wrote binary mesh file");
        Ok(())
    }

    fn copy_texture_bytes(texture: &Texture, source_dir: Option<&Path>, side_path: &Path) -> bool {
        let bytes = texture
            .is_valid()
            .then_some(())
            .and(texture.relative_path.as_deref())
            .zip(source_dir)
            .and_then(|(rel, dir)| std::fs::read(dir.join(rel)).ok());
        let payload = bytes.unwrap_or_default();
        let had_bytes = !payload.is_empty();
        // Side files are opened exclusively for write (spec §5) so a stale
        // file from a previous run never gets silently overwritten.
        match StreamBackend::create_exclusive(side_path) {
            Ok(mut backend) => {
                if let Err(e) = backend.write_at(0, &payload) {
                    warn!(error = %e, path = %side_path.display(), "failed to write texture side file");
                    return false;
                }
            }
            Err(e) => {
                warn!(error = %e, path = %side_path.display(), "failed to create texture side file");
                return false;
            }
        }
        had_bytes
    }

    fn mirror_side_file(side_path: &Path, mut destination: std::fs::File) {
        use std::io::Write as _;
        if let Ok(bytes) = std::fs::read(side_path) {
            let _ = destination.write_all(&bytes);
        }
    }

    fn write_chunk(out: &mut PositionedIo<StreamBackend>, chunk: &DataChunk) -> Result<()> {
        let mut bitmask = 0u16;
        if !chunk.vertices().is_empty() {
            bitmask |= BIT_VERTICES;
        }
        if chunk.has_normals() {
            bitmask |= BIT_NORMALS;
        }
        if chunk.has_texture_coordinates() {
            bitmask |= BIT_TEXCOORDS;
        }
        if chunk.has_colors() {
            bitmask |= BIT_COLORS;
        }
        if !chunk.indices().is_empty() {
            bitmask |= BIT_INDICES;
        }
        if chunk.material().is_some() {
            bitmask |= BIT_MATERIAL;
        }

        out.write_unsigned_short_endian(Endian::Little, bitmask)?;
        out.write_unsigned_int_endian(Endian::Little, chunk.vertex_count() as u32)?;
        out.write_unsigned_int_endian(Endian::Little, chunk.indices().len() as u32)?;

        if bitmask & BIT_VERTICES != 0 {
            Self::write_f32_array(out, chunk.vertices())?;
        }
        if bitmask & BIT_NORMALS != 0 {
            Self::write_f32_array(out, chunk.normals())?;
        }
        if bitmask & BIT_TEXCOORDS != 0 {
            Self::write_f32_array(out, chunk.texture_coordinates())?;
        }
        if bitmask & BIT_COLORS != 0 {
            let components = chunk.color_components().expect("has_colors implies components set");
            out.write_byte(components.count() as u8)?;
            out.write_unsigned_int_endian(Endian::Little, chunk.colors().len() as u32)?;
            out.write_bytes(chunk.colors())?;
        }
        if bitmask & BIT_INDICES != 0 {
            for &index in chunk.indices() {
                out.write_int_endian(Endian::Little, index)?;
            }
        }

        let bbox = chunk.bbox();
        for v in bbox.min.iter().chain(bbox.max.iter()) {
            out.write_float_endian(Endian::Little, *v)?;
        }

        if let Some(material) = chunk.material() {
            out.write_unsigned_int_endian(Endian::Little, material.material_id)?;
            Self::write_material(out, material)?;
        }
        Ok(())
    }

    fn write_f32_array(out: &mut PositionedIo<StreamBackend>, values: &[f32]) -> Result<()> {
        out.write_unsigned_int_endian(Endian::Little, values.len() as u32)?;
        for &v in values {
            out.write_float_endian(Endian::Little, v)?;
        }
        Ok(())
    }

    fn write_material(out: &mut PositionedIo<StreamBackend>, material: &Material) -> Result<()> {
        let mut fields = 0u16;
        if material.name.is_some() {
            fields |= MAT_NAME;
        }
        if material.ambient_color.is_some() {
            fields |= MAT_AMBIENT;
        }
        if material.diffuse_color.is_some() {
            fields |= MAT_DIFFUSE;
        }
        if material.specular_color.is_some() {
            fields |= MAT_SPECULAR;
        }
        if material.specular_coefficient.is_some() {
            fields |= MAT_SPEC_COEF;
        }
        if material.transparency.is_some() {
            fields |= MAT_TRANSPARENCY;
        }
        if material.illumination_model.is_some() {
            fields |= MAT_ILLUM;
        }
        for slot in TEXTURE_SLOTS {
            if material.texture(slot).is_some() {
                fields |= slot_bit(slot);
            }
        }

        out.write_unsigned_short_endian(Endian::Little, fields)?;
        if let Some(name) = &material.name {
            out.write_utf(name)?;
        }
        for color in [material.ambient_color, material.diffuse_color, material.specular_color] {
            if let Some(c) = color {
                out.write_bytes(&c)?;
            }
        }
        if let Some(coef) = material.specular_coefficient {
            out.write_float_endian(Endian::Little, coef)?;
        }
        if let Some(transparency) = material.transparency {
            out.write_byte(transparency)?;
        }
        if let Some(illum) = material.illumination_model {
            out.write_byte(illum as u8)?;
        }
        for slot in TEXTURE_SLOTS {
            if let Some(tex) = material.texture(slot) {
                out.write_unsigned_int_endian(Endian::Little, tex.id)?;
            }
        }
        Ok(())
    }
}

/// Reads back a file produced by [`BinaryWriter`] (spec §4.2.5).
pub struct BinaryLoader {
    lock: SharedLock,
    file: FileBinding,
    config: LoaderConfig,
    listener: SharedListener,
    texture_listener: Option<SharedBinaryReadListener>,
}

impl BinaryLoader {
    pub fn new() -> Self {
        Self {
            lock: Rc::new(Lock::default()),
            file: FileBinding::default(),
            config: LoaderConfig::default(),
            listener: null_listener(),
            texture_listener: None,
        }
    }

    /// Registers the listener that receives a destination for each
    /// texture's side-file bytes as they're discovered (spec §6
    /// binary-read-specific callbacks). Fails with `Error::Locked` if a
    /// load is in flight.
    pub fn set_texture_listener(&mut self, listener: SharedBinaryReadListener) -> Result<()> {
        self.lock.check_unlocked()?;
        self.texture_listener = Some(listener);
        Ok(())
    }
}

impl Default for BinaryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for BinaryLoader {
    fn mesh_format(&self) -> MeshFormat {
        MeshFormat::Binary
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
        Ok(is_binary_magic(&bytes))
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
        match BinaryIterator::open(
            &path,
            self.config,
            Rc::clone(&self.listener),
            self.texture_listener.clone(),
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

/// Magic-byte check for the internal format: the length-prefixed UTF
/// string `"MESH_WRITER_BIN"` (a u16 big-endian 15, then the ASCII bytes).
pub(crate) fn is_binary_magic(bytes: &[u8]) -> bool {
    let expected_len = MAGIC.len() as u16;
    bytes.len() >= 2 + MAGIC.len()
        && bytes[0] == (expected_len >> 8) as u8
        && bytes[1] == (expected_len & 0xFF) as u8
        && &bytes[2..2 + MAGIC.len()] == MAGIC.as_bytes()
}

struct BinaryIterator {
    source: Source,
    listener: SharedListener,
    lock: SharedLock,

    textures: HashMap<u32, Rc<Texture>>,
    chunk_total: u32,
    chunks_emitted: u32,
    started: bool,
    finished: bool,
    last_progress: f32,
}

impl BinaryIterator {
    fn open(
        path: &Path,
        config: LoaderConfig,
        listener: SharedListener,
        texture_listener: Option<SharedBinaryReadListener>,
        lock: SharedLock,
    ) -> Result<Self> {
        let mut source = Source::open(path, config.file_size_limit_to_keep_in_memory, Endian::Little)?;
        let magic = source.read_utf()?;
        if magic != MAGIC {
            return Err(Error::loader(format!("bad magic: {magic:?}")));
        }
        let version = source.read_byte()? as u8;
        if version != VERSION {
            return Err(Error::loader(format!("unsupported binary version {version}")));
        }

        let side_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let texture_count = source.read_unsigned_int_endian(Endian::Little)? as u32;
        let mut textures = HashMap::new();
        for _ in 0..texture_count {
            let id = source.read_unsigned_int_endian(Endian::Little)? as u32;
            let width = source.read_unsigned_int_endian(Endian::Little)? as u32;
            let height = source.read_unsigned_int_endian(Endian::Little)? as u32;
            let name = source.read_utf()?;

            let mut texture = Texture::new(id, Some(name.clone()));
            if width > 0 {
                texture.width = Some(width);
            }
            if height > 0 {
                texture.height = Some(height);
            }
            let texture = Rc::new(texture);
            if let Some(tex_listener) = &texture_listener {
                let side_path = side_dir.join(&name);
                let destination = tex_listener.borrow_mut().on_texture_received(id, width, height);
                match destination {
                    Ok(mut destination) => {
                        if let Ok(bytes) = std::fs::read(&side_path) {
                            use std::io::Write as _;
                            let _ = destination.write_all(&bytes);
                            let valid = tex_listener
                                .borrow_mut()
                                .on_texture_data_available(id, width, height);
                            texture.set_valid(valid);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, id, "read listener declined texture destination");
                    }
                }
            }
            textures.insert(id, texture);
        }

        let chunk_total = source.read_unsigned_int_endian(Endian::Little)? as u32;
        debug!(chunks = chunk_total, textures = texture_count, path = %path.display(), "opened binary mesh file");

        Ok(Self {
            source,
            listener,
            lock,
            textures,
            chunk_total,
            chunks_emitted: 0,
            started: false,
            finished: chunk_total == 0,
            last_progress: 0.0,
        })
    }

    fn read_rgb(&mut self) -> Result<[u8; 3]> {
        let mut rgb = [0u8; 3];
        self.source.read_fully(&mut rgb)?;
        Ok(rgb)
    }

    fn read_f32_array(&mut self) -> Result<Vec<f32>> {
        let len = self.source.read_unsigned_int_endian(Endian::Little)? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.source.read_float_endian(Endian::Little)?);
        }
        Ok(out)
    }

    fn read_material(&mut self) -> Result<Material> {
        let material_id = self.source.read_unsigned_int_endian(Endian::Little)? as u32;
        let fields = self.source.read_unsigned_short_endian(Endian::Little)? as u16;
        let mut material = Material::new(material_id);

        if fields & MAT_NAME != 0 {
            material.name = Some(self.source.read_utf()?);
        }
        if fields & MAT_AMBIENT != 0 {
            material.ambient_color = Some(self.read_rgb()?);
        }
        if fields & MAT_DIFFUSE != 0 {
            material.diffuse_color = Some(self.read_rgb()?);
        }
        if fields & MAT_SPECULAR != 0 {
            material.specular_color = Some(self.read_rgb()?);
        }
        if fields & MAT_SPEC_COEF != 0 {
            material.specular_coefficient = Some(self.source.read_float_endian(Endian::Little)?);
        }
        if fields & MAT_TRANSPARENCY != 0 {
            material.transparency = Some(self.source.read_unsigned_byte()? as u8);
        }
        if fields & MAT_ILLUM != 0 {
            let raw = self.source.read_unsigned_byte()? as u32;
            material.illumination_model = IlluminationModel::from_u32(raw);
        }
        for slot in TEXTURE_SLOTS {
            if fields & slot_bit(slot) != 0 {
                let id = self.source.read_unsigned_int_endian(Endian::Little)? as u32;
                material.set_texture(slot, self.textures.get(&id).cloned());
            }
        }
        Ok(material)
    }

    fn report_progress(&mut self) {
        let progress = if self.chunk_total > 0 {
            self.chunks_emitted as f32 / self.chunk_total as f32
        } else {
            1.0
        };
        if progress - self.last_progress >= 0.01 || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.listener.borrow_mut().on_load_progress_change(progress);
        }
    }

    fn read_chunk(&mut self) -> Result<DataChunk> {
        let mut chunk = DataChunk::new();
        let bitmask = self.source.read_unsigned_short_endian(Endian::Little)? as u16;
        let _vertex_count = self.source.read_unsigned_int_endian(Endian::Little)? as u32;
        let index_count = self.source.read_unsigned_int_endian(Endian::Little)? as usize;

        if bitmask & BIT_VERTICES != 0 {
            let values = self.read_f32_array()?;
            for triple in values.chunks_exact(3) {
                chunk.push_vertex(triple[0], triple[1], triple[2]);
            }
        }
        if bitmask & BIT_NORMALS != 0 {
            let values = self.read_f32_array()?;
            for triple in values.chunks_exact(3) {
                chunk.push_normal(triple[0], triple[1], triple[2]);
            }
        }
        if bitmask & BIT_TEXCOORDS != 0 {
            let values = self.read_f32_array()?;
            for pair in values.chunks_exact(2) {
                chunk.push_texture_coordinate(pair[0], pair[1]);
            }
        }
        if bitmask & BIT_COLORS != 0 {
            let component_count = self.source.read_unsigned_byte()? as usize;
            let components = ColorComponents::from_count(component_count)?;
            let len = self.source.read_unsigned_int_endian(Endian::Little)? as usize;
            let mut bytes = vec![0u8; len];
            self.source.read_fully(&mut bytes)?;
            for channels in bytes.chunks_exact(components.count()) {
                chunk.push_color(components, channels)?;
            }
        }
        if bitmask & BIT_INDICES != 0 {
            for _ in 0..index_count {
                let index = self.source.read_int_endian(Endian::Little)?;
                chunk.push_index(index as u32)?;
            }
        }

        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for v in min.iter_mut().chain(max.iter_mut()) {
            *v = self.source.read_float_endian(Endian::Little)?;
        }
        // The chunk's own bbox was already populated correctly by
        // push_vertex above; the stored bbox only needs validating here
        // since push_vertex recomputes the identical componentwise min/max.
        let _ = (min, max);

        if bitmask & BIT_MATERIAL != 0 {
            let material = self.read_material()?;
            chunk.set_material(Some(Rc::new(material)));
        }

        chunk.validate()?;
        Ok(chunk)
    }
}

impl Drop for BinaryIterator {
    /// Releases the shared lock if the iterator is dropped before
    /// exhaustion, so an abandoned "read a few chunks" caller doesn't
    /// leave the loader permanently locked.
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl LoaderIterator for BinaryIterator {
    fn has_next(&self) -> bool {
        !self.finished
    }

    fn next(&mut self) -> Result<Option<DataChunk>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            self.listener.borrow_mut().on_load_start();
        }

        let result = self.read_chunk();
        self.chunks_emitted += 1;
        if self.chunks_emitted >= self.chunk_total {
            self.finished = true;
        }

        match result {
            Ok(chunk) => {
                self.report_progress();
                if self.finished {
                    self.listener.borrow_mut().on_load_end();
                    self.lock.release();
                }
                Ok(Some(chunk))
            }
            Err(e) => {
                self.finished = true;
                self.lock.release();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ColorComponents as CC;
    use crate::ply::PlyLoader;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("meshstream-binary-{}-{name}", std::process::id()))
    }

    #[test]
    fn magic_sniff_roundtrips() {
        let path = temp_path("magic.bin");
        {
            let mut loader = build_ply_fixture(&path.with_extension("ply"));
            BinaryWriter::write(&mut loader, &path, None, null_write_listener()).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert!(is_binary_magic(&bytes));
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(path.with_extension("ply")).ok();
    }

    fn build_ply_fixture(path: &Path) -> PlyLoader {
        let text = b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0 255 0 0\n1 0 0 0 255 0\n0 1 0 0 0 255\n3 0 1 2\n";
        std::fs::write(path, text).unwrap();
        let mut loader = PlyLoader::new();
        loader.set_file(path).unwrap();
        loader
    }

    #[test]
    fn round_trip_preserves_vertices_colors_indices_and_bbox() {
        let ply_path = temp_path("source.ply");
        let bin_path = temp_path("roundtrip.bin");
        let mut loader = build_ply_fixture(&ply_path);

        // Read the reference chunk directly from a fresh PLY loader before
        // the writer consumes its own loader instance.
        let mut reference_loader = PlyLoader::new();
        reference_loader.set_file(&ply_path).unwrap();
        let mut reference_iter = reference_loader.load().unwrap();
        let reference_chunk = reference_iter.next().unwrap().expect("reference chunk");
        drop(reference_iter);

        BinaryWriter::write(&mut loader, &bin_path, None, null_write_listener()).unwrap();

        let mut binary_loader = BinaryLoader::new();
        binary_loader.set_file(&bin_path).unwrap();
        let mut iter = binary_loader.load().unwrap();
        let chunk = iter.next().unwrap().expect("one chunk back");
        assert!(iter.next().unwrap().is_none());

        assert_eq!(chunk.vertices(), reference_chunk.vertices());
        assert_eq!(chunk.indices(), reference_chunk.indices());
        assert_eq!(chunk.colors(), reference_chunk.colors());
        assert_eq!(chunk.color_components(), Some(CC::Rgb));
        assert_eq!(chunk.bbox(), reference_chunk.bbox());

        std::fs::remove_file(&ply_path).ok();
        std::fs::remove_file(&bin_path).ok();
    }

    #[test]
    fn listener_sees_one_start_and_end_and_monotonic_progress() {
        use crate::listener::LoaderListener;
        use std::cell::RefCell as Cell;

        #[derive(Default)]
        struct Recorder {
            starts: u32,
            ends: u32,
            progress: Vec<f32>,
        }
        impl LoaderListener for Recorder {
            fn on_load_start(&mut self) {
                self.starts += 1;
            }
            fn on_load_end(&mut self) {
                self.ends += 1;
            }
            fn on_load_progress_change(&mut self, p: f32) {
                self.progress.push(p);
            }
        }

        let ply_path = temp_path("listener-source.ply");
        let bin_path = temp_path("listener.bin");
        let mut loader = build_ply_fixture(&ply_path);
        BinaryWriter::write(&mut loader, &bin_path, None, null_write_listener()).unwrap();

        let listener = Rc::new(Cell::new(Box::new(Recorder::default()) as Box<dyn LoaderListener>));
        let mut binary_loader = BinaryLoader::new();
        binary_loader.set_file(&bin_path).unwrap();
        binary_loader.set_listener(Rc::clone(&listener)).unwrap();
        let mut iter = binary_loader.load().unwrap();
        while iter.next().unwrap().is_some() {}
        drop(iter);

        assert_eq!(listener.borrow().starts, 1);
        assert_eq!(listener.borrow().ends, 1);
        assert!(listener.borrow().progress.windows(2).all(|w| w[1] >= w[0]));

        std::fs::remove_file(&ply_path).ok();
        std::fs::remove_file(&bin_path).ok();
    }
}

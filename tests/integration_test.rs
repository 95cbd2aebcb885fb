// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Whole-file round trips across the public `open`/`Loader`/`LoaderIterator`
//! surface: each test writes a small fixture to a temp file, decodes it
//! through the crate's format sniffing, and checks the chunks it produces.

use meshstream::{open, Loader, MeshFormat};
use std::cell::RefCell;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("meshstream-it-{}-{name}", std::process::id()))
}

struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}

#[test]
fn open_sniffs_and_decodes_ascii_ply() {
    let path = temp_path("cube.ply");
    let _guard = TempFile(path.clone());
    std::fs::write(
        &path,
        b"ply\nformat ascii 1.0\n\
element vertex 3\nproperty float x\nproperty float y\nproperty float z\n\
element face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n",
    )
    .unwrap();

    let mut loader = open(&path).unwrap();
    assert_eq!(loader.mesh_format(), MeshFormat::Ply);
    let mut iterator = loader.load().unwrap();
    let chunk = iterator.next().unwrap().expect("one chunk");
    assert_eq!(chunk.vertex_count(), 3);
    assert_eq!(chunk.indices(), &[0, 1, 2]);
    assert!(iterator.next().unwrap().is_none());
}

#[test]
fn open_sniffs_and_decodes_obj_with_mtl_via_listener() {
    use meshstream::obj::{MaterialLoaderRequest, ObjLoader};

    let obj_path = temp_path("quad.obj");
    let _obj_guard = TempFile(obj_path.clone());
    std::fs::write(
        &obj_path,
        b"mtllib quad.mtl\n\
v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
usemtl red\n\
f 1/1 2/2 3/3 4/4\n",
    )
    .unwrap();

    struct InlineMtl(&'static str);
    impl MaterialLoaderRequest for InlineMtl {
        fn on_material_loader_requested(&mut self, _path: &str) -> Option<Box<dyn std::io::Read>> {
            Some(Box::new(std::io::Cursor::new(self.0.as_bytes().to_vec())))
        }
    }

    let mtl_text = "newmtl red\nKd 1.0 0.0 0.0\n";

    let mut loader = ObjLoader::new();
    loader.set_file(&obj_path).unwrap();
    loader
        .set_material_request_listener(Rc::new(RefCell::new(
            Box::new(InlineMtl(mtl_text)) as Box<dyn MaterialLoaderRequest>
        )))
        .unwrap();

    let mut iterator = loader.load().unwrap();
    let chunk = iterator.next().unwrap().expect("one chunk");
    // the quad fan-triangulates into two triangles sharing the diagonal
    assert_eq!(chunk.indices().len(), 6);
    assert_eq!(chunk.vertex_count(), 4);
    let material = chunk.material().expect("usemtl assigned a material");
    assert_eq!(material.name.as_deref(), Some("red"));
    assert_eq!(material.diffuse_color, Some([255, 0, 0]));
}

#[test]
fn open_sniffs_and_decodes_ascii_stl() {
    let path = temp_path("tri.stl");
    let _guard = TempFile(path.clone());
    std::fs::write(
        &path,
        b"solid tri\n\
facet normal 0 0 1\nouter loop\n\
vertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\n\
endloop\nendfacet\n\
endsolid tri\n",
    )
    .unwrap();

    let mut loader = open(&path).unwrap();
    assert_eq!(loader.mesh_format(), MeshFormat::Stl);
    let mut iterator = loader.load().unwrap();
    let chunk = iterator.next().unwrap().expect("one chunk");
    assert_eq!(chunk.vertex_count(), 3);
    assert_eq!(chunk.indices(), &[0, 1, 2]);
}

#[test]
fn binary_round_trip_preserves_obj_mesh_through_reopened_loader() {
    use meshstream::binary::{null_write_listener, BinaryLoader, BinaryWriter};

    let obj_path = temp_path("rt.obj");
    let bin_path = temp_path("rt.bin");
    let _obj_guard = TempFile(obj_path.clone());
    let _bin_guard = TempFile(bin_path.clone());
    std::fs::write(
        &obj_path,
        b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
    )
    .unwrap();

    let mut source = open(&obj_path).unwrap();
    BinaryWriter::write(source.as_mut(), &bin_path, None, null_write_listener()).unwrap();

    let mut binary_loader = BinaryLoader::new();
    binary_loader.set_file(&bin_path).unwrap();
    assert!(binary_loader.is_valid_file().unwrap());
    let mut iterator = binary_loader.load().unwrap();
    let chunk = iterator.next().unwrap().expect("one chunk");
    assert_eq!(chunk.vertex_count(), 3);
    assert_eq!(chunk.indices(), &[0, 1, 2]);
    assert!(iterator.next().unwrap().is_none());
}

#[test]
fn locked_loader_rejects_concurrent_set_file() {
    let path = temp_path("lock.stl");
    let _guard = TempFile(path.clone());
    std::fs::write(&path, b"solid s\nendsolid s\n").unwrap();

    let mut loader = open(&path).unwrap();
    let mut iterator = loader.load().unwrap();
    assert!(matches!(
        loader.set_file(Path::new("irrelevant.stl")),
        Err(meshstream::Error::Locked)
    ));
    while iterator.next().unwrap().is_some() {}
    drop(iterator);
    loader.set_file(&path).unwrap();
}

// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Memory-mapped reader/writer. Large files are segmented into windows so a
//! single mapping never has to cover the whole address space; a primitive
//! read that straddles a segment seam is materialized through a temporary
//! buffer so callers never see the seam.

use super::Backend;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::File;
use std::io;
use std::path::Path;

/// Window size used to segment large mappings. Chosen small enough to be
/// friendly to 32-bit address spaces while large enough that most reads
/// land entirely inside one segment.
const SEGMENT_SIZE: u64 = 256 * 1024 * 1024;

enum Segment {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Segment {
    fn as_slice(&self) -> &[u8] {
        match self {
            Segment::ReadOnly(m) => &m[..],
            Segment::ReadWrite(m) => &m[..],
        }
    }
}

pub struct MappedBackend {
    _file: File,
    segments: Vec<Segment>,
    len: u64,
    writable: bool,
}

impl MappedBackend {
    pub fn open_read_only(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let segments = map_segments(&file, len, false)?;
        Ok(Self {
            _file: file,
            segments,
            len,
            writable: false,
        })
    }

    pub fn open_read_write(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let segments = map_segments(&file, len, true)?;
        Ok(Self {
            _file: file,
            segments,
            len,
            writable: true,
        })
    }

    fn segment_for(&self, offset: u64) -> (usize, usize) {
        let seg_index = (offset / SEGMENT_SIZE) as usize;
        let local = (offset % SEGMENT_SIZE) as usize;
        (seg_index, local)
    }
}

fn map_segments(file: &File, len: u64, writable: bool) -> io::Result<Vec<Segment>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    let mut offset = 0u64;
    while offset < len {
        let this_len = SEGMENT_SIZE.min(len - offset) as usize;
        let seg = if writable {
            // SAFETY: the file is exclusively owned by this backend for the
            // lifetime of the mapping; no other writer targets it per
            // spec §5 ("guarantees nothing if two writers target it").
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(offset)
                    .len(this_len)
                    .map_mut(file)?
            };
            Segment::ReadWrite(mmap)
        } else {
            // SAFETY: read-only reopens of the same file are tolerated per
            // spec §5; we never mutate through this mapping.
            let mmap = unsafe { MmapOptions::new().offset(offset).len(this_len).map(file)? };
            Segment::ReadOnly(mmap)
        };
        segments.push(seg);
        offset += this_len as u64;
    }
    Ok(segments)
}

impl Backend for MappedBackend {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of mapped file",
            ));
        }
        let mut remaining = buf;
        let mut pos = offset;
        while !remaining.is_empty() {
            let (seg_index, local) = self.segment_for(pos);
            let seg = self.segments[seg_index].as_slice();
            let available = seg.len() - local;
            let take = available.min(remaining.len());
            remaining[..take].copy_from_slice(&seg[local..local + take]);
            remaining = &mut remaining[take..];
            pos += take as u64;
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mapped backend opened read-only",
            ));
        }
        if offset + buf.len() as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "write past end of mapped file (mapped backend cannot grow)",
            ));
        }
        let mut remaining = buf;
        let mut pos = offset;
        while !remaining.is_empty() {
            let (seg_index, local) = self.segment_for(pos);
            let take = match &mut self.segments[seg_index] {
                Segment::ReadWrite(m) => {
                    let available = m.len() - local;
                    let take = available.min(remaining.len());
                    m[local..local + take].copy_from_slice(&remaining[..take]);
                    take
                }
                Segment::ReadOnly(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "segment mapped read-only",
                    ))
                }
            };
            remaining = &remaining[take..];
            pos += take as u64;
        }
        Ok(())
    }
}

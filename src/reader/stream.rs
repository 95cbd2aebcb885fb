// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Stream-backed reader/writer: a single file descriptor, sought on every
//! positioned access. `File` already gives us `read_exact_at`/`write_all_at`
//! semantics via `seek` + `read`/`write` since we don't assume platform
//! `pread`/`pwrite`, keeping this portable.

use super::Backend;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub struct StreamBackend {
    file: File,
    len: u64,
}

impl StreamBackend {
    pub fn open_read_only(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    pub fn open_read_write(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file, len: 0 })
    }

    /// Opens a file exclusively for write, as the binary writer does for
    /// texture side files (spec §5: "opened exclusively for write and
    /// closed before the writer returns").
    pub fn create_exclusive(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self { file, len: 0 })
    }
}

impl Backend for StreamBackend {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.len = self.len.max(offset + buf.len() as u64);
        Ok(())
    }
}

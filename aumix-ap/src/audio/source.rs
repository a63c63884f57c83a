//! Seekable byte sources for decoders
//!
//! A decoder is handed a [`ByteSource`] at open time and adapts it to whatever
//! read/seek plumbing its codec library wants. Sources are read from the
//! output callback while a stream plays, so they should be in memory or on
//! fast local storage.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Abstract seekable byte source
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes, returning how many were read (0 at end)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move the read position; returns the new absolute position
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current absolute read position
    fn tell(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Total size in bytes, if known
    fn size(&self) -> Option<u64>;

    /// Whether `seek` is supported
    fn can_seek(&self) -> bool;
}

/// Byte source over an in-memory buffer
///
/// The bytes are shared, so several streams can play the same clip without
/// copying it.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
    pos: u64,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Read a whole file into memory
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.data.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let start = self.pos as usize;
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.pos += count as u64;
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.pos = offset;
                return Ok(offset);
            }
            SeekFrom::Current(offset) => (self.pos, offset),
            SeekFrom::End(offset) => (self.data.len() as u64, offset),
        };

        match base.checked_add_signed(offset) {
            Some(new_pos) => {
                self.pos = new_pos;
                Ok(new_pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn can_seek(&self) -> bool {
        true
    }
}

/// Byte source over a local file
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn size(&self) -> Option<u64> {
        Some(self.len)
    }

    fn can_seek(&self) -> bool {
        true
    }
}

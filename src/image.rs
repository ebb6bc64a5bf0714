/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! The on-disk layout: superblock, region offsets, and the [`Image`] handle
//! that owns the backing host file.
//!
//! The image is a single seekable byte stream divided into five contiguous
//! regions, in order: superblock, block bitmap, inode bitmap, inode table,
//! blocks. Every multi-byte integer is stored little-endian, pinned
//! explicitly rather than inherited from the host's native order, so
//! images are portable between builds.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// The image's magic number.
pub const MAGIC: u32 = 0x53EF_53EF;
/// The only block size this engine supports.
pub const BLOCK_SIZE: u64 = 1024;

/// Number of addressable blocks: one bit per block in the block bitmap.
pub const BLOCK_COUNT: u64 = 1 << 32;
/// Number of addressable inodes: one bit per inode in the inode bitmap.
pub const INODE_COUNT: u64 = 1 << 16;

/// Size in bytes of the on-disk superblock record (two `u32` fields).
pub const SUPERBLOCK_SIZE: u64 = 8;
/// Size in bytes of the block bitmap region.
pub const BLOCK_BITMAP_SIZE: u64 = BLOCK_COUNT / 8;
/// Size in bytes of the inode bitmap region.
pub const INODE_BITMAP_SIZE: u64 = INODE_COUNT / 8;
/// Size in bytes of one inode record.
pub const INODE_SIZE: u64 = 64;
/// Size in bytes of the inode table region.
pub const INODE_TABLE_SIZE: u64 = INODE_COUNT * INODE_SIZE;

/// Offset of the superblock.
pub const SUPERBLOCK_OFFSET: u64 = 0;
/// Offset of the block bitmap region.
pub const BLOCK_BITMAP_OFFSET: u64 = SUPERBLOCK_OFFSET + SUPERBLOCK_SIZE;
/// Offset of the inode bitmap region.
pub const INODE_BITMAP_OFFSET: u64 = BLOCK_BITMAP_OFFSET + BLOCK_BITMAP_SIZE;
/// Offset of the inode table region.
pub const INODE_TABLE_OFFSET: u64 = INODE_BITMAP_OFFSET + INODE_BITMAP_SIZE;
/// Offset of the first block of the blocks region.
pub const BLOCKS_OFFSET: u64 = INODE_TABLE_OFFSET + INODE_TABLE_SIZE;

/// Inode pointer of the root directory. Always allocated.
pub const ROOT_INODE: u16 = 0;

/// A file's type, stored as a signed 32-bit integer in its inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// The inode slot is unused.
    None,
    /// A directory.
    Directory,
    /// A regular file.
    Regular,
}

impl FileType {
    fn to_i32(self) -> i32 {
        match self {
            Self::None => -1,
            Self::Directory => 0,
            Self::Regular => 1,
        }
    }

    fn from_i32(v: i32) -> Self {
        match v {
            0 => Self::Directory,
            1 => Self::Regular,
            _ => Self::None,
        }
    }
}

/// In-memory representation of a 64-byte inode record.
#[derive(Debug, Clone, Copy)]
pub struct Inode {
    /// The kind of file this inode describes.
    pub file_type: FileType,
    /// Number of data blocks holding the file's payload, not counting
    /// intermediate index blocks.
    pub file_size: u32,
    /// Direct (`[0..11)`), single- (`[11]`), double- (`[12]`) and
    /// triple-indirect (`[13]`) block pointers.
    pub block_p: [u32; 14],
}

impl Inode {
    /// The empty, unallocated inode record.
    pub const EMPTY: Self = Self {
        file_type: FileType::None,
        file_size: 0,
        block_p: [0; 14],
    };

    /// Returns whether this inode describes a directory.
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Returns whether this inode describes a regular file.
    pub fn is_regular(&self) -> bool {
        self.file_type == FileType::Regular
    }

    fn to_bytes(self) -> [u8; INODE_SIZE as usize] {
        let mut buf = [0u8; INODE_SIZE as usize];
        buf[0..4].copy_from_slice(&self.file_type.to_i32().to_le_bytes());
        buf[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        for (i, p) in self.block_p.iter().enumerate() {
            let off = 8 + i * 4;
            buf[off..off + 4].copy_from_slice(&p.to_le_bytes());
        }
        buf
    }

    fn from_bytes(buf: &[u8; INODE_SIZE as usize]) -> Self {
        let file_type = FileType::from_i32(i32::from_le_bytes(buf[0..4].try_into().unwrap()));
        let file_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let mut block_p = [0u32; 14];
        for (i, p) in block_p.iter_mut().enumerate() {
            let off = 8 + i * 4;
            *p = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        }
        Self {
            file_type,
            file_size,
            block_p,
        }
    }
}

/// A handle on the backing host file implementing the on-disk layout above.
///
/// There is no hidden global state: every operation in this crate takes an
/// `&mut Image` explicitly.
pub struct Image {
    file: File,
}

impl Image {
    /// Opens an existing image at `path`.
    ///
    /// Fails with [`Error::BadImage`] if the magic or block size read from
    /// the superblock do not match.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.seek(SeekFrom::Start(SUPERBLOCK_OFFSET))?;
        let mut buf = [0u8; SUPERBLOCK_SIZE as usize];
        file.read_exact(&mut buf)?;
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let block_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if magic != MAGIC || block_size as u64 != BLOCK_SIZE {
            return Err(Error::BadImage);
        }
        Ok(Self { file })
    }

    /// Creates a new image at `path`, truncating any existing content, with
    /// just the root directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        // Superblock.
        file.seek(SeekFrom::Start(SUPERBLOCK_OFFSET))?;
        file.write_all(&MAGIC.to_le_bytes())?;
        file.write_all(&(BLOCK_SIZE as u32).to_le_bytes())?;

        // Block bitmap: only bit 0 (root's first block) is set.
        let mut page = [0u8; crate::bitmap::PAGE_SIZE];
        crate::bitmap::set_bit(&mut page, 0);
        crate::bitmap::write_page(&mut file, BLOCK_BITMAP_OFFSET, 0, &page)?;

        // Inode bitmap: only bit 0 (root) is set.
        let mut page = [0u8; crate::bitmap::PAGE_SIZE];
        crate::bitmap::set_bit(&mut page, 0);
        crate::bitmap::write_page(&mut file, INODE_BITMAP_OFFSET, 0, &page)?;

        // Inode table: slot 0 is the root directory, the rest are empty.
        let mut root = Inode::EMPTY;
        root.file_type = FileType::Directory;
        root.file_size = 1;
        root.block_p[0] = 0;
        file.seek(SeekFrom::Start(INODE_TABLE_OFFSET))?;
        file.write_all(&root.to_bytes())?;
        let empty = Inode::EMPTY.to_bytes();
        for _ in 1..INODE_COUNT {
            file.write_all(&empty)?;
        }

        let mut this = Self { file };
        // Root's first directory block: `.` and `..` both point at inode 0.
        let mut block = [0u8; BLOCK_SIZE as usize];
        crate::dir::init_block(&mut block, Some((ROOT_INODE, ROOT_INODE)));
        this.update_block(0, &block)?;

        Ok(this)
    }

    /// Reads inode `p` from the inode table.
    pub fn get_inode(&mut self, p: u16) -> Result<Inode> {
        self.file
            .seek(SeekFrom::Start(INODE_TABLE_OFFSET + p as u64 * INODE_SIZE))?;
        let mut buf = [0u8; INODE_SIZE as usize];
        self.file.read_exact(&mut buf)?;
        Ok(Inode::from_bytes(&buf))
    }

    /// Writes `inode` to slot `p` of the inode table.
    pub fn update_inode(&mut self, p: u16, inode: &Inode) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(INODE_TABLE_OFFSET + p as u64 * INODE_SIZE))?;
        self.file.write_all(&inode.to_bytes())?;
        Ok(())
    }

    /// Reads block `p` of the blocks region.
    pub fn get_block(&mut self, p: u32) -> Result<[u8; BLOCK_SIZE as usize]> {
        self.file
            .seek(SeekFrom::Start(BLOCKS_OFFSET + p as u64 * BLOCK_SIZE))?;
        let mut buf = [0u8; BLOCK_SIZE as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `data` (exactly `BLOCK_SIZE` bytes) to block `p`.
    ///
    /// This extends the host file if `p` is the first use of a block number
    /// beyond its current length (the host file never shrinks again).
    pub fn update_block(&mut self, p: u32, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), BLOCK_SIZE as usize);
        self.file
            .seek(SeekFrom::Start(BLOCKS_OFFSET + p as u64 * BLOCK_SIZE))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Returns whether block `p`'s bit is set AND its byte offset lies
    /// within the current host-file length.
    pub fn is_block_allocated(&mut self, p: u32) -> Result<bool> {
        let bit_set = crate::bitmap::is_bit_set(&mut self.file, BLOCK_BITMAP_OFFSET, p as u64)?;
        if !bit_set {
            return Ok(false);
        }
        let len = self.file.metadata()?.len();
        Ok(BLOCKS_OFFSET + BLOCK_SIZE * p as u64 < len)
    }

    /// Direct access to the backing file, for the allocators and bitmap
    /// scans that operate on a whole region rather than a single record.
    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

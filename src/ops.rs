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

//! Composite operations built on the allocators, indirection engine and
//! directory primitives: create/remove within a directory, recursive
//! remove, regular-file byte streams, and the two size computations.

use crate::dir::{
    init_block, is_block_empty, is_block_full, read_record, write_record, DirRecord,
    RECORDS_PER_BLOCK,
};
use crate::error::{Error, Result};
use crate::image::{FileType, Image, Inode, BLOCK_SIZE};
use crate::inode_alloc::{free_inode, occupy_inode};
use crate::indirect::{
    get_block_k, inode_block_append, inode_block_pop, PopOutcome, DIRECT_COUNT, PTRS_PER_BLOCK,
};
use crate::path::require_directory;
use crate::util::ceil_division;

/// The byte value marking the logical end of a regular file's payload,
/// embedded in-band in the file's last block.
pub const EOF_SENTINEL: u8 = 0xFF;

/// Creates a file or directory named `name` inside `dir`.
///
/// `dir` must be a directory ([`Error::WrongType`] otherwise), and `file_type`
/// must be [`FileType::Directory`] or [`FileType::Regular`]
/// ([`Error::Unsupported`] otherwise). Name validity and uniqueness are the
/// command surface's responsibility, not this primitive's.
pub fn create_file_in_dir(
    img: &mut Image,
    dir: u16,
    file_type: FileType,
    name: &str,
) -> Result<u16> {
    let mut dir_inode = require_directory(img, dir)?;
    if !matches!(file_type, FileType::Directory | FileType::Regular) {
        return Err(Error::Unsupported);
    }

    let mut last_k = dir_inode.file_size as u64 - 1;
    let mut last_block_num = get_block_k(img, &dir_inode, last_k)?;
    let mut last_block = img.get_block(last_block_num)?;
    if is_block_full(&last_block) {
        inode_block_append(img, &mut dir_inode)?;
        img.update_inode(dir, &dir_inode)?;
        last_k = dir_inode.file_size as u64 - 1;
        last_block_num = get_block_k(img, &dir_inode, last_k)?;
        last_block = img.get_block(last_block_num)?;
    }

    let new_inode_p = occupy_inode(img)?;
    let mut new_inode = Inode::EMPTY;
    new_inode.file_type = file_type;
    if file_type == FileType::Directory {
        inode_block_append(img, &mut new_inode)?;
        let first_block_num = new_inode.block_p[0];
        let mut first_block = img.get_block(first_block_num)?;
        init_block(&mut first_block, Some((new_inode_p, dir)));
        img.update_block(first_block_num, &first_block)?;
    }
    img.update_inode(new_inode_p, &new_inode)?;

    let slot = (0..RECORDS_PER_BLOCK)
        .find(|&i| read_record(&last_block, i).is_empty())
        .expect("last_block was just ensured to have a free slot");
    write_record(&mut last_block, slot, DirRecord::new(new_inode_p, name));
    img.update_block(last_block_num, &last_block)?;

    Ok(new_inode_p)
}

/// Recursively removes `inode_p` and, if it is a directory, everything
/// under it. Frees every data/index block and finally the inode itself.
pub fn remove_file(img: &mut Image, inode_p: u16) -> Result<()> {
    let mut inode = img.get_inode(inode_p)?;
    if inode.is_directory() {
        let mut children = Vec::new();
        for k in 0..inode.file_size as u64 {
            let block_num = get_block_k(img, &inode, k)?;
            let block = img.get_block(block_num)?;
            let start = if k == 0 { 2 } else { 0 };
            for i in start..RECORDS_PER_BLOCK {
                let record = read_record(&block, i);
                if !record.is_empty() {
                    children.push(record.inode_p);
                }
            }
        }
        for child in children {
            remove_file(img, child)?;
        }
    }
    loop {
        match inode_block_pop(img, &mut inode)? {
            PopOutcome::Success => continue,
            PopOutcome::Nothing | PopOutcome::OutOfRange => break,
        }
    }
    img.update_inode(inode_p, &inode)?;
    free_inode(img, inode_p)
}

/// Locates the structurally last non-empty record of `dir_inode`, skipping
/// `.`/`..` if that record would fall in the directory's first block.
fn find_last_record(img: &mut Image, dir_inode: &Inode) -> Result<(u64, usize, DirRecord)> {
    let last_k = dir_inode.file_size as u64 - 1;
    let block_num = get_block_k(img, dir_inode, last_k)?;
    let block = img.get_block(block_num)?;
    let start = if last_k == 0 { 2 } else { 0 };
    for i in (start..RECORDS_PER_BLOCK).rev() {
        let record = read_record(&block, i);
        if !record.is_empty() {
            return Ok((last_k, i, record));
        }
    }
    Err(Error::NotFound)
}

/// Removes `victim` from `dir`'s records (swap-with-last-record deletion,
/// which keeps the packing invariant) and then recursively removes it.
///
/// Fails with [`Error::WrongType`] if `dir` is not a directory, or
/// [`Error::NotFound`] if `victim` is not one of its entries.
pub fn remove_file_from_dir(img: &mut Image, dir: u16, victim: u16) -> Result<()> {
    let mut dir_inode = require_directory(img, dir)?;

    let (last_k, last_idx, last_record) = find_last_record(img, &dir_inode)?;
    let last_block_num = get_block_k(img, &dir_inode, last_k)?;
    let mut last_block = img.get_block(last_block_num)?;
    write_record(&mut last_block, last_idx, DirRecord::EMPTY);
    img.update_block(last_block_num, &last_block)?;
    if is_block_empty(&last_block) {
        inode_block_pop(img, &mut dir_inode)?;
        img.update_inode(dir, &dir_inode)?;
    }

    if last_record.inode_p == victim {
        return remove_file(img, victim);
    }

    let mut found = false;
    'outer: for k in 0..dir_inode.file_size as u64 {
        let block_num = get_block_k(img, &dir_inode, k)?;
        let mut block = img.get_block(block_num)?;
        let start = if k == 0 { 2 } else { 0 };
        for i in start..RECORDS_PER_BLOCK {
            let record = read_record(&block, i);
            if !record.is_empty() && record.inode_p == victim {
                write_record(&mut block, i, last_record);
                img.update_block(block_num, &block)?;
                found = true;
                break 'outer;
            }
        }
    }
    if !found {
        return Err(Error::NotFound);
    }
    remove_file(img, victim)
}

/// Number of index blocks needed to address `used` leaf entries at
/// indirection depth `depth` (1 = single, 2 = double, 3 = triple),
/// including the region's own top index block.
fn index_blocks_for_region(used: u64, depth: u32) -> u64 {
    let mut total = 1u64;
    for sub in 1..depth {
        total += ceil_division(used, PTRS_PER_BLOCK.pow(sub));
    }
    total
}

/// Number of blocks `inode` occupies on disk, including intermediate index
/// blocks, derived analytically from `file_size`.
pub fn get_size_on_disk(inode: &Inode) -> u64 {
    let mut n = inode.file_size as u64;
    let mut total = n;
    if n <= DIRECT_COUNT {
        return total;
    }
    n -= DIRECT_COUNT;
    for depth in 1..=3u32 {
        if n == 0 {
            break;
        }
        let capacity = PTRS_PER_BLOCK.pow(depth);
        let used = n.min(capacity);
        total += index_blocks_for_region(used, depth);
        n -= used;
    }
    total
}

/// Byte length of a regular file: `(file_size - 1) * BLOCK_SIZE + offset`,
/// where `offset` is the position of the first [`EOF_SENTINEL`] byte in the
/// last block. Empty files (`file_size == 0`) are zero bytes.
///
/// Fails with [`Error::CorruptFile`] if the last block has no sentinel.
pub fn get_regular_file_size(img: &mut Image, inode: &Inode) -> Result<u64> {
    if !inode.is_regular() {
        return Err(Error::WrongType);
    }
    if inode.file_size == 0 {
        return Ok(0);
    }
    let last_k = inode.file_size as u64 - 1;
    let last_block_num = get_block_k(img, inode, last_k)?;
    let block = img.get_block(last_block_num)?;
    match block.iter().position(|&b| b == EOF_SENTINEL) {
        Some(offset) => Ok(last_k * BLOCK_SIZE + offset as u64),
        None => Err(Error::CorruptFile),
    }
}

/// Writes `data` as the content of regular file `inode_p`, appending blocks
/// as needed and terminating with [`EOF_SENTINEL`].
///
/// If `data`'s length is a nonzero exact multiple of `BLOCK_SIZE`, one
/// extra block holding only the sentinel at offset 0 is appended — this
/// matches the reference behavior this engine was modeled on and is what
/// keeps the upload/download round trip exact (see spec's upload
/// short-write note).
pub fn write_regular_file(img: &mut Image, inode_p: u16, data: &[u8]) -> Result<()> {
    let mut inode = img.get_inode(inode_p)?;
    if !inode.is_regular() {
        return Err(Error::WrongType);
    }
    let block_size = BLOCK_SIZE as usize;
    let mut offset = 0;
    while offset < data.len() {
        let chunk_len = (data.len() - offset).min(block_size);
        let mut block = [0u8; BLOCK_SIZE as usize];
        block[..chunk_len].copy_from_slice(&data[offset..offset + chunk_len]);
        if chunk_len < block_size {
            block[chunk_len] = EOF_SENTINEL;
        }
        inode_block_append(img, &mut inode)?;
        let block_num = get_block_k(img, &inode, inode.file_size as u64 - 1)?;
        img.update_block(block_num, &block)?;
        offset += chunk_len;
    }
    if !data.is_empty() && data.len() % block_size == 0 {
        let mut block = [0u8; BLOCK_SIZE as usize];
        block[0] = EOF_SENTINEL;
        inode_block_append(img, &mut inode)?;
        let block_num = get_block_k(img, &inode, inode.file_size as u64 - 1)?;
        img.update_block(block_num, &block)?;
    }
    img.update_inode(inode_p, &inode)?;
    Ok(())
}

/// Reads the content of regular file `inode_p` up to (not including) its
/// [`EOF_SENTINEL`].
pub fn read_regular_file(img: &mut Image, inode_p: u16) -> Result<Vec<u8>> {
    let inode = img.get_inode(inode_p)?;
    if !inode.is_regular() {
        return Err(Error::WrongType);
    }
    if inode.file_size == 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for k in 0..inode.file_size as u64 {
        let block_num = get_block_k(img, &inode, k)?;
        let block = img.get_block(block_num)?;
        if let Some(pos) = block.iter().position(|&b| b == EOF_SENTINEL) {
            out.extend_from_slice(&block[..pos]);
            return Ok(out);
        }
        out.extend_from_slice(&block);
    }
    Err(Error::CorruptFile)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::ROOT_INODE;
    use std::env::temp_dir;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn fresh_image() -> Image {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = temp_dir().join(format!("vfs-ops-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    #[test]
    fn create_and_lookup() {
        let mut img = fresh_image();
        let foo = create_file_in_dir(&mut img, ROOT_INODE, FileType::Directory, "foo").unwrap();
        let root = img.get_inode(ROOT_INODE).unwrap();
        assert_eq!(
            crate::dir::get_inode_by_name(&mut img, &root, "foo").unwrap(),
            foo
        );
        let foo_inode = img.get_inode(foo).unwrap();
        assert!(foo_inode.is_directory());
        assert_eq!(foo_inode.file_size, 1);
    }

    #[test]
    fn fills_second_directory_block() {
        let mut img = fresh_image();
        for i in 0..64 {
            create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, &format!("f{i}")).unwrap();
        }
        let root = img.get_inode(ROOT_INODE).unwrap();
        assert_eq!(root.file_size, 1);
        create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "overflow").unwrap();
        let root = img.get_inode(ROOT_INODE).unwrap();
        assert_eq!(root.file_size, 2);
    }

    #[test]
    fn remove_file_from_dir_swap_with_last() {
        let mut img = fresh_image();
        let a = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "a").unwrap();
        let b = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "b").unwrap();
        let c = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "c").unwrap();
        // Remove the middle record; "c" (last) must be swapped into "b"'s slot.
        remove_file_from_dir(&mut img, ROOT_INODE, b).unwrap();
        let root = img.get_inode(ROOT_INODE).unwrap();
        assert!(crate::dir::get_inode_by_name(&mut img, &root, "a").is_ok());
        assert!(crate::dir::get_inode_by_name(&mut img, &root, "b").is_err());
        assert_eq!(
            crate::dir::get_inode_by_name(&mut img, &root, "c").unwrap(),
            c
        );
        let _ = a;
    }

    #[test]
    fn recursive_remove_frees_everything() {
        let mut img = fresh_image();
        let a = create_file_in_dir(&mut img, ROOT_INODE, FileType::Directory, "a").unwrap();
        create_file_in_dir(&mut img, a, FileType::Regular, "x").unwrap();
        let b = create_file_in_dir(&mut img, a, FileType::Directory, "b").unwrap();
        create_file_in_dir(&mut img, b, FileType::Regular, "y").unwrap();
        remove_file_from_dir(&mut img, ROOT_INODE, a).unwrap();
        let root = img.get_inode(ROOT_INODE).unwrap();
        assert_eq!(root.file_size, 1);
        assert!(crate::dir::get_inode_by_name(&mut img, &root, "a").is_err());
    }

    #[test]
    fn upload_download_roundtrip() {
        let mut img = fresh_image();
        let f = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "f").unwrap();
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        write_regular_file(&mut img, f, &data).unwrap();
        let back = read_regular_file(&mut img, f).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn upload_exact_multiple_appends_sentinel_block() {
        let mut img = fresh_image();
        let f = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "f").unwrap();
        let data = vec![7u8; BLOCK_SIZE as usize * 2];
        write_regular_file(&mut img, f, &data).unwrap();
        let inode = img.get_inode(f).unwrap();
        assert_eq!(inode.file_size, 3);
        let back = read_regular_file(&mut img, f).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn empty_file_has_no_blocks() {
        let mut img = fresh_image();
        let f = create_file_in_dir(&mut img, ROOT_INODE, FileType::Regular, "f").unwrap();
        let inode = img.get_inode(f).unwrap();
        assert_eq!(inode.file_size, 0);
        assert_eq!(get_regular_file_size(&mut img, &inode).unwrap(), 0);
    }

    #[test]
    fn size_on_disk_direct_only() {
        let inode = Inode {
            file_type: FileType::Regular,
            file_size: 5,
            block_p: [0; 14],
        };
        assert_eq!(get_size_on_disk(&inode), 5);
    }

    #[test]
    fn size_on_disk_single_indirect() {
        let inode = Inode {
            file_type: FileType::Regular,
            file_size: 12,
            block_p: [0; 14],
        };
        assert_eq!(get_size_on_disk(&inode), 13);
    }
}

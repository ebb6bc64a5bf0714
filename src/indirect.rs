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

//! Translates a logical block index of an inode into a physical block
//! number through the direct / single / double / triple indirect levels,
//! and grows/shrinks an inode's block chain one block at a time.

use crate::block_alloc::{free_block, occupy_block};
use crate::error::{Error, Result};
use crate::image::{Image, Inode, BLOCK_SIZE};

/// Number of direct block pointers in an inode (`block_p[0..11)`).
pub const DIRECT_COUNT: u64 = 11;
/// Number of block pointers that fit in one index block (`BLOCK_SIZE / 4`).
pub const PTRS_PER_BLOCK: u64 = BLOCK_SIZE / 4;

/// The three indirection depths and the inode slot that roots each.
const INDIRECT_LEVELS: [(u32, usize); 3] = [(1, 11), (2, 12), (3, 13)];

/// Outcome of [`inode_block_pop`].
#[derive(Debug, PartialEq, Eq)]
pub enum PopOutcome {
    /// A block was removed.
    Success,
    /// The inode was already empty.
    Nothing,
    /// The inode's logical index space was exceeded (should not happen for
    /// a consistent inode; surfaced defensively).
    OutOfRange,
}

fn read_ptr(block: &[u8; BLOCK_SIZE as usize], idx: usize) -> u32 {
    let off = idx * 4;
    u32::from_le_bytes(block[off..off + 4].try_into().unwrap())
}

fn write_ptr(block: &mut [u8; BLOCK_SIZE as usize], idx: usize, value: u32) {
    let off = idx * 4;
    block[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

/// Translates logical block index `k` of `inode` to a physical block
/// number.
///
/// Fails with [`Error::OutOfRange`] if `k >= inode.file_size`, or if `k`
/// exceeds the triple-indirect capacity.
pub fn get_block_k(img: &mut Image, inode: &Inode, k: u64) -> Result<u32> {
    if k >= inode.file_size as u64 {
        return Err(Error::OutOfRange);
    }
    if k < DIRECT_COUNT {
        return Ok(inode.block_p[k as usize]);
    }
    let mut k = k - DIRECT_COUNT;
    for (depth, slot) in INDIRECT_LEVELS {
        let capacity = PTRS_PER_BLOCK.pow(depth);
        if k < capacity {
            let mut block_num = inode.block_p[slot];
            let mut remaining = k;
            for level in (1..=depth).rev() {
                let divisor = PTRS_PER_BLOCK.pow(level - 1);
                let p = (remaining / divisor) as usize;
                remaining %= divisor;
                let block = img.get_block(block_num)?;
                block_num = read_ptr(&block, p);
            }
            return Ok(block_num);
        }
        k -= capacity;
    }
    Err(Error::OutOfRange)
}

/// Recursively descends `depth` levels of index blocks rooted at
/// `block_num`, allocating an index block at any slot visited for the
/// first time (`remaining == 0` at that level), and finally allocates one
/// data block at the leaf. Returns the new data block's number.
fn append_in_index_block(img: &mut Image, block_num: u32, depth: u32, k: u64) -> Result<u32> {
    let divisor = PTRS_PER_BLOCK.pow(depth - 1);
    let slot = (k / divisor) as usize;
    let remaining = k % divisor;
    let mut block = img.get_block(block_num)?;
    if depth == 1 {
        let data = occupy_block(img)?;
        write_ptr(&mut block, slot, data);
        img.update_block(block_num, &block)?;
        Ok(data)
    } else if remaining == 0 {
        let child = occupy_block(img)?;
        write_ptr(&mut block, slot, child);
        img.update_block(block_num, &block)?;
        append_in_index_block(img, child, depth - 1, remaining)
    } else {
        let child = read_ptr(&block, slot);
        append_in_index_block(img, child, depth - 1, remaining)
    }
}

/// Appends one new data block to the end of `inode`, growing it by one
/// logical block, allocating any index blocks newly needed along the way.
/// Mutates `inode` in memory; the caller must persist it with
/// [`Image::update_inode`].
///
/// Fails with [`Error::NoSpace`] if a block allocation fails, or
/// [`Error::OutOfRange`] if the inode is already at triple-indirect
/// capacity.
pub fn inode_block_append(img: &mut Image, inode: &mut Inode) -> Result<()> {
    let k = inode.file_size as u64;
    if k < DIRECT_COUNT {
        let new_block = occupy_block(img)?;
        inode.block_p[k as usize] = new_block;
        inode.file_size += 1;
        return Ok(());
    }
    let mut k = k - DIRECT_COUNT;
    for (depth, slot) in INDIRECT_LEVELS {
        let capacity = PTRS_PER_BLOCK.pow(depth);
        if k < capacity {
            let top = if k == 0 {
                let new_top = occupy_block(img)?;
                inode.block_p[slot] = new_top;
                new_top
            } else {
                inode.block_p[slot]
            };
            append_in_index_block(img, top, depth, k)?;
            inode.file_size += 1;
            return Ok(());
        }
        k -= capacity;
    }
    Err(Error::OutOfRange)
}

/// Recursively descends to free the last-used data block at `k` under the
/// index block `block_num`. Returns whether `block_num` itself became
/// empty as a result (the data block removed was its first entry), in
/// which case the caller must free `block_num` and clear its parent slot.
fn pop_in_index_block(img: &mut Image, block_num: u32, depth: u32, k: u64) -> Result<bool> {
    let divisor = PTRS_PER_BLOCK.pow(depth - 1);
    let slot = (k / divisor) as usize;
    let remaining = k % divisor;
    let mut block = img.get_block(block_num)?;
    if depth == 1 {
        let data = read_ptr(&block, slot);
        free_block(img, data)?;
        write_ptr(&mut block, slot, 0);
        img.update_block(block_num, &block)?;
        Ok(slot == 0)
    } else {
        let child = read_ptr(&block, slot);
        let child_empty = pop_in_index_block(img, child, depth - 1, remaining)?;
        if child_empty {
            free_block(img, child)?;
            write_ptr(&mut block, slot, 0);
            img.update_block(block_num, &block)?;
        }
        Ok(child_empty && slot == 0)
    }
}

/// Removes the last data block of `inode` (logical index `file_size - 1`),
/// freeing any index blocks that become empty as a result. Mutates `inode`
/// in memory; the caller must persist it.
pub fn inode_block_pop(img: &mut Image, inode: &mut Inode) -> Result<PopOutcome> {
    if inode.file_size == 0 {
        return Ok(PopOutcome::Nothing);
    }
    let k = (inode.file_size - 1) as u64;
    if k < DIRECT_COUNT {
        let p = inode.block_p[k as usize];
        free_block(img, p)?;
        inode.block_p[k as usize] = 0;
        inode.file_size -= 1;
        return Ok(PopOutcome::Success);
    }
    let mut k = k - DIRECT_COUNT;
    for (depth, slot) in INDIRECT_LEVELS {
        let capacity = PTRS_PER_BLOCK.pow(depth);
        if k < capacity {
            let top = inode.block_p[slot];
            if pop_in_index_block(img, top, depth, k)? {
                free_block(img, top)?;
                inode.block_p[slot] = 0;
            }
            inode.file_size -= 1;
            return Ok(PopOutcome::Success);
        }
        k -= capacity;
    }
    Ok(PopOutcome::OutOfRange)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn fresh_image() -> Image {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = temp_dir().join(format!("vfs-indirect-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    fn fresh_inode(img: &mut Image) -> (u16, Inode) {
        let p = crate::inode_alloc::occupy_inode(img).unwrap();
        let mut inode = img.get_inode(p).unwrap();
        inode.file_type = crate::image::FileType::Regular;
        (p, inode)
    }

    #[test]
    fn direct_blocks_roundtrip() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        for _ in 0..11 {
            inode_block_append(&mut img, &mut inode).unwrap();
        }
        assert_eq!(inode.file_size, 11);
        for k in 0..11 {
            let b = get_block_k(&mut img, &inode, k).unwrap();
            assert_eq!(b, inode.block_p[k as usize]);
        }
    }

    #[test]
    fn crosses_into_single_indirect() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        for _ in 0..12 {
            inode_block_append(&mut img, &mut inode).unwrap();
        }
        assert_eq!(inode.file_size, 12);
        assert_ne!(inode.block_p[11], 0);
        let b11 = get_block_k(&mut img, &inode, 11).unwrap();
        assert!(img.is_block_allocated(b11).unwrap());
    }

    #[test]
    fn crosses_into_double_indirect() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        for _ in 0..(11 + 256 + 1) {
            inode_block_append(&mut img, &mut inode).unwrap();
        }
        assert_eq!(inode.file_size, 11 + 256 + 1);
        assert_ne!(inode.block_p[12], 0);
        let b = get_block_k(&mut img, &inode, 11 + 256).unwrap();
        assert!(img.is_block_allocated(b).unwrap());
    }

    #[test]
    fn pop_boundary_frees_index_block() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        for _ in 0..12 {
            inode_block_append(&mut img, &mut inode).unwrap();
        }
        let single_indirect = inode.block_p[11];
        assert!(img.is_block_allocated(single_indirect).unwrap());
        // Pop the 12th block (index 11), the only entry under the
        // single-indirect block, which must free it.
        let outcome = inode_block_pop(&mut img, &mut inode).unwrap();
        assert_eq!(outcome, PopOutcome::Success);
        assert_eq!(inode.file_size, 11);
        assert_eq!(inode.block_p[11], 0);
        assert!(!img.is_block_allocated(single_indirect).unwrap());
    }

    #[test]
    fn pop_on_empty_inode_is_nothing() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        assert_eq!(inode_block_pop(&mut img, &mut inode).unwrap(), PopOutcome::Nothing);
    }

    #[test]
    fn get_block_k_out_of_range_past_file_size() {
        let mut img = fresh_image();
        let (_p, mut inode) = fresh_inode(&mut img);
        inode_block_append(&mut img, &mut inode).unwrap();
        assert!(matches!(get_block_k(&mut img, &inode, 1), Err(Error::OutOfRange)));
    }
}

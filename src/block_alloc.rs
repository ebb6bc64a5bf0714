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

//! The block allocator: finds a free block via the block bitmap, zeroes and
//! extends the host file to materialize it, and frees blocks by clearing
//! their bit (the host file is never shrunk back).

use crate::bitmap;
use crate::error::{Error, Result};
use crate::image::{Image, BLOCK_BITMAP_OFFSET, BLOCK_COUNT, BLOCK_SIZE};

/// Allocates a new data block: the lowest-indexed clear bit of the block
/// bitmap is set, and the host file is extended with a zero-filled block at
/// that block's offset.
///
/// Fails with [`Error::NoSpace`] if the block bitmap has no clear bit left.
pub fn occupy_block(img: &mut Image) -> Result<u32> {
    let bit = bitmap::occupy_lowest_clear(img.file_mut(), BLOCK_BITMAP_OFFSET, BLOCK_COUNT)?
        .ok_or(Error::NoSpace)?;
    let p = bit as u32;
    img.update_block(p, &[0u8; BLOCK_SIZE as usize])?;
    Ok(p)
}

/// Frees block `p`: clears its bit. Does not shrink the host file.
pub fn free_block(img: &mut Image, p: u32) -> Result<()> {
    bitmap::free_bit(img.file_mut(), BLOCK_BITMAP_OFFSET, p as u64)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn fresh_image() -> Image {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = temp_dir().join(format!("vfs-block-alloc-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    #[test]
    fn occupy_then_free_reuses_bit() {
        let mut img = fresh_image();
        let a = occupy_block(&mut img).unwrap();
        let b = occupy_block(&mut img).unwrap();
        assert_ne!(a, b);
        free_block(&mut img, a).unwrap();
        let c = occupy_block(&mut img).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn allocated_block_is_allocated() {
        let mut img = fresh_image();
        let p = occupy_block(&mut img).unwrap();
        assert!(img.is_block_allocated(p).unwrap());
        free_block(&mut img, p).unwrap();
        assert!(!img.is_block_allocated(p).unwrap());
    }
}

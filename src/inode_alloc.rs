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

//! The inode allocator: analogous to [`crate::block_alloc`] but over the
//! (much smaller, single-page) inode bitmap.

use crate::bitmap;
use crate::error::{Error, Result};
use crate::image::{Image, Inode, INODE_BITMAP_OFFSET, INODE_COUNT};

/// Allocates a new inode: the lowest-indexed clear bit of the inode bitmap
/// is set and the slot is initialized to [`Inode::EMPTY`].
///
/// Fails with [`Error::NoSpace`] if the inode bitmap has no clear bit left.
pub fn occupy_inode(img: &mut Image) -> Result<u16> {
    let bit = bitmap::occupy_lowest_clear(img.file_mut(), INODE_BITMAP_OFFSET, INODE_COUNT)?
        .ok_or(Error::NoSpace)?;
    let p = bit as u16;
    img.update_inode(p, &Inode::EMPTY)?;
    Ok(p)
}

/// Frees inode `p`: clears its bit. The slot's contents are left untouched
/// for the next occupier to overwrite.
pub fn free_inode(img: &mut Image, p: u16) -> Result<()> {
    bitmap::free_bit(img.file_mut(), INODE_BITMAP_OFFSET, p as u64)?;
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
        let path = temp_dir().join(format!("vfs-inode-alloc-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    #[test]
    fn occupy_skips_root() {
        let mut img = fresh_image();
        let p = occupy_inode(&mut img).unwrap();
        assert_ne!(p, 0);
    }

    #[test]
    fn occupy_then_free_reuses_bit() {
        let mut img = fresh_image();
        let a = occupy_inode(&mut img).unwrap();
        let b = occupy_inode(&mut img).unwrap();
        assert_ne!(a, b);
        free_inode(&mut img, a).unwrap();
        let c = occupy_inode(&mut img).unwrap();
        assert_eq!(a, c);
    }
}

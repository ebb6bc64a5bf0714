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

//! `vfscore`: a single-file virtual filesystem engine.
//!
//! An image is one host file laid out as a superblock, a block bitmap, an
//! inode bitmap, an inode table and a blocks region (see [`image`]). On top
//! of that raw layout sit the block allocator ([`block_alloc`]), the inode
//! allocator ([`inode_alloc`]), the direct/indirect block addressing scheme
//! ([`indirect`]), directory records ([`dir`]), path resolution
//! ([`path`]), the composite operations that tie them together
//! ([`ops`]), and finally the command surface ([`commands`]) that the
//! `vfsh`/`vfsd` binaries dispatch into.

pub mod bitmap;
pub mod block_alloc;
pub mod commands;
pub mod dir;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod indirect;
pub mod inode_alloc;
pub mod ops;
pub mod path;
pub mod util;

pub use error::{Error, Result};
pub use image::Image;

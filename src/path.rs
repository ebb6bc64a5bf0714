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

//! Path resolution (walking `/`-separated segments) and naming (full path
//! reconstruction by climbing `..`).

use crate::dir::{get_inode_by_name, get_name_by_inode};
use crate::error::{Error, Result};
use crate::image::{Image, Inode, INODE_COUNT, ROOT_INODE};

fn name_bytes_to_string(name: [u8; 14]) -> String {
    let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    String::from_utf8_lossy(&name[..len]).into_owned()
}

/// Returns the inode pointer of `inode_p`'s parent directory, via its `..`
/// record.
///
/// Fails with [`Error::WrongType`] if `inode_p` is not a directory.
pub fn get_parent_directory(img: &mut Image, inode_p: u16) -> Result<u16> {
    let inode = img.get_inode(inode_p)?;
    if !inode.is_directory() {
        return Err(Error::WrongType);
    }
    get_inode_by_name(img, &inode, "..")
}

/// Returns `inode_p`'s own name as recorded in its parent, or the empty
/// string for the root.
pub fn get_directory_name(img: &mut Image, inode_p: u16) -> Result<String> {
    if inode_p == ROOT_INODE {
        return Ok(String::new());
    }
    let parent = get_parent_directory(img, inode_p)?;
    let parent_inode = img.get_inode(parent)?;
    let name = get_name_by_inode(img, &parent_inode, inode_p)?;
    Ok(name_bytes_to_string(name))
}

/// Reconstructs the absolute path of `inode_p` by climbing `..` to the
/// root. Root is `/`. A segment whose name cannot be resolved is rendered
/// as `...` rather than aborting the whole reconstruction.
pub fn get_full_path(img: &mut Image, inode_p: u16) -> String {
    if inode_p == ROOT_INODE {
        return "/".to_owned();
    }
    // Climb to the root, collecting ancestors child-first; directory depth
    // is bounded by the inode count, so this terminates even on a
    // pathological (cyclic) image.
    let mut chain = vec![inode_p];
    let mut current = inode_p;
    for _ in 0..INODE_COUNT {
        let parent = match get_parent_directory(img, current) {
            Ok(p) => p,
            Err(_) => break,
        };
        if parent == ROOT_INODE {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    let mut path = String::new();
    for ip in chain {
        path.push('/');
        match get_directory_name(img, ip) {
            Ok(name) if !name.is_empty() => path.push_str(&name),
            _ => path.push_str("..."),
        }
    }
    path
}

/// Looks up `name` as a child of `dir`, and verifies that it is itself a
/// directory.
fn get_dir(img: &mut Image, dir: u16, name: &str) -> Result<u16> {
    let dir_inode = img.get_inode(dir)?;
    let child = get_inode_by_name(img, &dir_inode, name)?;
    let child_inode = img.get_inode(child)?;
    if !child_inode.is_directory() {
        return Err(Error::WrongType);
    }
    Ok(child)
}

/// Resolves `text` (a `/`-separated path, absolute if it starts with `/`,
/// otherwise relative to `start`) to an inode pointer.
///
/// On any failure, the caller's current inode is left unchanged — this
/// function never mutates anything, it only reads.
pub fn resolve_path(img: &mut Image, start: u16, text: &str) -> Result<u16> {
    let mut current = if text.starts_with('/') { ROOT_INODE } else { start };
    for segment in text.split('/').filter(|s| !s.is_empty()) {
        current = get_dir(img, current, segment)?;
    }
    Ok(current)
}

/// Convenience: reads `inode_p` and requires it to be a directory.
pub fn require_directory(img: &mut Image, inode_p: u16) -> Result<Inode> {
    let inode = img.get_inode(inode_p)?;
    if !inode.is_directory() {
        return Err(Error::WrongType);
    }
    Ok(inode)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::create_file_in_dir;
    use std::env::temp_dir;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn fresh_image() -> Image {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = temp_dir().join(format!("vfs-path-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    #[test]
    fn root_full_path_is_slash() {
        let mut img = fresh_image();
        assert_eq!(get_full_path(&mut img, ROOT_INODE), "/");
    }

    #[test]
    fn nested_directory_full_path() {
        let mut img = fresh_image();
        let foo = create_file_in_dir(&mut img, ROOT_INODE, crate::image::FileType::Directory, "foo").unwrap();
        let bar = create_file_in_dir(&mut img, foo, crate::image::FileType::Directory, "bar").unwrap();
        assert_eq!(get_full_path(&mut img, foo), "/foo");
        assert_eq!(get_full_path(&mut img, bar), "/foo/bar");
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let mut img = fresh_image();
        let foo = create_file_in_dir(&mut img, ROOT_INODE, crate::image::FileType::Directory, "foo").unwrap();
        assert_eq!(resolve_path(&mut img, ROOT_INODE, "foo").unwrap(), foo);
        assert_eq!(resolve_path(&mut img, foo, "/foo").unwrap(), foo);
        assert_eq!(resolve_path(&mut img, foo, "..").unwrap(), ROOT_INODE);
        assert_eq!(resolve_path(&mut img, foo, ".").unwrap(), foo);
    }

    #[test]
    fn resolve_missing_segment_fails() {
        let mut img = fresh_image();
        assert!(matches!(
            resolve_path(&mut img, ROOT_INODE, "nope"),
            Err(Error::NotFound)
        ));
    }
}

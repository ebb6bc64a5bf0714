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

//! The command surface: one function per shell command. Each validates
//! names and argument shapes, calls the composite operations, and renders
//! the outcome as the single human-readable line the shell and the server
//! both print back. None of these ever return an `Err` — a failure is just
//! text, per the contract the binaries rely on.

use crate::dir::{get_inode_by_name, is_valid_name, read_record, RECORDS_PER_BLOCK};
use crate::error::Error;
use crate::image::{FileType, Image, BLOCK_SIZE};
use crate::indirect::get_block_k;
use crate::ops::{
    create_file_in_dir, get_regular_file_size, get_size_on_disk, read_regular_file,
    remove_file_from_dir, write_regular_file,
};
use crate::path::{get_full_path, resolve_path};
use std::fs;
use std::path::Path;

/// `pwd`: the absolute path of the current directory.
pub fn cmd_pwd(img: &mut Image, cwd: u16) -> String {
    get_full_path(img, cwd)
}

fn ls_inner(img: &mut Image, cwd: u16) -> Result<Vec<String>, Error> {
    let dir_inode = img.get_inode(cwd)?;
    let mut lines = Vec::new();
    for k in 0..dir_inode.file_size as u64 {
        let block_num = get_block_k(img, &dir_inode, k)?;
        let block = img.get_block(block_num)?;
        let start = if k == 0 { 2 } else { 0 };
        for i in start..RECORDS_PER_BLOCK {
            let record = read_record(&block, i);
            if record.is_empty() {
                continue;
            }
            let entry = img.get_inode(record.inode_p)?;
            let (kind, size) = match entry.file_type {
                FileType::Regular => ('F', get_regular_file_size(img, &entry)?),
                _ => ('D', get_size_on_disk(&entry) * BLOCK_SIZE),
            };
            lines.push(format!("{kind} {size} {}", record.name_str()));
        }
    }
    Ok(lines)
}

/// `ls`: one `T SIZE NAME` line per entry of the current directory, empty
/// directories printing nothing.
pub fn cmd_ls(img: &mut Image, cwd: u16) -> String {
    match ls_inner(img, cwd) {
        Ok(lines) => lines.join("\n"),
        Err(e) => e.to_string(),
    }
}

/// `mkdir NAME`: create an empty subdirectory of the current directory.
pub fn cmd_mkdir(img: &mut Image, cwd: u16, name: &str) -> String {
    create_entry(img, cwd, FileType::Directory, name)
}

/// `touch NAME`: create an empty regular file in the current directory.
pub fn cmd_touch(img: &mut Image, cwd: u16, name: &str) -> String {
    create_entry(img, cwd, FileType::Regular, name)
}

fn create_entry(img: &mut Image, cwd: u16, file_type: FileType, name: &str) -> String {
    if !is_valid_name(name) {
        return format!("name \"{name}\" is invalid");
    }
    let dir_inode = match img.get_inode(cwd) {
        Ok(i) => i,
        Err(e) => return e.to_string(),
    };
    if get_inode_by_name(img, &dir_inode, name).is_ok() {
        return format!("name \"{name}\" is already taken");
    }
    match create_file_in_dir(img, cwd, file_type, name) {
        Ok(_) => String::new(),
        Err(e) => e.to_string(),
    }
}

/// `rmdir NAME`: recursively remove a subdirectory.
pub fn cmd_rmdir(img: &mut Image, cwd: u16, name: &str) -> String {
    remove_entry(img, cwd, name, FileType::Directory)
}

/// `rm NAME`: remove a regular file.
pub fn cmd_rm(img: &mut Image, cwd: u16, name: &str) -> String {
    remove_entry(img, cwd, name, FileType::Regular)
}

fn remove_entry(img: &mut Image, cwd: u16, name: &str, expected: FileType) -> String {
    if !is_valid_name(name) {
        return format!("name \"{name}\" is invalid");
    }
    let dir_inode = match img.get_inode(cwd) {
        Ok(i) => i,
        Err(e) => return e.to_string(),
    };
    let victim = match get_inode_by_name(img, &dir_inode, name) {
        Ok(v) => v,
        Err(e) => return format!("{name}: {e}"),
    };
    let victim_inode = match img.get_inode(victim) {
        Ok(i) => i,
        Err(e) => return format!("{name}: {e}"),
    };
    if victim_inode.file_type != expected {
        return format!("{name}: {}", Error::WrongType);
    }
    match remove_file_from_dir(img, cwd, victim) {
        Ok(()) => String::new(),
        Err(e) => format!("{name}: {e}"),
    }
}

/// `cd TARGET`: resolve `target` and move the cursor there. On failure
/// `cwd` is left exactly as it was.
pub fn cmd_cd(img: &mut Image, cwd: &mut u16, target: &str) -> String {
    match resolve_path(img, *cwd, target) {
        Ok(new_cwd) => {
            *cwd = new_cwd;
            String::new()
        }
        Err(e) => format!("{target}: {e}"),
    }
}

/// `cat NAME`: the regular file's content, verbatim.
///
/// Returns the exact bytes of [`read_regular_file`] on success, or an
/// error line on failure. Byte-exactness matters here: `vfsh` has no
/// transport constraint at all and writes these bytes straight to
/// stdout; only `vfsd`'s NUL-delimited reply buffer has to decide how to
/// pack them.
pub fn cmd_cat(img: &mut Image, cwd: u16, name: &str) -> Result<Vec<u8>, String> {
    let dir_inode = img.get_inode(cwd).map_err(|e| e.to_string())?;
    let inode_p =
        get_inode_by_name(img, &dir_inode, name).map_err(|e| format!("{name}: {e}"))?;
    let inode = img.get_inode(inode_p).map_err(|e| format!("{name}: {e}"))?;
    if !inode.is_regular() {
        return Err(format!("{name}: {}", Error::WrongType));
    }
    read_regular_file(img, inode_p).map_err(|e| format!("{name}: {e}"))
}

/// `upload LOCAL FS`: create regular file `fs_name` and copy `local`'s
/// bytes into it.
pub fn cmd_upload(img: &mut Image, cwd: u16, local: &Path, fs_name: &str) -> String {
    if !is_valid_name(fs_name) {
        return format!("name \"{fs_name}\" is invalid");
    }
    let dir_inode = match img.get_inode(cwd) {
        Ok(i) => i,
        Err(e) => return e.to_string(),
    };
    if get_inode_by_name(img, &dir_inode, fs_name).is_ok() {
        return format!("name \"{fs_name}\" is already taken");
    }
    let data = match fs::read(local) {
        Ok(d) => d,
        Err(e) => return format!("{}: {e}", local.display()),
    };
    let inode_p = match create_file_in_dir(img, cwd, FileType::Regular, fs_name) {
        Ok(p) => p,
        Err(e) => return e.to_string(),
    };
    match write_regular_file(img, inode_p, &data) {
        Ok(()) => String::new(),
        Err(e) => format!("{fs_name}: {e}"),
    }
}

/// `download FS LOCAL`: write regular file `fs_name`'s bytes to host path
/// `local`, byte-exact, sentinel excluded.
pub fn cmd_download(img: &mut Image, cwd: u16, fs_name: &str, local: &Path) -> String {
    let dir_inode = match img.get_inode(cwd) {
        Ok(i) => i,
        Err(e) => return e.to_string(),
    };
    let inode_p = match get_inode_by_name(img, &dir_inode, fs_name) {
        Ok(p) => p,
        Err(e) => return format!("{fs_name}: {e}"),
    };
    let inode = match img.get_inode(inode_p) {
        Ok(i) => i,
        Err(e) => return format!("{fs_name}: {e}"),
    };
    if !inode.is_regular() {
        return format!("{fs_name}: {}", Error::WrongType);
    }
    let data = match read_regular_file(img, inode_p) {
        Ok(d) => d,
        Err(e) => return format!("{fs_name}: {e}"),
    };
    match fs::write(local, &data) {
        Ok(()) => String::new(),
        Err(e) => format!("{}: {e}", local.display()),
    }
}

/// `help`: the static command list.
pub fn cmd_help() -> String {
    [
        "pwd",
        "ls",
        "mkdir NAME",
        "rmdir NAME",
        "cd TARGET",
        "touch NAME",
        "rm NAME",
        "cat NAME",
        "upload LOCAL FS",
        "download FS LOCAL",
        "unmount",
        "help",
    ]
    .join("\n")
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
        let path = temp_dir().join(format!("vfs-commands-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    fn scratch_path(tag: &str) -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        temp_dir().join(format!("vfs-commands-scratch-{tag}-{n}.bin"))
    }

    #[test]
    fn s1_basic_lifecycle() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        assert_eq!(cmd_mkdir(&mut img, cwd, "foo"), "");
        assert_eq!(cmd_cd(&mut img, &mut cwd, "foo"), "");
        assert_eq!(cmd_pwd(&mut img, cwd), "/foo");
        assert_eq!(cmd_cd(&mut img, &mut cwd, ".."), "");
        assert_eq!(cmd_pwd(&mut img, cwd), "/");
        assert_eq!(cmd_rmdir(&mut img, cwd, "foo"), "");
        assert_eq!(cmd_ls(&mut img, cwd), "");
    }

    #[test]
    fn s2_duplicate_names() {
        let mut img = fresh_image();
        let cwd = ROOT_INODE;
        assert_eq!(cmd_touch(&mut img, cwd, "a"), "");
        assert_eq!(cmd_mkdir(&mut img, cwd, "a"), "name \"a\" is already taken");
        assert_eq!(cmd_ls(&mut img, cwd), "F 0 a");
    }

    #[test]
    fn s3_invalid_names() {
        let mut img = fresh_image();
        let cwd = ROOT_INODE;
        assert_eq!(cmd_mkdir(&mut img, cwd, ".."), "name \"..\" is invalid");
        assert_eq!(cmd_mkdir(&mut img, cwd, "a/b"), "name \"a/b\" is invalid");
    }

    #[test]
    fn s4_upload_download_roundtrip() {
        let mut img = fresh_image();
        let cwd = ROOT_INODE;
        let local_in = scratch_path("in");
        let pattern: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
        fs::write(&local_in, &pattern).unwrap();

        assert_eq!(cmd_upload(&mut img, cwd, &local_in, "f"), "");
        let local_out = scratch_path("out");
        assert_eq!(cmd_download(&mut img, cwd, "f", &local_out), "");
        let roundtrip = fs::read(&local_out).unwrap();
        assert_eq!(roundtrip, pattern);

        let _ = fs::remove_file(&local_in);
        let _ = fs::remove_file(&local_out);
    }

    #[test]
    fn s5_indirect_addressing() {
        let mut img = fresh_image();
        let cwd = ROOT_INODE;
        let local_in = scratch_path("indirect");
        let pattern: Vec<u8> = (0..12_288u32).map(|i| (i % 256) as u8).collect();
        fs::write(&local_in, &pattern).unwrap();
        assert_eq!(cmd_upload(&mut img, cwd, &local_in, "f"), "");
        assert_eq!(cmd_cat(&mut img, cwd, "f"), Ok(pattern.clone()));

        let dir_inode = img.get_inode(cwd).unwrap();
        let f = get_inode_by_name(&mut img, &dir_inode, "f").unwrap();
        let f_inode = img.get_inode(f).unwrap();
        assert_eq!(get_size_on_disk(&f_inode), 13);

        let _ = fs::remove_file(&local_in);
    }

    #[test]
    fn s6_recursive_rmdir_restores_bitmaps() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        assert_eq!(cmd_mkdir(&mut img, cwd, "a"), "");
        assert_eq!(cmd_cd(&mut img, &mut cwd, "a"), "");
        assert_eq!(cmd_touch(&mut img, cwd, "x"), "");
        assert_eq!(cmd_mkdir(&mut img, cwd, "b"), "");
        assert_eq!(cmd_cd(&mut img, &mut cwd, "b"), "");
        assert_eq!(cmd_touch(&mut img, cwd, "y"), "");
        assert_eq!(cmd_cd(&mut img, &mut cwd, "/"), "");
        assert_eq!(cmd_rmdir(&mut img, cwd, "a"), "");
        assert_eq!(cmd_ls(&mut img, cwd), "");
    }

    #[test]
    fn cd_failure_leaves_cwd_unchanged() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        assert_eq!(cmd_cd(&mut img, &mut cwd, "nope"), "nope: no such file or directory");
        assert_eq!(cwd, ROOT_INODE);
    }

    #[test]
    fn rm_on_directory_fails_with_wrong_type() {
        let mut img = fresh_image();
        let cwd = ROOT_INODE;
        cmd_mkdir(&mut img, cwd, "d");
        assert_eq!(cmd_rm(&mut img, cwd, "d"), "d: wrong file type");
    }
}

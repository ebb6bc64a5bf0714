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

//! Tokenizes one command line and routes it to the [`crate::commands`]
//! surface. This is the "parser/dispatcher" external collaborator: it
//! never touches the image directly, only through `commands::cmd_*`, and
//! both `vfsh` and `vfsd` share it so the two deployment shapes behave
//! identically for the same input line.

use crate::commands;
use crate::image::Image;
use std::path::Path;

/// Result of dispatching one line.
pub struct Outcome {
    /// The reply text (may be empty on a silent success). Unused when
    /// `bytes` is `Some`.
    pub output: String,
    /// `cat`'s file content, verbatim, when the command is `cat` and it
    /// succeeded. Callers that care about byte-exactness (`vfsh`) should
    /// prefer this over `output` when it is `Some`.
    pub bytes: Option<Vec<u8>>,
    /// Whether the session should end after this command (`unmount`).
    pub terminate: bool,
}

impl Outcome {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            bytes: None,
            terminate: false,
        }
    }

    fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            output: String::new(),
            bytes: Some(bytes),
            terminate: false,
        }
    }
}

/// Dispatches one already-trimmed command line.
pub fn dispatch(img: &mut Image, cwd: &mut u16, line: &str) -> Outcome {
    let mut tokens = line.split_whitespace();
    let Some(cmd) = tokens.next() else {
        return Outcome::text("");
    };
    let args: Vec<&str> = tokens.collect();

    match (cmd, args.as_slice()) {
        ("pwd", []) => Outcome::text(commands::cmd_pwd(img, *cwd)),
        ("ls", []) => Outcome::text(commands::cmd_ls(img, *cwd)),
        ("mkdir", [name]) => Outcome::text(commands::cmd_mkdir(img, *cwd, name)),
        ("rmdir", [name]) => Outcome::text(commands::cmd_rmdir(img, *cwd, name)),
        ("cd", [target]) => Outcome::text(commands::cmd_cd(img, cwd, target)),
        ("touch", [name]) => Outcome::text(commands::cmd_touch(img, *cwd, name)),
        ("rm", [name]) => Outcome::text(commands::cmd_rm(img, *cwd, name)),
        ("cat", [name]) => match commands::cmd_cat(img, *cwd, name) {
            Ok(bytes) => Outcome::bytes(bytes),
            Err(msg) => Outcome::text(msg),
        },
        ("upload", [local, fs_name]) => {
            Outcome::text(commands::cmd_upload(img, *cwd, Path::new(local), fs_name))
        }
        ("download", [fs_name, local]) => {
            Outcome::text(commands::cmd_download(img, *cwd, fs_name, Path::new(local)))
        }
        ("unmount", []) => Outcome {
            output: String::new(),
            bytes: None,
            terminate: true,
        },
        ("help", []) => Outcome::text(commands::cmd_help()),
        (cmd, _) => Outcome::text(format!("{cmd}: wrong number of arguments")),
    }
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
        let path = temp_dir().join(format!("vfs-dispatch-test-{n}.img"));
        Image::create(&path).unwrap()
    }

    #[test]
    fn empty_line_is_a_no_op() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        let outcome = dispatch(&mut img, &mut cwd, "");
        assert_eq!(outcome.output, "");
        assert!(!outcome.terminate);
    }

    #[test]
    fn wrong_argument_count_is_reported() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        let outcome = dispatch(&mut img, &mut cwd, "mkdir");
        assert_eq!(outcome.output, "mkdir: wrong number of arguments");
    }

    #[test]
    fn unmount_terminates() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        let outcome = dispatch(&mut img, &mut cwd, "unmount");
        assert!(outcome.terminate);
    }

    #[test]
    fn mkdir_then_ls_round_trips_through_dispatch() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        assert_eq!(dispatch(&mut img, &mut cwd, "mkdir foo").output, "");
        assert_eq!(dispatch(&mut img, &mut cwd, "cd foo").output, "");
        assert_eq!(dispatch(&mut img, &mut cwd, "pwd").output, "/foo");
    }

    #[test]
    fn cat_carries_its_reply_as_bytes_not_text() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        assert_eq!(dispatch(&mut img, &mut cwd, "touch f").output, "");
        let outcome = dispatch(&mut img, &mut cwd, "cat f");
        assert_eq!(outcome.bytes, Some(Vec::new()));
        assert!(outcome.output.is_empty());
    }

    #[test]
    fn cat_on_a_missing_file_reports_text_not_bytes() {
        let mut img = fresh_image();
        let mut cwd = ROOT_INODE;
        let outcome = dispatch(&mut img, &mut cwd, "cat missing");
        assert!(outcome.bytes.is_none());
        assert!(!outcome.output.is_empty());
    }
}

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

//! Error kinds returned by the filesystem engine.

use std::fmt;
use std::io;

/// An error produced by a core operation.
///
/// Every fallible primitive and composite operation in this crate returns
/// `Result<T, Error>` rather than panicking; only the binaries decide whether
/// a given error is fatal.
#[derive(Debug)]
pub enum Error {
    /// The image's magic number or block size did not match on open.
    BadImage,
    /// A bitmap scan found no free block or inode.
    NoSpace,
    /// A logical block index is beyond what the inode can address, or beyond
    /// the inode's current `file_size`.
    OutOfRange,
    /// A name was not found in a directory, or an inode was not found in its
    /// parent's records.
    NotFound,
    /// A directory operation was attempted on a regular file, or vice versa.
    WrongType,
    /// A name is empty, too long, contains `/`, or is `.`/`..`.
    InvalidName,
    /// A sibling with the same name already exists.
    NameTaken,
    /// A regular file's last block has no end-of-file sentinel.
    CorruptFile,
    /// `create_file_in_dir` was asked for a type other than regular/directory.
    Unsupported,
    /// A host filesystem error, e.g. opening an `upload`/`download` target.
    HostIo(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadImage => write!(f, "not a valid image"),
            Self::NoSpace => write!(f, "no space left on image"),
            Self::OutOfRange => write!(f, "block index out of range"),
            Self::NotFound => write!(f, "no such file or directory"),
            Self::WrongType => write!(f, "wrong file type"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::NameTaken => write!(f, "name already taken"),
            Self::CorruptFile => write!(f, "corrupt file: missing end-of-file sentinel"),
            Self::Unsupported => write!(f, "unsupported file type"),
            Self::HostIo(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HostIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::HostIo(e)
    }
}

/// Shorthand for a `Result` using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

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

//! The local interactive shell: reads command lines from stdin, dispatches
//! them against one image, prints the reply, repeats until `unmount` or
//! end of input.

use std::env;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;
use vfscore::dispatch::dispatch;
use vfscore::image::{Image, ROOT_INODE};

fn fatal<M: fmt::Display>(msg: M) -> ! {
    eprintln!("vfsh: error: {msg}");
    exit(1);
}

fn print_usage() {
    eprintln!("Usage: vfsh IMAGE");
}

fn main() {
    let mut args = env::args_os().skip(1);
    let Some(image_arg) = args.next() else {
        print_usage();
        exit(1);
    };
    if args.next().is_some() {
        print_usage();
        exit(1);
    }
    let path = PathBuf::from(image_arg);

    let mut image = if path.exists() {
        Image::open(&path).unwrap_or_else(|e| fatal(format!("{}: {e}", path.display())))
    } else {
        Image::create(&path).unwrap_or_else(|e| fatal(format!("{}: {e}", path.display())))
    };
    let mut cwd = ROOT_INODE;

    let stdin = io::stdin();
    loop {
        print!("{}> ", vfscore::path::get_full_path(&mut image, cwd));
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => fatal(e),
        }
        let outcome = dispatch(&mut image, &mut cwd, line.trim());
        match &outcome.bytes {
            Some(bytes) => {
                io::stdout().write_all(bytes).unwrap_or_else(|e| fatal(e));
                io::stdout().flush().unwrap_or_else(|e| fatal(e));
            }
            None if !outcome.output.is_empty() => println!("{}", outcome.output),
            None => {}
        }
        if outcome.terminate {
            break;
        }
    }
}

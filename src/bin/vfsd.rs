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

//! The loopback-socket server. Accepts one connection at a time on a
//! single `TcpListener`, with no worker threads and no concurrent image
//! access, reads one fixed-size command buffer per connection, dispatches
//! it against the shared image, and replies with one fixed-size buffer.

use std::env;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::exit;
use vfscore::dispatch::dispatch;
use vfscore::image::{Image, ROOT_INODE};
use vfscore::path::get_full_path;

/// Size of the command buffer a client sends per connection.
const COMMAND_BUFFER_SIZE: usize = 1024;
/// Size of the reply buffer the server sends back.
const REPLY_BUFFER_SIZE: usize = 4096;
/// The port used when none is given on the command line.
const DEFAULT_PORT: u16 = 8080;

fn fatal<M: fmt::Display>(msg: M) -> ! {
    eprintln!("vfsd: error: {msg}");
    exit(1);
}

fn print_usage() {
    eprintln!("Usage: vfsd IMAGE [PORT]");
}

struct Args {
    image: PathBuf,
    port: u16,
}

fn parse_args() -> Args {
    let mut args = env::args().skip(1);
    let Some(image) = args.next() else {
        print_usage();
        exit(1);
    };
    let port = match args.next() {
        Some(p) => p.parse().unwrap_or_else(|_| {
            print_usage();
            exit(1);
        }),
        None => DEFAULT_PORT,
    };
    if args.next().is_some() {
        print_usage();
        exit(1);
    }
    Args {
        image: PathBuf::from(image),
        port,
    }
}

/// Reads exactly one command out of a fixed-size, NUL-padded buffer.
fn read_command(stream: &mut TcpStream) -> io::Result<String> {
    let mut buf = [0u8; COMMAND_BUFFER_SIZE];
    stream.read_exact(&mut buf)?;
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// Packs the reply buffer: output bytes, NUL, new cwd path, NUL-padded.
fn build_reply(output: &[u8], cwd_path: &str) -> [u8; REPLY_BUFFER_SIZE] {
    let mut buf = [0u8; REPLY_BUFFER_SIZE];
    let mut pos = 0;
    for part in [output, cwd_path.as_bytes()] {
        let take = part.len().min(buf.len() - pos - 1);
        buf[pos..pos + take].copy_from_slice(&part[..take]);
        pos += take;
        buf[pos] = 0;
        pos += 1;
    }
    buf
}

fn handle_connection(
    mut stream: TcpStream,
    image: &mut Image,
    cwd: &mut u16,
) -> io::Result<bool> {
    let line = read_command(&mut stream)?;
    let outcome = dispatch(image, cwd, line.trim());
    let cwd_path = get_full_path(image, *cwd);
    let output_bytes = outcome.bytes.unwrap_or_else(|| outcome.output.into_bytes());
    let reply = build_reply(&output_bytes, &cwd_path);
    stream.write_all(&reply)?;
    stream.flush()?;
    Ok(outcome.terminate)
}

fn main() {
    let args = parse_args();

    let mut image = if args.image.exists() {
        Image::open(&args.image).unwrap_or_else(|e| fatal(format!("{}: {e}", args.image.display())))
    } else {
        Image::create(&args.image)
            .unwrap_or_else(|e| fatal(format!("{}: {e}", args.image.display())))
    };
    let mut cwd = ROOT_INODE;

    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .unwrap_or_else(|e| fatal(format!("bind 127.0.0.1:{}: {e}", args.port)));

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("vfsd: {e}");
                continue;
            }
        };
        match handle_connection(stream, &mut image, &mut cwd) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("vfsd: {e}"),
        }
    }
}

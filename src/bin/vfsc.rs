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

//! The thin client: connects to `vfsd`, sends one command per invocation,
//! prints the reply and the new prompt. Interactive use re-prompts after
//! every reply, mirroring the one-command-per-connection transport.

use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::process::exit;

const COMMAND_BUFFER_SIZE: usize = 1024;
const REPLY_BUFFER_SIZE: usize = 4096;

fn fatal<M: fmt::Display>(msg: M) -> ! {
    eprintln!("vfsc: error: {msg}");
    exit(1);
}

fn print_usage() {
    eprintln!("Usage: vfsc HOST:PORT");
}

/// Packs `line` into a fixed-size, NUL-padded command buffer.
fn build_command(line: &str) -> [u8; COMMAND_BUFFER_SIZE] {
    let mut buf = [0u8; COMMAND_BUFFER_SIZE];
    let bytes = line.as_bytes();
    let take = bytes.len().min(buf.len() - 1);
    buf[..take].copy_from_slice(&bytes[..take]);
    buf
}

/// Splits a reply buffer into its `(output, cwd_path)` parts.
fn split_reply(buf: &[u8; REPLY_BUFFER_SIZE]) -> (String, String) {
    let first_nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let output = String::from_utf8_lossy(&buf[..first_nul]).into_owned();
    let rest = &buf[(first_nul + 1).min(buf.len())..];
    let second_nul = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    let cwd_path = String::from_utf8_lossy(&rest[..second_nul]).into_owned();
    (output, cwd_path)
}

fn send_command(addr: &str, line: &str) -> io::Result<(String, String)> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(&build_command(line))?;
    let mut reply = [0u8; REPLY_BUFFER_SIZE];
    stream.read_exact(&mut reply)?;
    Ok(split_reply(&reply))
}

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(addr) = args.next() else {
        print_usage();
        exit(1);
    };
    if args.next().is_some() {
        print_usage();
        exit(1);
    }

    let stdin = io::stdin();
    let mut prompt = "/".to_owned();
    loop {
        print!("{prompt}> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => fatal(e),
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match send_command(&addr, line) {
            Ok((output, cwd_path)) => {
                if !output.is_empty() {
                    println!("{output}");
                }
                prompt = cwd_path;
                if line == "unmount" {
                    break;
                }
            }
            Err(e) => fatal(format!("{addr}: {e}")),
        }
    }
}

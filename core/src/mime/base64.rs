/*
 * base64.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Streaming Base64 for Content-Transfer-Encoding (RFC 2045 section 6.8).

use std::io::{self, Read, Write};

use tracing::warn;

use crate::mime::error::{DecodeError, MimeError};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const PAD: i8 = -2;
const SKIP: i8 = -1;

const DECODE: [i8; 256] = {
    let mut t = [SKIP; 256];
    let mut i = 0;
    while i < 64 {
        t[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    t[b'=' as usize] = PAD;
    t
};

/// Default output line length (RFC 2045).
pub const LINE_LENGTH: usize = 76;

const INPUT_CHUNK: usize = 4096;

/// Pull decoder over an encoded source.
///
/// Bytes outside the alphabet (line breaks, whitespace, junk) are skipped. The first
/// `=` ends the data. A group cut short by end of input, or padded after fewer than two
/// sextets, is an error when strict and is dropped otherwise.
pub struct Base64Decoder<R> {
    inner: R,
    strict: bool,
    input: Box<[u8; INPUT_CHUNK]>,
    in_pos: usize,
    in_len: usize,
    quantum: u32,
    sextets: u8,
    /// Decoded bytes that did not fit in the caller's buffer (at most 2).
    pending: [u8; 3],
    pending_pos: usize,
    pending_len: usize,
    eof: bool,
}

impl<R: Read> Base64Decoder<R> {
    pub fn new(inner: R, strict: bool) -> Self {
        Self {
            inner,
            strict,
            input: Box::new([0u8; INPUT_CHUNK]),
            in_pos: 0,
            in_len: 0,
            quantum: 0,
            sextets: 0,
            pending: [0; 3],
            pending_pos: 0,
            pending_len: 0,
            eof: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Bits left over in a short group: 2 sextets hold 1 byte, 3 hold 2.
    fn partial_group(&self) -> ([u8; 3], usize) {
        match self.sextets {
            2 => ([(self.quantum >> 4) as u8, 0, 0], 1),
            3 => ([(self.quantum >> 10) as u8, (self.quantum >> 2) as u8, 0], 2),
            _ => ([0; 3], 0),
        }
    }

    fn end_of_data(&mut self, padded: bool) -> io::Result<([u8; 3], usize)> {
        self.eof = true;
        let sextets = self.sextets;
        let well_formed = if padded {
            sextets == 2 || sextets == 3
        } else {
            sextets == 0
        };
        if !well_formed {
            let err = if padded {
                DecodeError::Base64Padding(sextets)
            } else {
                DecodeError::Base64Truncated(sextets)
            };
            if self.strict {
                return Err(err.into());
            }
            warn!("{err}, dropping partial group");
        }
        let out = if well_formed { self.partial_group() } else { ([0; 3], 0) };
        self.quantum = 0;
        self.sextets = 0;
        Ok(out)
    }
}

impl<R: Read> Read for Base64Decoder<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < out.len() && self.pending_pos < self.pending_len {
            out[n] = self.pending[self.pending_pos];
            self.pending_pos += 1;
            n += 1;
        }
        while n < out.len() && !self.eof {
            if self.in_pos == self.in_len {
                self.in_len = self.inner.read(&mut self.input[..])?;
                self.in_pos = 0;
                if self.in_len == 0 {
                    let (bytes, len) = self.end_of_data(false)?;
                    n += self.emit(&bytes[..len], &mut out[n..]);
                    break;
                }
            }
            let b = self.input[self.in_pos];
            self.in_pos += 1;
            match DECODE[b as usize] {
                SKIP => {}
                PAD => {
                    let (bytes, len) = self.end_of_data(true)?;
                    n += self.emit(&bytes[..len], &mut out[n..]);
                }
                v => {
                    self.quantum = (self.quantum << 6) | v as u32;
                    self.sextets += 1;
                    if self.sextets == 4 {
                        let q = self.quantum;
                        self.quantum = 0;
                        self.sextets = 0;
                        n += self.emit(&[(q >> 16) as u8, (q >> 8) as u8, q as u8], &mut out[n..]);
                    }
                }
            }
        }
        Ok(n)
    }
}

impl<R> Base64Decoder<R> {
    /// Copy `bytes` into `out`, queueing what does not fit. Returns bytes written.
    fn emit(&mut self, bytes: &[u8], out: &mut [u8]) -> usize {
        let direct = bytes.len().min(out.len());
        out[..direct].copy_from_slice(&bytes[..direct]);
        let rest = &bytes[direct..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_pos = 0;
        self.pending_len = rest.len();
        direct
    }
}

/// Push encoder. Call [`finish`](Self::finish) to write the final (padded) group.
pub struct Base64Encoder<W: Write> {
    inner: W,
    line_length: usize,
    column: usize,
    group: [u8; 3],
    group_len: usize,
    out: Vec<u8>,
}

impl<W: Write> Base64Encoder<W> {
    /// Wraps at [`LINE_LENGTH`] columns.
    pub fn new(inner: W) -> Self {
        Self::with_line_length(inner, LINE_LENGTH)
    }

    /// `line_length` 0 disables wrapping.
    pub fn with_line_length(inner: W, line_length: usize) -> Self {
        Self {
            inner,
            line_length,
            column: 0,
            group: [0; 3],
            group_len: 0,
            out: Vec::new(),
        }
    }

    /// A CRLF goes out just before the next character once the column reached the
    /// line length, so the output never ends with a line break.
    fn put(&mut self, c: u8) {
        if self.line_length > 0 && self.column >= self.line_length {
            self.out.extend_from_slice(b"\r\n");
            self.column = 0;
        }
        self.out.push(c);
        self.column += 1;
    }

    fn encode_group(&mut self) {
        let g = self.group;
        let n = (g[0] as u32) << 16 | (g[1] as u32) << 8 | g[2] as u32;
        self.put(ALPHABET[(n >> 18) as usize & 63]);
        self.put(ALPHABET[(n >> 12) as usize & 63]);
        if self.group_len > 1 {
            self.put(ALPHABET[(n >> 6) as usize & 63]);
        } else {
            self.put(b'=');
        }
        if self.group_len > 2 {
            self.put(ALPHABET[n as usize & 63]);
        } else {
            self.put(b'=');
        }
        self.group = [0; 3];
        self.group_len = 0;
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.out.is_empty() {
            self.inner.write_all(&self.out)?;
            self.out.clear();
        }
        Ok(())
    }

    /// Encode the leftover bytes with padding, flush, and return the writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.group_len > 0 {
            self.encode_group();
        }
        self.drain()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for Base64Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            self.group[self.group_len] = b;
            self.group_len += 1;
            if self.group_len == 3 {
                self.encode_group();
            }
        }
        self.drain()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.inner.flush()
    }
}

/// Encode a whole buffer with the default line length.
pub fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = Base64Encoder::new(Vec::with_capacity(data.len() * 4 / 3 + 4));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decode a whole buffer.
pub fn decode(data: &[u8], strict: bool) -> Result<Vec<u8>, MimeError> {
    let mut out = Vec::with_capacity(data.len() * 3 / 4);
    Base64Decoder::new(data, strict).read_to_end(&mut out)?;
    Ok(out)
}

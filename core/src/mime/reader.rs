/*
 * reader.rs
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

//! Byte sources for the entity parser: a position/line tracking reader with line
//! push-back and truncation, and a length-capped view.
//!
//! I/O errors from the wrapped source are passed through unchanged.

use std::io::{self, BufRead, Read, Seek, SeekFrom};

use bytes::{Buf, BytesMut};

use crate::mime::error::MimeLocator;

/// Reader that counts bytes and lines as they are consumed.
///
/// Lines handed back with [`unread`](Self::unread) are served again before the
/// underlying source, with the counters rewound accordingly. After
/// [`truncate`](Self::truncate) every read reports end of stream.
pub struct PositionReader<R> {
    inner: R,
    pushback: BytesMut,
    position: u64,
    line: u64,
    truncated: bool,
    mark: Option<Mark>,
}

struct Mark {
    position: u64,
    line: u64,
    inner_position: u64,
    pushback: BytesMut,
}

impl<R: BufRead> PositionReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushback: BytesMut::new(),
            position: 0,
            line: 1,
            truncated: false,
            mark: None,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 1-based number of the line the next byte belongs to.
    pub fn line_number(&self) -> u64 {
        self.line
    }

    pub fn locator(&self) -> MimeLocator {
        MimeLocator {
            offset: self.position,
            line: self.line,
        }
    }

    /// Make all further reads return end of stream. Idempotent.
    pub fn truncate(&mut self) {
        self.truncated = true;
        self.pushback.clear();
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Push bytes back so that they are read again next.
    pub fn unread(&mut self, bytes: &[u8]) {
        if self.truncated || bytes.is_empty() {
            return;
        }
        let mut merged = BytesMut::with_capacity(bytes.len() + self.pushback.len());
        merged.extend_from_slice(bytes);
        merged.extend_from_slice(&self.pushback);
        self.pushback = merged;
        self.position -= bytes.len() as u64;
        self.line -= count_newlines(bytes);
    }

    fn available(&mut self) -> io::Result<&[u8]> {
        if self.truncated {
            return Ok(&[]);
        }
        if !self.pushback.is_empty() {
            return Ok(&self.pushback[..]);
        }
        self.inner.fill_buf()
    }

    fn consume_counted(&mut self, amt: usize, newlines: u64) {
        if !self.pushback.is_empty() {
            self.pushback.advance(amt);
        } else {
            self.inner.consume(amt);
        }
        self.position += amt as u64;
        self.line += newlines;
    }

    /// Append one line (up to and including LF) to `dst`, reading at most `max` bytes.
    /// Returns the number of bytes read; 0 means end of stream.
    pub fn read_line(&mut self, dst: &mut BytesMut, max: usize) -> io::Result<usize> {
        let mut total = 0;
        while total < max {
            let room = max - total;
            let (amt, complete) = {
                let buf = self.available()?;
                if buf.is_empty() {
                    break;
                }
                let window = &buf[..buf.len().min(room)];
                match window.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        dst.extend_from_slice(&window[..=i]);
                        (i + 1, true)
                    }
                    None => {
                        dst.extend_from_slice(window);
                        (window.len(), false)
                    }
                }
            };
            self.consume_counted(amt, complete as u64);
            total += amt;
            if complete {
                break;
            }
        }
        Ok(total)
    }

    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let b = match self.available()?.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.consume_counted(1, (b == b'\n') as u64);
        Ok(Some(b))
    }

    /// Skip up to `n` bytes. Returns the number actually skipped.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut skipped = 0u64;
        while skipped < n {
            let (amt, newlines) = {
                let buf = self.available()?;
                if buf.is_empty() {
                    break;
                }
                let amt = buf.len().min((n - skipped).min(usize::MAX as u64) as usize);
                (amt, count_newlines(&buf[..amt]))
            };
            self.consume_counted(amt, newlines);
            skipped += amt as u64;
        }
        Ok(skipped)
    }
}

impl<R: BufRead + Seek> PositionReader<R> {
    /// Remember the current position so that [`reset`](Self::reset) can return to it.
    pub fn mark(&mut self) -> io::Result<()> {
        let inner_position = self.inner.stream_position()?;
        self.mark = Some(Mark {
            position: self.position,
            line: self.line,
            inner_position,
            pushback: self.pushback.clone(),
        });
        Ok(())
    }

    pub fn reset(&mut self) -> io::Result<()> {
        let mark = self
            .mark
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "reset without mark"))?;
        self.inner.seek(SeekFrom::Start(mark.inner_position))?;
        self.position = mark.position;
        self.line = mark.line;
        self.pushback = mark.pushback.clone();
        self.truncated = false;
        Ok(())
    }
}

impl<R: BufRead> Read for PositionReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let (n, newlines) = {
            let buf = self.available()?;
            let n = buf.len().min(out.len());
            out[..n].copy_from_slice(&buf[..n]);
            (n, count_newlines(&buf[..n]))
        };
        self.consume_counted(n, newlines);
        Ok(n)
    }
}

fn count_newlines(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|&&b| b == b'\n').count() as u64
}

/// View over a source that returns at most `limit` bytes in total.
pub struct BoundedReader<R> {
    inner: R,
    remaining: Option<u64>,
    overflowed: bool,
}

impl<R: Read> BoundedReader<R> {
    /// `None` means no cap.
    pub fn new(inner: R, limit: Option<u64>) -> Self {
        Self {
            inner,
            remaining: limit,
            overflowed: false,
        }
    }

    /// True once the cap was reached while the source still had data.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let Some(remaining) = self.remaining else {
            return self.inner.read(out);
        };
        if remaining == 0 {
            if !self.overflowed && !out.is_empty() {
                let mut extra = [0u8; 1];
                self.overflowed = self.inner.read(&mut extra)? > 0;
            }
            return Ok(0);
        }
        let max = out.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut out[..max])?;
        self.remaining = Some(remaining - n as u64);
        Ok(n)
    }
}

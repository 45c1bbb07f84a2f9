/*
 * quoted_printable.rs
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

//! Quoted-Printable for Content-Transfer-Encoding (RFC 2045 section 6.7).

use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::warn;

use crate::mime::error::{DecodeError, MimeError};
use crate::mime::utils::is_wsp;

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i = i.wrapping_add(1);
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i = i.wrapping_add(1);
    }
    t
};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Default maximum encoded line length, soft break included.
pub const LINE_LENGTH: usize = 76;

/// Bytes read from the input before an unterminated line is decoded in part.
const SEGMENT_LEN: usize = 4096;

/// Pull decoder. Works one input line at a time so that trailing whitespace and soft
/// line breaks can be recognised before any of the line is returned. Longer lines are
/// decoded in segments of `SEGMENT_LEN` bytes.
pub struct QuotedPrintableDecoder<R> {
    inner: BufReader<R>,
    strict: bool,
    line: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> QuotedPrintableDecoder<R> {
    pub fn new(inner: R, strict: bool) -> Self {
        Self {
            inner: BufReader::new(inner),
            strict,
            line: Vec::new(),
            out: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn invalid_escape(&self, seq: &[u8]) -> io::Result<()> {
        let err = DecodeError::QuotedPrintableEscape(seq.to_vec());
        if self.strict {
            return Err(err.into());
        }
        warn!("{err}, keeping it literally");
        Ok(())
    }

    /// Append input up to the next LF, or until `SEGMENT_LEN` more bytes were read.
    /// Returns true when the segment stopped short of a line end.
    fn fill_segment(&mut self) -> io::Result<bool> {
        let limit = self.line.len() + SEGMENT_LEN;
        while self.line.len() < limit {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                return Ok(false);
            }
            let window = &available[..available.len().min(limit - self.line.len())];
            if let Some(lf) = window.iter().position(|&b| b == b'\n') {
                self.line.extend_from_slice(&window[..=lf]);
                self.inner.consume(lf + 1);
                return Ok(false);
            }
            let n = window.len();
            self.line.extend_from_slice(window);
            self.inner.consume(n);
        }
        Ok(true)
    }

    /// Decode the buffered segment into `self.out`. An unterminated segment keeps back
    /// the tail that more input could still turn into a soft break, trailing
    /// whitespace or an escape.
    fn decode_segment(&mut self, unterminated: bool) -> io::Result<()> {
        self.out.clear();
        self.out_pos = 0;
        let mut line = std::mem::take(&mut self.line);
        let result = if unterminated {
            let keep = split_point(&line);
            let result = self.decode_escapes(&line[..keep]);
            line.drain(..keep);
            result
        } else {
            let result = self.decode_line(&line);
            line.clear();
            result
        };
        self.line = line;
        result
    }

    fn decode_line(&mut self, line: &[u8]) -> io::Result<()> {
        let eol_len = if line.ends_with(b"\r\n") {
            2
        } else if line.ends_with(b"\n") {
            1
        } else {
            0
        };
        let (content, eol) = line.split_at(line.len() - eol_len);

        let mut end = content.len();
        while end > 0 && is_wsp(content[end - 1]) {
            end -= 1;
        }
        let mut soft_break = false;
        if end > 0 && content[end - 1] == b'=' {
            if eol_len == 0 && end == content.len() {
                // "=" as the very last input byte
                if self.strict {
                    return Err(DecodeError::QuotedPrintableEscape(b"=".to_vec()).into());
                }
                warn!("quoted-printable: dangling '=' at end of data, dropping it");
            }
            soft_break = true;
            end -= 1;
        }

        self.decode_escapes(&content[..end])?;
        if !soft_break {
            self.out.extend_from_slice(eol);
        }
        Ok(())
    }

    fn decode_escapes(&mut self, body: &[u8]) -> io::Result<()> {
        let mut i = 0;
        while i < body.len() {
            let b = body[i];
            if b != b'=' {
                self.out.push(b);
                i += 1;
                continue;
            }
            let hi = body.get(i + 1).map(|&h| HEX_DECODE[h as usize]);
            let lo = body.get(i + 2).map(|&l| HEX_DECODE[l as usize]);
            match (hi, lo) {
                (Some(h), Some(l)) if h >= 0 && l >= 0 => {
                    self.out.push(((h as u8) << 4) | l as u8);
                    i += 3;
                }
                _ => {
                    let seq_end = (i + 3).min(body.len());
                    self.invalid_escape(&body[i..seq_end])?;
                    self.out.push(b'=');
                    i += 1;
                }
            }
        }
        Ok(())
    }
}

/// Start of the undecidable tail of an unterminated segment: a CR that may begin a
/// CRLF, trailing whitespace, and a trailing `=` or `=X`.
fn split_point(segment: &[u8]) -> usize {
    let mut end = segment.len();
    if end > 0 && segment[end - 1] == b'\r' {
        end -= 1;
    }
    while end > 0 && is_wsp(segment[end - 1]) {
        end -= 1;
    }
    if end > 0 && segment[end - 1] == b'=' {
        end -= 1;
    } else if end == segment.len() && end > 1 && segment[end - 2] == b'=' {
        end -= 2;
    }
    end
}

impl<R: Read> Read for QuotedPrintableDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_pos < self.out.len() {
                let n = (self.out.len() - self.out_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.eof {
                return Ok(0);
            }
            let unterminated = self.fill_segment()?;
            if !unterminated && self.line.is_empty() {
                self.eof = true;
                continue;
            }
            if let Err(e) = self.decode_segment(unterminated) {
                self.eof = true;
                return Err(e);
            }
        }
    }
}

/// Push encoder. In text mode a CRLF pair in the input is a hard line break and a lone
/// CR or LF is escaped; binary mode escapes every CR and LF. Call
/// [`finish`](Self::finish) to flush the held-back bytes.
pub struct QuotedPrintableEncoder<W: Write> {
    inner: W,
    binary: bool,
    line_length: usize,
    column: usize,
    /// Whitespace is literal unless it turns out to end a line.
    pending_wsp: Option<u8>,
    pending_cr: bool,
    out: Vec<u8>,
}

impl<W: Write> QuotedPrintableEncoder<W> {
    pub fn new(inner: W, binary: bool) -> Self {
        Self::with_line_length(inner, binary, LINE_LENGTH)
    }

    /// `line_length` 0 disables soft line breaks.
    pub fn with_line_length(inner: W, binary: bool, line_length: usize) -> Self {
        Self {
            inner,
            binary,
            line_length,
            column: 0,
            pending_wsp: None,
            pending_cr: false,
            out: Vec::new(),
        }
    }

    fn put(&mut self, token: &[u8]) {
        if self.line_length > 0 && self.column > 0 && self.column + token.len() > self.line_length - 1 {
            self.out.extend_from_slice(b"=\r\n");
            self.column = 0;
        }
        self.out.extend_from_slice(token);
        self.column += token.len();
    }

    fn put_escaped(&mut self, b: u8) {
        self.put(&[b'=', HEX_UPPER[(b >> 4) as usize], HEX_UPPER[(b & 0x0f) as usize]]);
    }

    fn release_wsp(&mut self, trailing: bool) {
        if let Some(w) = self.pending_wsp.take() {
            if trailing {
                self.put_escaped(w);
            } else {
                self.put(&[w]);
            }
        }
    }

    fn hard_break(&mut self) {
        self.release_wsp(true);
        self.out.extend_from_slice(b"\r\n");
        self.column = 0;
    }

    fn encode_byte(&mut self, b: u8) {
        if self.pending_cr {
            self.pending_cr = false;
            if b == b'\n' {
                self.hard_break();
                return;
            }
            self.release_wsp(false);
            self.put_escaped(b'\r');
        }
        match b {
            b'\r' if !self.binary => self.pending_cr = true,
            b' ' | b'\t' => {
                self.release_wsp(false);
                self.pending_wsp = Some(b);
            }
            b'=' | 0..=32 | 127..=255 => {
                self.release_wsp(false);
                self.put_escaped(b);
            }
            _ => {
                self.release_wsp(false);
                self.put(&[b]);
            }
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.out.is_empty() {
            self.inner.write_all(&self.out)?;
            self.out.clear();
        }
        Ok(())
    }

    /// Write held-back whitespace (encoded, since it ends the data) and a held-back CR.
    pub fn finish(mut self) -> io::Result<W> {
        if self.pending_cr {
            self.pending_cr = false;
            self.release_wsp(false);
            self.put_escaped(b'\r');
        }
        self.release_wsp(true);
        self.drain()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for QuotedPrintableEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            self.encode_byte(b);
        }
        self.drain()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.inner.flush()
    }
}

pub fn encode(data: &[u8], binary: bool) -> io::Result<Vec<u8>> {
    let mut encoder = QuotedPrintableEncoder::new(Vec::with_capacity(data.len() + data.len() / 2), binary);
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decode(data: &[u8], strict: bool) -> Result<Vec<u8>, MimeError> {
    let mut out = Vec::with_capacity(data.len());
    QuotedPrintableDecoder::new(data, strict).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore, SeedableRng};

    #[test]
    fn escapes_and_soft_breaks() {
        assert_eq!(decode(b"caf=C3=A9", true).unwrap(), "caf\u{e9}".as_bytes());
        assert_eq!(decode(b"caf=c3=a9", true).unwrap(), "caf\u{e9}".as_bytes());
        assert_eq!(decode(b"soft=\r\nbreak", true).unwrap(), b"softbreak");
        assert_eq!(decode(b"soft=\nbreak", true).unwrap(), b"softbreak");
        assert_eq!(decode(b"soft= \t\r\nbreak", true).unwrap(), b"softbreak");
        assert_eq!(decode(b"hard\r\nbreak\n", true).unwrap(), b"hard\r\nbreak\n");
    }

    #[test]
    fn trailing_whitespace_is_transport_padding() {
        assert_eq!(decode(b"abc  \r\ndef\t", true).unwrap(), b"abc\r\ndef");
        assert_eq!(decode(b"a =20\r\n", true).unwrap(), b"a  \r\n");
    }

    #[test]
    fn invalid_escape() {
        match decode(b"50=%", true) {
            Err(MimeError::Decoding(DecodeError::QuotedPrintableEscape(seq))) => assert_eq!(seq, b"=%"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(decode(b"50=% off=ZZ", false).unwrap(), b"50=% off=ZZ");
        assert!(decode(b"end=", true).is_err());
        assert_eq!(decode(b"end=", false).unwrap(), b"end");
        assert_eq!(decode(b"x=4", false).unwrap(), b"x=4");
    }

    #[test]
    fn encodes_text() {
        assert_eq!(encode(b"a=b\r\nline two ", false).unwrap(), b"a=3Db\r\nline two=20");
        assert_eq!(encode("caf\u{e9}\ttab\t\r\n".as_bytes(), false).unwrap(), b"caf=C3=A9\ttab=09\r\n");
        assert_eq!(encode(b"lone\nlf and cr\r", false).unwrap(), b"lone=0Alf and cr=0D");
        assert_eq!(encode(b"a \r\r\n", false).unwrap(), b"a =0D\r\n");
    }

    #[test]
    fn encodes_binary() {
        assert_eq!(encode(b"a\r\nb", true).unwrap(), b"a=0D=0Ab");
    }

    #[test]
    fn soft_breaks_keep_lines_short() {
        let data = vec![b'x'; 200];
        let encoded = encode(&data, false).unwrap();
        for line in encoded.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            assert!(line.len() <= LINE_LENGTH);
        }
        assert_eq!(decode(&encoded, true).unwrap(), data);

        // an escape is never split across a soft break
        let data = vec![0xffu8; 50];
        let encoded = encode(&data, true).unwrap();
        let first = encoded.split(|&b| b == b'\r').next().unwrap();
        assert_eq!(first.len(), 76);
        assert!(first.ends_with(b"FF="));
    }

    #[test]
    fn small_reads() {
        let mut decoder = QuotedPrintableDecoder::new(&b"ab=3Dcd=\r\nef"[..], true);
        let mut out = Vec::new();
        let mut buf = [0u8; 1];
        loop {
            match decoder.read(&mut buf).unwrap() {
                0 => break,
                n => out.extend_from_slice(&buf[..n]),
            }
        }
        assert_eq!(out, b"ab=cdef");
    }

    #[test]
    fn round_trip_random() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1066);
        for i in 0..200 {
            let len = rng.gen_range(0..=10_000);
            let mut data = vec![0u8; len];
            if i % 2 == 0 {
                rng.fill_bytes(&mut data);
            } else {
                // mostly text, with whitespace and line breaks
                const ALPHABET: &[u8] = b"abc xyz\t=\r\n.\r\n  \xe9";
                for b in data.iter_mut() {
                    *b = ALPHABET[rng.gen_range(0..ALPHABET.len())];
                }
            }
            let binary = rng.gen_bool(0.5);
            let line_length = [0, 4, 10, 76, 200][rng.gen_range(0..5)];

            let mut encoder = QuotedPrintableEncoder::with_line_length(Vec::new(), binary, line_length);
            for chunk in data.chunks(rng.gen_range(1..=700)) {
                encoder.write_all(chunk).unwrap();
            }
            let encoded = encoder.finish().unwrap();
            assert!(encoded.iter().all(|&b| b == b'\r' || b == b'\n' || b == b'\t' || (32..127).contains(&b)));

            let decoded = decode(&encoded, true).unwrap();
            assert_eq!(decoded, data, "binary={binary} line_length={line_length}");
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("connection reset"))
        }
    }

    #[test]
    fn unterminated_line_is_decoded_before_the_end() {
        let line = "a=3Db".repeat(40_000);
        let mut decoder = QuotedPrintableDecoder::new(line.as_bytes().chain(Broken), true);
        let mut buf = [0u8; 64];
        let n = decoder.read(&mut buf).unwrap();
        assert!(n > 0);
        assert_eq!(&buf[..n], &"a=b".repeat(30).as_bytes()[..n]);
    }

    #[test]
    fn long_lines_split_anywhere() {
        for offset in SEGMENT_LEN - 8..SEGMENT_LEN + 2 {
            let pad = "x".repeat(offset);
            let input = format!("{pad}=3D  =\r\n{pad}end \t\r\n{pad}\r\r\nz");
            let expected = format!("{pad}=  {pad}end\r\n{pad}\r\r\nz");
            assert_eq!(decode(input.as_bytes(), true).unwrap(), expected.as_bytes(), "offset {offset}");
        }
        let dangling = format!("{}=", "y".repeat(SEGMENT_LEN - 1));
        assert!(decode(dangling.as_bytes(), true).is_err());
        assert_eq!(decode(dangling.as_bytes(), false).unwrap(), "y".repeat(SEGMENT_LEN - 1).as_bytes());
    }
}

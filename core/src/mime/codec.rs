/*
 * codec.rs
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

use std::io::{self, Read};

use crate::mime::base64::Base64Decoder;
use crate::mime::descriptor::TransferEncoding;
use crate::mime::quoted_printable::QuotedPrintableDecoder;

/// Content reader that undoes the entity's Content-Transfer-Encoding.
/// Unrecognised encodings pass the bytes through.
pub enum DecodingReader<R> {
    Identity(R),
    Base64(Base64Decoder<R>),
    QuotedPrintable(QuotedPrintableDecoder<R>),
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &TransferEncoding, strict: bool) -> Self {
        match encoding {
            TransferEncoding::Base64 => DecodingReader::Base64(Base64Decoder::new(inner, strict)),
            TransferEncoding::QuotedPrintable => {
                DecodingReader::QuotedPrintable(QuotedPrintableDecoder::new(inner, strict))
            }
            _ => DecodingReader::Identity(inner),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, DecodingReader::Identity(_))
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecodingReader::Identity(r) => r.read(buf),
            DecodingReader::Base64(r) => r.read(buf),
            DecodingReader::QuotedPrintable(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(encoding: &str, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        DecodingReader::new(data, &TransferEncoding::from_label(encoding), true)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn selects_by_encoding() {
        assert_eq!(read_all("BASE64", b"SGVsbG8="), b"Hello");
        assert_eq!(read_all("quoted-printable", b"H=C3=A9"), "H\u{e9}".as_bytes());
        assert_eq!(read_all("8bit", b"SGVsbG8="), b"SGVsbG8=");
        assert_eq!(read_all("x-uuencode", b"begin"), b"begin");
        assert!(DecodingReader::new(&b""[..], &TransferEncoding::Binary, false).is_identity());
    }
}

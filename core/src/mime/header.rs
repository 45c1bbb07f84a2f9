/*
 * header.rs
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

//! Header block tokenizer: splits lines into raw (name, body) fields, folding
//! continuation lines and applying the malformed-header policy.

use std::fmt;
use std::io;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::mime::boundary::{is_blank_line, trim_line_end};
use crate::mime::config::MimeConfig;
use crate::mime::error::{MimeError, MimeLocator, Violation};
use crate::mime::utils::{header_bytes_to_string, is_field_name_char, is_wsp};

/// One header field exactly as read. Continuation line breaks are kept in the raw
/// bytes; name and body are decoded on first access.
#[derive(Clone)]
pub struct RawField {
    raw: Bytes,
    colon: usize,
    name: OnceLock<String>,
    body: OnceLock<String>,
}

impl RawField {
    /// Split `raw` (without its final line break) at the first colon.
    /// None when there is no colon or the name is not a valid field name.
    pub fn parse(raw: Bytes) -> Option<RawField> {
        let colon = raw.iter().position(|&b| b == b':')?;
        if !is_valid_name(&raw[..colon]) {
            return None;
        }
        Some(RawField {
            raw,
            colon,
            name: OnceLock::new(),
            body: OnceLock::new(),
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Offset of the colon in [`raw`](Self::raw).
    pub fn delimiter_idx(&self) -> usize {
        self.colon
    }

    /// Field name bytes, trailing whitespace removed.
    pub fn name_bytes(&self) -> &[u8] {
        let name = &self.raw[..self.colon];
        let end = name.iter().rposition(|&b| !is_wsp(b)).map_or(0, |i| i + 1);
        &name[..end]
    }

    /// Field body bytes after the colon, leading whitespace removed, still folded.
    pub fn body_bytes(&self) -> &[u8] {
        let body = &self.raw[self.colon + 1..];
        let start = body
            .iter()
            .position(|&b| !is_wsp(b) && b != b'\r' && b != b'\n')
            .unwrap_or(body.len());
        &body[start..]
    }

    pub fn name(&self) -> &str {
        self.name
            .get_or_init(|| header_bytes_to_string(self.name_bytes()))
    }

    /// Unfolded body: line breaks removed, the whitespace that followed them kept.
    pub fn body(&self) -> &str {
        self.body.get_or_init(|| {
            let unfolded: Vec<u8> = self
                .body_bytes()
                .iter()
                .copied()
                .filter(|&b| b != b'\r' && b != b'\n')
                .collect();
            header_bytes_to_string(&unfolded)
        })
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name_bytes().eq_ignore_ascii_case(name.as_bytes())
    }
}

impl fmt::Debug for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawField")
            .field("name", &self.name())
            .field("body", &self.body())
            .finish()
    }
}

impl PartialEq for RawField {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for RawField {}

fn is_valid_name(name: &[u8]) -> bool {
    let end = name.iter().rposition(|&b| !is_wsp(b)).map_or(0, |i| i + 1);
    end > 0 && name[..end].iter().copied().all(is_field_name_char)
}

/// Lines fed to the tokenizer. Implemented by the entity parser over its shared cursor.
pub trait LineSource {
    /// Append the next line (including its line break) to `dst`, at most `max` bytes.
    fn read_line(&mut self, dst: &mut BytesMut, max: usize) -> io::Result<usize>;
    /// Push a line back; it is the next thing read.
    fn unread(&mut self, line: &[u8]);
    /// True when the line is a delimiter of an open multipart.
    fn is_boundary(&self, line: &[u8]) -> bool;
    /// True once cancellation was requested.
    fn is_stopped(&self) -> bool;
    fn locator(&self) -> MimeLocator;
}

/// Outcome of one tokenizer step.
#[derive(Debug)]
pub enum HeaderStep {
    Field(RawField),
    End,
}

/// Largest single read when no line limit is configured.
const UNLIMITED_CHUNK: usize = 64 * 1024;

/// Tokenizer state for one header block.
pub struct HeaderTokenizer {
    max_line_len: Option<usize>,
    max_header_len: Option<usize>,
    max_header_count: Option<usize>,
    strict: bool,
    malformed_starts_body: bool,
    field_count: usize,
    done: bool,
    line: BytesMut,
}

impl HeaderTokenizer {
    pub fn new(config: &MimeConfig) -> Self {
        Self {
            max_line_len: config.max_line_len,
            max_header_len: config.max_header_len,
            max_header_count: config.max_header_count,
            strict: config.strict_parsing,
            malformed_starts_body: config.malformed_header_starts_body,
            field_count: 0,
            done: false,
            line: BytesMut::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the next field, or End when the header block is over.
    pub fn next_field<S: LineSource>(&mut self, src: &mut S) -> Result<HeaderStep, MimeError> {
        loop {
            if self.done {
                return Ok(HeaderStep::End);
            }
            if src.is_stopped() {
                self.done = true;
                return Ok(HeaderStep::End);
            }

            let locator = src.locator();
            self.line.clear();
            let first = match self.read_physical_line(src)? {
                PhysicalLine::Eof => {
                    self.done = true;
                    self.violation(Violation::HeadersPrematureEnd, locator)?;
                    return Ok(HeaderStep::End);
                }
                PhysicalLine::TooLong => {
                    self.violation(Violation::LineTooLong, locator)?;
                    self.discard_rest_of_line(src)?;
                    self.skip_continuations(src)?;
                    continue;
                }
                PhysicalLine::Line => self.line.split().freeze(),
            };

            if src.is_boundary(&first) {
                src.unread(&first);
                self.done = true;
                self.violation(Violation::HeadersPrematureEnd, locator)?;
                return Ok(HeaderStep::End);
            }
            if is_blank_line(&first) {
                self.done = true;
                return Ok(HeaderStep::End);
            }

            let has_name = first.first().is_some_and(|&b| !is_wsp(b))
                && first
                    .iter()
                    .position(|&b| b == b':')
                    .is_some_and(|colon| is_valid_name(&first[..colon]));
            if !has_name {
                if self.strict {
                    return Err(MimeError::protocol(Violation::InvalidHeader, locator));
                }
                if self.malformed_starts_body {
                    warn!(line = locator.line, "malformed header line, treating it as the start of the body");
                    src.unread(&first);
                    self.done = true;
                    return Ok(HeaderStep::End);
                }
                warn!(line = locator.line, "dropping malformed header line");
                continue;
            }

            let mut field = BytesMut::from(&first[..]);
            let mut too_long = self.exceeds_header_len(field.len());
            loop {
                self.line.clear();
                match self.read_physical_line(src)? {
                    PhysicalLine::Eof => break,
                    PhysicalLine::TooLong => {
                        let at = src.locator();
                        self.violation(Violation::LineTooLong, at)?;
                        self.discard_rest_of_line(src)?;
                        too_long = true;
                        continue;
                    }
                    PhysicalLine::Line => {}
                }
                let next = self.line.split();
                if !next.first().is_some_and(|&b| is_wsp(b)) || src.is_boundary(&next) {
                    src.unread(&next);
                    break;
                }
                if !too_long {
                    field.extend_from_slice(&next);
                    too_long = self.exceeds_header_len(field.len());
                }
            }

            if too_long {
                self.violation(Violation::HeaderTooLong, locator)?;
                continue;
            }
            if self.max_header_count.is_some_and(|max| self.field_count >= max) {
                self.violation(Violation::TooManyHeaders, locator)?;
                continue;
            }

            let len = trim_line_end(&field).len();
            field.truncate(len);
            if let Some(raw) = RawField::parse(field.freeze()) {
                self.field_count += 1;
                return Ok(HeaderStep::Field(raw));
            }
        }
    }

    fn read_physical_line<S: LineSource>(&mut self, src: &mut S) -> Result<PhysicalLine, MimeError> {
        let cap = match self.max_line_len {
            // Room for the line break.
            Some(max) => max + 2,
            None => UNLIMITED_CHUNK,
        };
        loop {
            let n = src.read_line(&mut self.line, cap)?;
            if n == 0 && self.line.is_empty() {
                return Ok(PhysicalLine::Eof);
            }
            if self.line.ends_with(b"\n") || n == 0 {
                break;
            }
            match self.max_line_len {
                Some(_) => break,
                None if n < cap => break,
                None => {}
            }
        }
        if let Some(max) = self.max_line_len {
            if trim_line_end(&self.line).len() > max {
                return Ok(PhysicalLine::TooLong);
            }
        }
        Ok(PhysicalLine::Line)
    }

    fn discard_rest_of_line<S: LineSource>(&mut self, src: &mut S) -> Result<(), MimeError> {
        while !self.line.ends_with(b"\n") {
            self.line.clear();
            if src.read_line(&mut self.line, UNLIMITED_CHUNK)? == 0 {
                break;
            }
        }
        self.line.clear();
        Ok(())
    }

    fn skip_continuations<S: LineSource>(&mut self, src: &mut S) -> Result<(), MimeError> {
        loop {
            self.line.clear();
            if src.read_line(&mut self.line, UNLIMITED_CHUNK)? == 0 {
                return Ok(());
            }
            if !self.line.first().is_some_and(|&b| is_wsp(b)) || src.is_boundary(&self.line) {
                let line = self.line.split();
                src.unread(&line);
                return Ok(());
            }
            self.discard_rest_of_line(src)?;
        }
    }

    fn exceeds_header_len(&self, len: usize) -> bool {
        self.max_header_len.is_some_and(|max| len > max)
    }

    fn violation(&self, violation: Violation, locator: MimeLocator) -> Result<(), MimeError> {
        if self.strict {
            return Err(MimeError::protocol(violation, locator));
        }
        warn!(line = locator.line, offset = locator.offset, "{violation}, recovering");
        Ok(())
    }
}

enum PhysicalLine {
    Line,
    TooLong,
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::boundary::match_boundary;
    use crate::mime::reader::PositionReader;
    use std::io::Cursor;

    struct TestSource {
        reader: PositionReader<Cursor<Vec<u8>>>,
        boundary: Option<&'static [u8]>,
    }

    impl TestSource {
        fn new(data: &[u8]) -> Self {
            Self {
                reader: PositionReader::new(Cursor::new(data.to_vec())),
                boundary: None,
            }
        }

        fn rest(&mut self) -> Vec<u8> {
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut self.reader, &mut out).unwrap();
            out
        }
    }

    impl LineSource for TestSource {
        fn read_line(&mut self, dst: &mut BytesMut, max: usize) -> io::Result<usize> {
            self.reader.read_line(dst, max)
        }
        fn unread(&mut self, line: &[u8]) {
            self.reader.unread(line)
        }
        fn is_boundary(&self, line: &[u8]) -> bool {
            self.boundary
                .is_some_and(|b| match_boundary(line, b).is_some())
        }
        fn is_stopped(&self) -> bool {
            false
        }
        fn locator(&self) -> MimeLocator {
            self.reader.locator()
        }
    }

    fn fields(config: &MimeConfig, src: &mut TestSource) -> Result<Vec<(String, String)>, MimeError> {
        let mut tokenizer = HeaderTokenizer::new(config);
        let mut out = Vec::new();
        while let HeaderStep::Field(f) = tokenizer.next_field(src)? {
            out.push((f.name().to_string(), f.body().to_string()));
        }
        Ok(out)
    }

    #[test]
    fn raw_field_accessors() {
        let f = RawField::parse(Bytes::from_static(b"Subject :  hello\r\n\tworld")).unwrap();
        assert_eq!(f.name(), "Subject");
        assert_eq!(f.body_bytes(), b"hello\r\n\tworld");
        assert_eq!(f.body(), "hello\tworld");
        assert_eq!(f.delimiter_idx(), 8);
        assert!(f.is_named("SUBJECT"));
        assert!(RawField::parse(Bytes::from_static(b"no colon here")).is_none());
        assert!(RawField::parse(Bytes::from_static(b"bad name: x")).is_none());
        assert!(RawField::parse(Bytes::from_static(b": x")).is_none());
    }

    #[test]
    fn folds_continuations_and_stops_at_blank_line() {
        let mut src = TestSource::new(b"Subject: a\r\n  b\r\nTo: x@y\r\n\r\nbody");
        let got = fields(&MimeConfig::default(), &mut src).unwrap();
        assert_eq!(
            got,
            vec![
                ("Subject".into(), "a  b".into()),
                ("To".into(), "x@y".into())
            ]
        );
        assert_eq!(src.rest(), b"body");
    }

    #[test]
    fn duplicates_are_preserved() {
        let mut src = TestSource::new(b"Received: a\nReceived: b\n\n");
        let got = fields(&MimeConfig::default(), &mut src).unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn malformed_line_dropped_when_lenient() {
        let mut src = TestSource::new(b"Subject: a\r\nthis is junk\r\nTo: b\r\n\r\n");
        let got = fields(&MimeConfig::default(), &mut src).unwrap();
        assert_eq!(got.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(), ["Subject", "To"]);
    }

    #[test]
    fn malformed_line_is_error_when_strict() {
        let mut src = TestSource::new(b"Subject: a\r\nthis is junk\r\n\r\n");
        let err = fields(&MimeConfig::strict(), &mut src).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::InvalidHeader));
    }

    #[test]
    fn malformed_line_starts_body() {
        let config = MimeConfig {
            malformed_header_starts_body: true,
            ..MimeConfig::default()
        };
        let mut src = TestSource::new(b"Subject: a\r\nHello there\r\nmore\r\n");
        let got = fields(&config, &mut src).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(src.rest(), b"Hello there\r\nmore\r\n");
    }

    #[test]
    fn long_line_skips_field_when_lenient() {
        let config = MimeConfig {
            max_line_len: Some(20),
            ..MimeConfig::default()
        };
        let mut data = b"X-Long: ".to_vec();
        data.extend(std::iter::repeat(b'a').take(100));
        data.extend_from_slice(b"\r\n  continued\r\nSubject: ok\r\n\r\n");
        let mut src = TestSource::new(&data);
        let got = fields(&config, &mut src).unwrap();
        assert_eq!(got, vec![("Subject".into(), "ok".into())]);

        let strict = MimeConfig {
            max_line_len: Some(20),
            strict_parsing: true,
            ..MimeConfig::default()
        };
        let mut src = TestSource::new(&data);
        let err = fields(&strict, &mut src).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::LineTooLong));
    }

    #[test]
    fn long_field_skipped_when_lenient() {
        let config = MimeConfig {
            max_header_len: Some(15),
            ..MimeConfig::default()
        };
        let mut src = TestSource::new(b"A: 1\r\nB: 1234\r\n 5678\r\n 9\r\nC: 3\r\n\r\n");
        let got = fields(&config, &mut src).unwrap();
        assert_eq!(got.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(), ["A", "C"]);
    }

    #[test]
    fn header_count_limit() {
        let config = MimeConfig {
            max_header_count: Some(2),
            ..MimeConfig::default()
        };
        let mut src = TestSource::new(b"A: 1\nB: 2\nC: 3\n\n");
        assert_eq!(fields(&config, &mut src).unwrap().len(), 2);
    }

    #[test]
    fn eof_in_header() {
        let mut src = TestSource::new(b"Subject: x");
        let got = fields(&MimeConfig::default(), &mut src).unwrap();
        assert_eq!(got, vec![("Subject".into(), "x".into())]);

        let mut src = TestSource::new(b"Subject: x");
        let err = fields(&MimeConfig::strict(), &mut src).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::HeadersPrematureEnd));
    }

    #[test]
    fn boundary_ends_header() {
        let mut src = TestSource::new(b"Content-Type: text/plain\r\n--AA\r\nrest");
        src.boundary = Some(b"AA");
        let got = fields(&MimeConfig::default(), &mut src).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(src.rest(), b"--AA\r\nrest");
    }
}

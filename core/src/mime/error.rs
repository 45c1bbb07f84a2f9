/*
 * error.rs
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

//! Errors raised while tokenizing MIME structure or decoding entity content.

use std::fmt;
use std::io;

use thiserror::Error;

/// Position within the input for error reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MimeLocator {
    /// Absolute byte offset from the start of the input.
    pub offset: u64,
    /// 1-based line number.
    pub line: u64,
}

impl fmt::Display for MimeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, offset {}", self.line, self.offset)
    }
}

/// Structural violations. Fatal in strict mode, recovered from (and logged) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Header line without a colon or with an invalid field name.
    InvalidHeader,
    /// Header line longer than `max_line_len`.
    LineTooLong,
    /// Folded header field longer than `max_header_len`.
    HeaderTooLong,
    /// More than `max_header_count` fields in one header.
    TooManyHeaders,
    /// Header ended by end of input or by a boundary instead of a blank line.
    HeadersPrematureEnd,
    /// Multipart ended without its close boundary.
    BodyPrematureEnd,
    /// Part or preamble terminated by an enclosing multipart's boundary.
    UnexpectedBoundary,
    /// Input longer than `max_content_len`.
    ContentLimitExceeded,
}

impl Violation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Violation::InvalidHeader => "invalid header",
            Violation::LineTooLong => "maximum line length exceeded",
            Violation::HeaderTooLong => "maximum header length exceeded",
            Violation::TooManyHeaders => "maximum header count exceeded",
            Violation::HeadersPrematureEnd => "unexpected end of headers",
            Violation::BodyPrematureEnd => "unexpected end of multipart body",
            Violation::UnexpectedBoundary => "boundary of an enclosing multipart inside a part",
            Violation::ContentLimitExceeded => "maximum content length exceeded",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed Base64 or Quoted-Printable data seen by a strict codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("base64: unexpected end of data with {0} sextet(s) pending")]
    Base64Truncated(u8),
    #[error("base64: padding after {0} sextet(s)")]
    Base64Padding(u8),
    #[error("quoted-printable: invalid escape sequence {0:?}")]
    QuotedPrintableEscape(Vec<u8>),
}

impl From<DecodeError> for io::Error {
    fn from(err: DecodeError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// All errors produced by the MIME tokenizer, parser and codecs.
#[derive(Debug, Error)]
pub enum MimeError {
    #[error("MIME protocol error at {locator}: {violation}")]
    Protocol {
        violation: Violation,
        locator: MimeLocator,
    },

    #[error(transparent)]
    Io(io::Error),

    #[error(transparent)]
    Decoding(DecodeError),

    /// Raised by a [`MimeHandler`](crate::mime::MimeHandler) to abort parsing.
    #[error("{0}")]
    Handler(String),
}

impl MimeError {
    pub fn protocol(violation: Violation, locator: MimeLocator) -> Self {
        MimeError::Protocol { violation, locator }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        MimeError::Handler(message.into())
    }

    /// The structural violation, if this is a protocol error.
    pub fn violation(&self) -> Option<Violation> {
        match self {
            MimeError::Protocol { violation, .. } => Some(*violation),
            _ => None,
        }
    }
}

/// Codec streams report through `io::Error`; unwrap their payload so callers can match on it.
impl From<io::Error> for MimeError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<DecodeError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(decode) = inner.downcast::<DecodeError>() {
                    return MimeError::Decoding(*decode);
                }
            }
            return MimeError::Io(io::Error::new(io::ErrorKind::InvalidData, "decoding error"));
        }
        MimeError::Io(err)
    }
}

impl From<DecodeError> for MimeError {
    fn from(err: DecodeError) -> Self {
        MimeError::Decoding(err)
    }
}

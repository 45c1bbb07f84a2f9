/*
 * config.rs
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

//! Parser configuration. Read-only for the lifetime of one parse.
//! Limits use `None` for "unlimited". Serializable so the UI can keep it alongside
//! its other settings; missing keys take the defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimeConfig {
    /// Maximum length of one header line, excluding the line break.
    pub max_line_len: Option<usize>,
    /// Maximum length of one (folded) header field.
    pub max_header_len: Option<usize>,
    /// Maximum number of fields in one header.
    pub max_header_count: Option<usize>,
    /// Maximum number of bytes read from the input.
    pub max_content_len: Option<u64>,
    /// Raise structural violations instead of recovering from them.
    pub strict_parsing: bool,
    /// Strict flag handed to the Base64 / Quoted-Printable decoders.
    pub strict_decoding: bool,
    /// Parse every descriptor field eagerly (Content-Disposition, Content-ID, ...).
    pub maximal_body_descriptor: bool,
    /// When set, the input has no header: the top-level entity uses this content type.
    pub headless_content_type: Option<String>,
    /// In lenient mode, a header line without a colon ends the header and starts the body.
    pub malformed_header_starts_body: bool,
}

impl Default for MimeConfig {
    fn default() -> Self {
        Self {
            max_line_len: Some(1000),
            max_header_len: Some(10000),
            max_header_count: Some(1000),
            max_content_len: None,
            strict_parsing: false,
            strict_decoding: false,
            maximal_body_descriptor: false,
            headless_content_type: None,
            malformed_header_starts_body: false,
        }
    }
}

impl MimeConfig {
    /// Default limits with strict structural parsing and strict decoding.
    pub fn strict() -> Self {
        Self {
            strict_parsing: true,
            strict_decoding: true,
            ..Self::default()
        }
    }

    /// No limits at all; lenient.
    pub fn unlimited() -> Self {
        Self {
            max_line_len: None,
            max_header_len: None,
            max_header_count: None,
            max_content_len: None,
            ..Self::default()
        }
    }

    pub fn headless(content_type: impl Into<String>) -> Self {
        Self {
            headless_content_type: Some(content_type.into()),
            ..Self::default()
        }
    }
}

/*
 * content_disposition.rs
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

//! Content-Disposition header (RFC 2183).

use std::collections::HashMap;

use super::parameter::{parameter_map, parse_parameter_list, Parameter};
use super::utils::is_token;

#[derive(Debug, Clone, Default)]
pub struct ContentDisposition {
    disposition_type: String,
    parameters: Vec<Parameter>,
    parameter_map: HashMap<String, String>,
}

impl ContentDisposition {
    pub fn disposition_type(&self) -> &str {
        &self.disposition_type
    }

    pub fn is_disposition_type(&self, t: &str) -> bool {
        self.disposition_type.eq_ignore_ascii_case(t)
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameter_map
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter_map(&self) -> &HashMap<String, String> {
        &self.parameter_map
    }

    pub fn filename(&self) -> Option<&str> {
        self.get_parameter("filename")
    }

    pub fn size(&self) -> Option<u64> {
        self.get_parameter("size")?.trim().parse().ok()
    }
}

/// Parse a Content-Disposition field body. The disposition type is lower-cased.
pub fn parse_content_disposition(value: &str) -> Option<ContentDisposition> {
    let value = value.trim();
    let (disp_part, params_part) = match value.find(';') {
        Some(i) => (value[..i].trim(), &value[i + 1..]),
        None => (value, ""),
    };
    if !is_token(disp_part) {
        return None;
    }
    let parameters = parse_parameter_list(params_part);
    Some(ContentDisposition {
        disposition_type: disp_part.to_ascii_lowercase(),
        parameter_map: parameter_map(&parameters),
        parameters,
    })
}

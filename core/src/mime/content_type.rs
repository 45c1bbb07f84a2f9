/*
 * content_type.rs
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

//! Content-Type header (RFC 2045).

use std::collections::HashMap;

use super::parameter::{parameter_map, parse_parameter_list, Parameter};
use super::utils::is_token;

#[derive(Debug, Clone)]
pub struct ContentType {
    media_type: String,
    sub_type: String,
    parameters: Vec<Parameter>,
    parameter_map: HashMap<String, String>,
}

impl ContentType {
    /// Type and subtype are lower-cased.
    pub fn new(media_type: &str, sub_type: &str, parameters: Vec<Parameter>) -> Self {
        let parameter_map = parameter_map(&parameters);
        Self {
            media_type: media_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters,
            parameter_map,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype`, lower case.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.sub_type)
    }

    pub fn is_mime_type(&self, media_type: &str, sub_type: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
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

    pub(crate) fn into_parts(self) -> (String, String, Vec<Parameter>, HashMap<String, String>) {
        (self.media_type, self.sub_type, self.parameters, self.parameter_map)
    }
}

/// Parse a Content-Type field body. None when there is no valid `type/subtype`.
pub fn parse_content_type(value: &str) -> Option<ContentType> {
    let value = value.trim();
    let (type_part, params_part) = match value.find(';') {
        Some(i) => (value[..i].trim(), &value[i + 1..]),
        None => (value, ""),
    };
    let slash = type_part.find('/')?;
    let media_type = type_part[..slash].trim();
    let sub_type = type_part[slash + 1..].trim();
    if !is_token(media_type) || !is_token(sub_type) {
        return None;
    }
    Some(ContentType::new(media_type, sub_type, parse_parameter_list(params_part)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_cases_type_and_keeps_params() {
        let ct = parse_content_type("Multipart/Mixed; Boundary=\"=_abc\"").unwrap();
        assert_eq!(ct.mime_type(), "multipart/mixed");
        assert_eq!(ct.get_parameter("boundary"), Some("=_abc"));
        assert_eq!(ct.parameters()[0].get_name(), "Boundary");
        assert!(ct.is_mime_type("MULTIPART", "mixed"));
    }

    #[test]
    fn rejects_missing_subtype() {
        assert!(parse_content_type("text").is_none());
        assert!(parse_content_type("text/").is_none());
        assert!(parse_content_type("").is_none());
        assert!(parse_content_type("te xt/plain").is_none());
    }
}

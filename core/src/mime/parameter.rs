/*
 * parameter.rs
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

//! Header parameters (RFC 2045 `; name=value`) and RFC 2231 extended parameters
//! (`name*0`, `name*1*`, `name*=charset'lang'value`).

use std::collections::{BTreeMap, HashMap};

use encoding_rs::Encoding;
use percent_encoding::percent_decode;

/// One `name=value` pair exactly as declared (name not lower-cased, RFC 2231 not applied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

/// Parse a semicolon-separated parameter list (the part after the first `;`).
///
/// Quoted strings: `\"` yields `"`, `\\` yields `\`, any other escape is kept verbatim.
/// Parameters without `=` are ignored.
pub fn parse_parameter_list(params: &str) -> Vec<Parameter> {
    let bytes = params.as_bytes();
    let len = bytes.len();
    let mut parameters = Vec::new();
    let mut pos = 0;

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let name_start = pos;
        while pos < len && bytes[pos] != b'=' && bytes[pos] != b';' {
            pos += 1;
        }
        let name = params[name_start..pos].trim();
        if pos >= len || bytes[pos] == b';' {
            continue;
        }
        if name.is_empty() {
            while pos < len && bytes[pos] != b';' {
                pos += 1;
            }
            continue;
        }
        pos += 1;
        while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v: Vec<u8> = Vec::new();
            let mut escaped = false;
            while pos < len {
                let c = bytes[pos];
                pos += 1;
                match c {
                    b'"' if !escaped => break,
                    b'\\' if !escaped => escaped = true,
                    b'"' | b'\\' => {
                        v.push(c);
                        escaped = false;
                    }
                    _ => {
                        if escaped {
                            v.push(b'\\');
                            escaped = false;
                        }
                        v.push(c);
                    }
                }
            }
            // Skip anything between the closing quote and the next separator.
            while pos < len && bytes[pos] != b';' {
                pos += 1;
            }
            String::from_utf8_lossy(&v).into_owned()
        } else {
            let start = pos;
            while pos < len && bytes[pos] != b';' {
                pos += 1;
            }
            params[start..pos].trim().to_string()
        };
        parameters.push(Parameter::new(name, value));
    }
    parameters
}

/// Segment of an RFC 2231 parameter.
struct Segment {
    extended: bool,
    value: String,
}

/// Build the effective parameter map: keys lower-cased, first plain occurrence wins,
/// RFC 2231 continuations concatenated in index order and decoded. An extended value
/// replaces a plain parameter of the same name.
pub fn parameter_map(parameters: &[Parameter]) -> HashMap<String, String> {
    let mut plain: HashMap<String, String> = HashMap::new();
    let mut extended: HashMap<String, BTreeMap<u32, Segment>> = HashMap::new();

    for param in parameters {
        let name = param.get_name().to_ascii_lowercase();
        match split_extended_name(&name) {
            Some((base, index, is_encoded)) => {
                extended
                    .entry(base.to_string())
                    .or_default()
                    .entry(index)
                    .or_insert(Segment {
                        extended: is_encoded,
                        value: param.get_value().to_string(),
                    });
            }
            None => {
                plain
                    .entry(name)
                    .or_insert_with(|| param.get_value().to_string());
            }
        }
    }

    for (name, segments) in extended {
        plain.insert(name, join_segments(&segments));
    }
    plain
}

/// `name*` → (name, 0, true); `name*3` → (name, 3, false); `name*3*` → (name, 3, true).
fn split_extended_name(name: &str) -> Option<(&str, u32, bool)> {
    let star = name.find('*')?;
    let base = &name[..star];
    if base.is_empty() {
        return None;
    }
    let rest = &name[star + 1..];
    if rest.is_empty() {
        return Some((base, 0, true));
    }
    let (digits, encoded) = match rest.strip_suffix('*') {
        Some(d) => (d, true),
        None => (rest, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, digits.parse().ok()?, encoded))
}

fn join_segments(segments: &BTreeMap<u32, Segment>) -> String {
    let mut charset: Option<&'static Encoding> = None;
    let mut bytes: Vec<u8> = Vec::new();
    for (i, segment) in segments.values().enumerate() {
        if !segment.extended {
            bytes.extend_from_slice(segment.value.as_bytes());
            continue;
        }
        let mut value = segment.value.as_str();
        if i == 0 {
            // charset'language'value
            let mut parts = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (parts.next(), parts.next(), parts.next()) {
                charset = Encoding::for_label(cs.trim().as_bytes());
                value = rest;
            }
        }
        bytes.extend(percent_decode(value.as_bytes()));
    }
    match charset {
        Some(encoding) => encoding.decode_without_bom_handling(&bytes).0.into_owned(),
        None => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_and_quoted_values() {
        let params = parse_parameter_list(" charset=utf-8; name=\"a b;c\" ;format=flowed");
        assert_eq!(
            params,
            vec![
                Parameter::new("charset", "utf-8"),
                Parameter::new("name", "a b;c"),
                Parameter::new("format", "flowed"),
            ]
        );
    }

    #[test]
    fn quoted_escapes() {
        let params = parse_parameter_list(r#"a="x\"y"; b="c:\dir"; c="back\\slash""#);
        assert_eq!(params[0].get_value(), "x\"y");
        assert_eq!(params[1].get_value(), "c:\\dir");
        assert_eq!(params[2].get_value(), "back\\slash");
    }

    #[test]
    fn valueless_parameters_are_skipped() {
        let params = parse_parameter_list("flag; boundary=AA");
        assert_eq!(params, vec![Parameter::new("boundary", "AA")]);
        let params = parse_parameter_list("=orphan; a=b");
        assert_eq!(params, vec![Parameter::new("a", "b")]);
    }

    #[test]
    fn map_is_case_insensitive_and_first_wins() {
        let map = parameter_map(&parse_parameter_list("Charset=UTF-8; charset=latin1"));
        assert_eq!(map.get("charset").map(String::as_str), Some("UTF-8"));
    }

    #[test]
    fn rfc2231_continuations_in_index_order() {
        let map = parameter_map(&parse_parameter_list(
            "filename*1=\"-two\"; filename*0=\"one\"; filename*2=-three",
        ));
        assert_eq!(map["filename"], "one-two-three");
    }

    #[test]
    fn rfc2231_charset_and_percent_decoding() {
        let map = parameter_map(&parse_parameter_list(
            "title*=iso-8859-1'en'%A3%20rates; name*0*=utf-8''caf%C3%A9; name*1=.txt",
        ));
        assert_eq!(map["title"], "\u{a3} rates");
        assert_eq!(map["name"], "caf\u{e9}.txt");
    }

    #[test]
    fn extended_value_replaces_plain() {
        let map = parameter_map(&parse_parameter_list("name=plain.txt; name*=utf-8''fancy%20name"));
        assert_eq!(map["name"], "fancy name");
    }
}

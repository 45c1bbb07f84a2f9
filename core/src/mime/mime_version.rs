/*
 * mime_version.rs
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

//! MIME-Version header (RFC 2045 section 4). Comments are allowed anywhere.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeVersion {
    pub major: u32,
    pub minor: u32,
}

impl MimeVersion {
    pub const V1_0: MimeVersion = MimeVersion { major: 1, minor: 0 };

    pub fn parse(s: &str) -> Option<Self> {
        let cleaned = strip_comments(s);
        let (major, minor) = cleaned.split_once('.')?;
        Some(MimeVersion {
            major: major.trim().parse().ok()?,
            minor: minor.trim().parse().ok()?,
        })
    }
}

fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0u32;
    let mut escaped = false;
    for c in s.chars() {
        if depth > 0 {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        } else if c == '(' {
            depth = 1;
        } else if !c.is_whitespace() {
            out.push(c);
        }
    }
    out
}

impl std::fmt::Display for MimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_comments() {
        assert_eq!(MimeVersion::parse("1.0"), Some(MimeVersion::V1_0));
        assert_eq!(MimeVersion::parse(" 1.(produced by \\) x)0 "), Some(MimeVersion::V1_0));
        assert_eq!(MimeVersion::parse("2.1 (future)").unwrap().to_string(), "2.1");
        assert_eq!(MimeVersion::parse("one"), None);
    }
}

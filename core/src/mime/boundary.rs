/*
 * boundary.rs
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

//! Multipart delimiter lines (RFC 2046 section 5.1.1).

/// Kind of delimiter a line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// `--boundary`: a part follows.
    Open,
    /// `--boundary--`: the multipart ends.
    Close,
}

/// Match a line against `boundary`. Trailing CR/LF and transport padding (SP/HT) are ignored.
pub fn match_boundary(line: &[u8], boundary: &[u8]) -> Option<BoundaryKind> {
    let line = trim_padding(trim_line_end(line));
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary)?;
    match rest {
        b"" => Some(BoundaryKind::Open),
        b"--" => Some(BoundaryKind::Close),
        _ => None,
    }
}

/// Strip one trailing CRLF, LF or CR.
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .or_else(|| line.strip_suffix(b"\r"))
        .unwrap_or(line)
}

/// The line break at the end of `line`: CRLF, LF or nothing (a lone CR is content).
pub fn line_end(line: &[u8]) -> &[u8] {
    let n = if line.ends_with(b"\r\n") {
        2
    } else if line.ends_with(b"\n") {
        1
    } else {
        0
    };
    &line[line.len() - n..]
}

fn trim_padding(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// True for a line with nothing but a line break.
pub fn is_blank_line(line: &[u8]) -> bool {
    trim_line_end(line).is_empty() && !line.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_delimiters() {
        assert_eq!(match_boundary(b"--X", b"X"), Some(BoundaryKind::Open));
        assert_eq!(match_boundary(b"--X\r\n", b"X"), Some(BoundaryKind::Open));
        assert_eq!(match_boundary(b"--X--\r\n", b"X"), Some(BoundaryKind::Close));
        assert_eq!(match_boundary(b"--X--", b"X"), Some(BoundaryKind::Close));
    }

    #[test]
    fn near_misses_do_not_match() {
        assert_eq!(match_boundary(b"---Xabc", b"X"), None);
        assert_eq!(match_boundary(b"--Xabc", b"X"), None);
        assert_eq!(match_boundary(b"---X", b"X"), None);
        assert_eq!(match_boundary(b"--X-", b"X"), None);
        assert_eq!(match_boundary(b"X", b"X"), None);
        assert_eq!(match_boundary(b" --X", b"X"), None);
    }

    #[test]
    fn transport_padding_is_ignored() {
        assert_eq!(match_boundary(b"--X \t\r\n", b"X"), Some(BoundaryKind::Open));
        assert_eq!(match_boundary(b"--X-- \n", b"X"), Some(BoundaryKind::Close));
    }

    #[test]
    fn line_end_helpers() {
        assert_eq!(trim_line_end(b"abc\r\n"), b"abc");
        assert_eq!(line_end(b"abc\r\n"), b"\r\n");
        assert_eq!(line_end(b"abc\n"), b"\n");
        assert_eq!(line_end(b"abc"), b"");
        assert_eq!(line_end(b"abc\r"), b"");
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"\n"));
        assert!(!is_blank_line(b""));
        assert!(!is_blank_line(b" \r\n"));
    }
}

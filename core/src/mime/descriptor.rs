/*
 * descriptor.rs
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

//! Body descriptor: the effective content type, charset, transfer encoding and
//! disposition of one entity, computed from its header.
//!
//! A [`BodyDescriptorBuilder`] collects fields while the header is tokenized; the
//! resulting [`BodyDescriptor`] is immutable.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::mime::content_disposition::{parse_content_disposition, ContentDisposition};
use crate::mime::content_type::parse_content_type;
use crate::mime::header::RawField;
use crate::mime::mime_version::MimeVersion;
use crate::mime::parameter::Parameter;
use crate::mime::utils::is_valid_boundary;

pub const DEFAULT_CHARSET: &str = "us-ascii";
pub const DEFAULT_TRANSFER_ENCODING: &str = "7bit";

/// Content-Transfer-Encoding (RFC 2045 section 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
    Other(String),
}

impl TransferEncoding {
    /// Case-insensitive; surrounding whitespace ignored.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "binary" => TransferEncoding::Binary,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            "base64" => TransferEncoding::Base64,
            _ => TransferEncoding::Other(label),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::Other(s) => s,
        }
    }

    /// 7bit, 8bit and binary leave the bytes untouched.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary
        )
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields only captured by a maximal descriptor.
#[derive(Debug, Clone, Default)]
struct ExtraFields {
    content_id: Option<String>,
    content_description: Option<String>,
    content_location: Option<String>,
    content_md5: Option<String>,
    content_language: Vec<String>,
    mime_version: Option<MimeVersion>,
}

/// Immutable summary of one entity's content headers.
#[derive(Debug, Clone)]
pub struct BodyDescriptor {
    media_type: String,
    sub_type: String,
    charset: String,
    transfer_encoding: TransferEncoding,
    boundary: Option<String>,
    parameters: Vec<Parameter>,
    parameter_map: HashMap<String, String>,
    disposition_raw: Option<String>,
    disposition: OnceLock<Option<ContentDisposition>>,
    extra: Option<ExtraFields>,
}

impl BodyDescriptor {
    /// Descriptor for an entity whose header declared nothing.
    pub fn default_for(parent: Option<&BodyDescriptor>) -> Self {
        BodyDescriptorBuilder::new(parent, false).build()
    }

    /// Descriptor for headless input from a Content-Type value such as `text/html; charset=utf-8`.
    pub fn from_content_type(content_type: &str) -> Self {
        let mut builder = BodyDescriptorBuilder::new(None, false);
        builder.content_type = Some(content_type.to_string());
        builder.build()
    }

    /// `type/subtype`, lower case.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.sub_type)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn transfer_encoding(&self) -> &TransferEncoding {
        &self.transfer_encoding
    }

    /// Present only for `multipart/*`.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type == "multipart"
    }

    pub fn is_message(&self) -> bool {
        self.media_type == "message"
    }

    /// Content-Type parameters as declared.
    pub fn raw_parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Content-Type parameters, lower-cased keys, RFC 2231 applied.
    pub fn content_type_parameters(&self) -> &HashMap<String, String> {
        &self.parameter_map
    }

    pub fn content_type_parameter(&self, name: &str) -> Option<&str> {
        self.parameter_map
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn disposition(&self) -> Option<&ContentDisposition> {
        self.disposition
            .get_or_init(|| self.disposition_raw.as_deref().and_then(parse_content_disposition))
            .as_ref()
    }

    /// Lower-cased disposition type (`inline`, `attachment`, ...).
    pub fn disposition_type(&self) -> Option<&str> {
        self.disposition().map(ContentDisposition::disposition_type)
    }

    /// Content-Disposition parameters, lower-cased keys, RFC 2231 applied.
    pub fn disposition_parameters(&self) -> Option<&HashMap<String, String>> {
        self.disposition().map(ContentDisposition::parameter_map)
    }

    pub fn disposition_parameter(&self, name: &str) -> Option<&str> {
        self.disposition()?.get_parameter(name)
    }

    pub fn filename(&self) -> Option<&str> {
        self.disposition()
            .and_then(ContentDisposition::filename)
            .or_else(|| self.content_type_parameter("name"))
    }

    /// True when this descriptor captured the maximal field set.
    pub fn is_maximal(&self) -> bool {
        self.extra.is_some()
    }

    pub fn content_id(&self) -> Option<&str> {
        self.extra.as_ref()?.content_id.as_deref()
    }

    pub fn content_description(&self) -> Option<&str> {
        self.extra.as_ref()?.content_description.as_deref()
    }

    pub fn content_location(&self) -> Option<&str> {
        self.extra.as_ref()?.content_location.as_deref()
    }

    pub fn content_md5(&self) -> Option<&str> {
        self.extra.as_ref()?.content_md5.as_deref()
    }

    pub fn content_language(&self) -> &[String] {
        match &self.extra {
            Some(extra) => &extra.content_language,
            None => &[],
        }
    }

    pub fn mime_version(&self) -> Option<MimeVersion> {
        self.extra.as_ref()?.mime_version
    }
}

impl fmt::Display for BodyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[mimeType={}/{}, charset={}, transferEncoding={}",
            self.media_type, self.sub_type, self.charset, self.transfer_encoding
        )?;
        if let Some(b) = &self.boundary {
            write!(f, ", boundary={b}")?;
        }
        f.write_str("]")
    }
}

/// Collects content fields for one entity. The first occurrence of each field decides.
#[derive(Debug, Clone)]
pub struct BodyDescriptorBuilder {
    parent_is_digest: bool,
    maximal: bool,
    content_type: Option<String>,
    transfer_encoding: Option<String>,
    disposition: Option<String>,
    extra: ExtraFields,
}

impl BodyDescriptorBuilder {
    /// `parent` is the enclosing multipart's descriptor, if any.
    pub fn new(parent: Option<&BodyDescriptor>, maximal: bool) -> Self {
        Self {
            parent_is_digest: parent.is_some_and(|p| p.is_multipart() && p.sub_type == "digest"),
            maximal,
            content_type: None,
            transfer_encoding: None,
            disposition: None,
            extra: ExtraFields::default(),
        }
    }

    pub fn add_field(&mut self, field: &RawField) {
        let name = field.name().to_ascii_lowercase();
        let first = |slot: &mut Option<String>| {
            if slot.is_none() {
                *slot = Some(field.body().trim().to_string());
            }
        };
        match name.as_str() {
            "content-type" => first(&mut self.content_type),
            "content-transfer-encoding" => first(&mut self.transfer_encoding),
            "content-disposition" => first(&mut self.disposition),
            _ if !self.maximal => {}
            "content-id" => first(&mut self.extra.content_id),
            "content-description" => first(&mut self.extra.content_description),
            "content-location" => first(&mut self.extra.content_location),
            "content-md5" => first(&mut self.extra.content_md5),
            "content-language" => {
                if self.extra.content_language.is_empty() {
                    self.extra.content_language = field
                        .body()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
            }
            "mime-version" => {
                if self.extra.mime_version.is_none() {
                    self.extra.mime_version = MimeVersion::parse(field.body());
                }
            }
            _ => {}
        }
    }

    fn default_type(&self) -> (&'static str, &'static str) {
        if self.parent_is_digest {
            ("message", "rfc822")
        } else {
            ("text", "plain")
        }
    }

    pub fn build(self) -> BodyDescriptor {
        let parsed = self.content_type.as_deref().and_then(|value| {
            let ct = parse_content_type(value);
            if ct.is_none() {
                warn!(content_type = value, "unparseable Content-Type, using the default");
            }
            ct
        });

        let (default_media, default_sub) = self.default_type();
        let (mut media_type, mut sub_type, parameters, parameter_map) = match parsed {
            Some(ct) => ct.into_parts(),
            None => (
                default_media.to_string(),
                default_sub.to_string(),
                Vec::new(),
                HashMap::new(),
            ),
        };

        let mut boundary = None;
        if media_type == "multipart" {
            match parameter_map.get("boundary").filter(|b| !b.is_empty()) {
                Some(b) => {
                    if !is_valid_boundary(b) {
                        debug!(boundary = %b, "boundary outside RFC 2046 syntax");
                    }
                    boundary = Some(b.clone());
                }
                None => {
                    warn!("multipart without boundary, using the default content type");
                    media_type = default_media.to_string();
                    sub_type = default_sub.to_string();
                }
            }
        }

        let charset = parameter_map
            .get("charset")
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());

        let transfer_encoding = TransferEncoding::from_label(
            self.transfer_encoding
                .as_deref()
                .filter(|te| !te.trim().is_empty())
                .unwrap_or(DEFAULT_TRANSFER_ENCODING),
        );

        let descriptor = BodyDescriptor {
            media_type,
            sub_type,
            charset,
            transfer_encoding,
            boundary,
            parameters,
            parameter_map,
            disposition_raw: self.disposition,
            disposition: OnceLock::new(),
            extra: self.maximal.then_some(self.extra),
        };
        if self.maximal {
            let _ = descriptor.disposition();
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn field(raw: &'static str) -> RawField {
        RawField::parse(Bytes::from_static(raw.as_bytes())).unwrap()
    }

    fn build(fields: &[&'static str], parent: Option<&BodyDescriptor>, maximal: bool) -> BodyDescriptor {
        let mut builder = BodyDescriptorBuilder::new(parent, maximal);
        for f in fields {
            builder.add_field(&field(f));
        }
        builder.build()
    }

    #[test]
    fn defaults() {
        let d = build(&["Subject: hi"], None, false);
        assert_eq!(d.mime_type(), "text/plain");
        assert_eq!(d.charset(), "us-ascii");
        assert_eq!(d.transfer_encoding(), &TransferEncoding::SevenBit);
        assert_eq!(d.boundary(), None);
        assert_eq!(d.disposition_type(), None);
    }

    #[test]
    fn first_content_type_wins() {
        let d = build(
            &[
                "Content-Type: Text/HTML; Charset=\"UTF-8\"",
                "Content-Type: image/png",
                "Content-Transfer-Encoding: BASE64",
                "Content-Transfer-Encoding: 7bit",
            ],
            None,
            false,
        );
        assert_eq!(d.mime_type(), "text/html");
        assert_eq!(d.charset(), "utf-8");
        assert_eq!(d.transfer_encoding(), &TransferEncoding::Base64);
    }

    #[test]
    fn multipart_boundary() {
        let d = build(&["Content-Type: multipart/mixed; boundary=\"=_x y\""], None, false);
        assert!(d.is_multipart());
        assert_eq!(d.boundary(), Some("=_x y"));
        assert_eq!(d.content_type_parameter("BOUNDARY"), Some("=_x y"));
    }

    #[test]
    fn multipart_without_boundary_falls_back() {
        let d = build(&["Content-Type: multipart/mixed"], None, false);
        assert_eq!(d.mime_type(), "text/plain");
        assert_eq!(d.boundary(), None);
    }

    #[test]
    fn boundary_only_for_multipart() {
        let d = build(&["Content-Type: text/plain; boundary=AA"], None, false);
        assert_eq!(d.boundary(), None);
    }

    #[test]
    fn digest_children_default_to_message() {
        let digest = build(&["Content-Type: multipart/digest; boundary=D"], None, false);
        let child = build(&[], Some(&digest), false);
        assert_eq!(child.mime_type(), "message/rfc822");
        let declared = build(&["Content-Type: text/plain"], Some(&digest), false);
        assert_eq!(declared.mime_type(), "text/plain");

        let mixed = build(&["Content-Type: multipart/mixed; boundary=M"], None, false);
        assert_eq!(BodyDescriptor::default_for(Some(&mixed)).mime_type(), "text/plain");
    }

    #[test]
    fn invalid_content_type_uses_default() {
        let d = build(&["Content-Type: garbage"], None, false);
        assert_eq!(d.mime_type(), "text/plain");
    }

    #[test]
    fn disposition_is_parsed_lazily() {
        let d = build(
            &["Content-Disposition: attachment; filename*=utf-8''na%C3%AFve.txt"],
            None,
            false,
        );
        assert!(!d.is_maximal());
        assert_eq!(d.disposition_type(), Some("attachment"));
        assert_eq!(d.filename(), Some("na\u{ef}ve.txt"));
        assert_eq!(d.content_id(), None);
    }

    #[test]
    fn maximal_fields() {
        let d = build(
            &[
                "MIME-Version: 1.0",
                "Content-ID: <part1@example.com>",
                "Content-Description: a picture",
                "Content-Language: en, de",
                "Content-Location: http://example.com/a.png",
                "Content-MD5: Q2hlY2sgSW50ZWdyaXR5IQ==",
                "Content-Disposition: inline",
            ],
            None,
            true,
        );
        assert!(d.is_maximal());
        assert_eq!(d.mime_version(), Some(MimeVersion::V1_0));
        assert_eq!(d.content_id(), Some("<part1@example.com>"));
        assert_eq!(d.content_description(), Some("a picture"));
        assert_eq!(d.content_language(), ["en".to_string(), "de".to_string()]);
        assert_eq!(d.content_location(), Some("http://example.com/a.png"));
        assert_eq!(d.content_md5(), Some("Q2hlY2sgSW50ZWdyaXR5IQ=="));
        assert_eq!(d.disposition_type(), Some("inline"));
    }

    #[test]
    fn headless_descriptor() {
        let d = BodyDescriptor::from_content_type("multipart/alternative; boundary=B");
        assert_eq!(d.mime_type(), "multipart/alternative");
        assert_eq!(d.boundary(), Some("B"));
        assert_eq!(d.to_string(), "[mimeType=multipart/alternative, charset=us-ascii, transferEncoding=7bit, boundary=B]");
    }
}

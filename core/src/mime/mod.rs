/*
 * mod.rs
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

//! Streaming MIME entity parsing: a pull cursor ([`MimeTokenStream`]) and a push
//! driver ([`MimeStreamParser`] with a [`MimeHandler`]), plus the Base64 and
//! Quoted-Printable transfer-encoding codecs.

pub mod base64;
mod boundary;
mod codec;
mod config;
mod content_disposition;
mod content_type;
mod descriptor;
mod error;
mod handler;
mod header;
mod mime_version;
mod parameter;
mod parser;
pub mod quoted_printable;
mod reader;
mod stream;
mod utils;

pub use boundary::{match_boundary, BoundaryKind};
pub use codec::DecodingReader;
pub use config::MimeConfig;
pub use content_disposition::{parse_content_disposition, ContentDisposition};
pub use content_type::{parse_content_type, ContentType};
pub use descriptor::{
    BodyDescriptor, BodyDescriptorBuilder, TransferEncoding, DEFAULT_CHARSET, DEFAULT_TRANSFER_ENCODING,
};
pub use error::{DecodeError, MimeError, MimeLocator, Violation};
pub use handler::MimeHandler;
pub use header::{HeaderStep, HeaderTokenizer, LineSource, RawField};
pub use mime_version::MimeVersion;
pub use parameter::{parameter_map, parse_parameter_list, Parameter};
pub use parser::MimeStreamParser;
pub use reader::{BoundedReader, PositionReader};
pub use stream::{ContentStream, EntityState, MimeTokenStream, RecursionMode, StopHandle};
pub use utils::{is_boundary_char, is_token, is_token_char, is_valid_boundary};

pub use self::base64::{Base64Decoder, Base64Encoder};
pub use self::quoted_printable::{QuotedPrintableDecoder, QuotedPrintableEncoder};

/*
 * handler.rs
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

//! MIME handler trait: receives parsing events (entity, headers, content streams).

use std::io::Read;

use crate::mime::descriptor::BodyDescriptor;
use crate::mime::error::{MimeError, MimeLocator};
use crate::mime::header::RawField;

/// Handler for MIME parsing events (push model). The parser calls these as it reads.
///
/// Content streams are only readable for the duration of the call; whatever is left
/// unread is skipped. Returning an error aborts the parse with that error.
pub trait MimeHandler {
    /// Position of the event about to be delivered.
    fn set_locator(&mut self, _locator: MimeLocator) {}

    fn start_message(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_header(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn field(&mut self, _field: &RawField) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_header(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_multipart(&mut self, _descriptor: &BodyDescriptor) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_multipart(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn preamble(&mut self, _content: &mut dyn Read) -> Result<(), MimeError> {
        Ok(())
    }

    fn epilogue(&mut self, _content: &mut dyn Read) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_body_part(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_body_part(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn body(&mut self, _descriptor: &BodyDescriptor, _content: &mut dyn Read) -> Result<(), MimeError> {
        Ok(())
    }

    /// A whole entity in raw mode.
    fn raw(&mut self, _content: &mut dyn Read) -> Result<(), MimeError> {
        Ok(())
    }
}

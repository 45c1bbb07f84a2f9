/*
 * parser.rs
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

//! MIME parser: drives a [`MimeTokenStream`] and delivers each event to a [`MimeHandler`].

use std::io::Read;

use crate::mime::config::MimeConfig;
use crate::mime::descriptor::BodyDescriptor;
use crate::mime::error::MimeError;
use crate::mime::handler::MimeHandler;
use crate::mime::stream::{EntityState, MimeTokenStream, RecursionMode, StopHandle};

/// Event-driven MIME parser. Call [`parse`](Self::parse) with an input and a handler.
#[derive(Debug, Clone, Default)]
pub struct MimeStreamParser {
    config: MimeConfig,
    content_decoding: bool,
    recursion: RecursionMode,
    stop: StopHandle,
}

impl MimeStreamParser {
    pub fn new(config: MimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &MimeConfig {
        &self.config
    }

    pub fn is_content_decoding(&self) -> bool {
        self.content_decoding
    }

    /// Deliver bodies with their transfer encoding undone.
    pub fn set_content_decoding(&mut self, decode: bool) {
        self.content_decoding = decode;
    }

    pub fn recursion_mode(&self) -> RecursionMode {
        self.recursion
    }

    pub fn set_recursion_mode(&mut self, mode: RecursionMode) {
        self.recursion = mode;
    }

    pub fn set_recurse(&mut self) {
        self.recursion = RecursionMode::Recurse;
    }

    pub fn set_no_recurse(&mut self) {
        self.recursion = RecursionMode::NoRecurse;
    }

    pub fn set_raw(&mut self) {
        self.recursion = RecursionMode::Raw;
    }

    pub fn set_flat(&mut self) {
        self.recursion = RecursionMode::Flat;
    }

    /// Handle for ending the running parse early, from a handler callback or another
    /// thread. Each [`parse`](Self::parse) starts with the handle cleared.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Parse `input` to the end, delivering every event to `handler`.
    ///
    /// A strict-mode protocol error or a handler error is returned after the handler has
    /// received the end events closing every open entity. When several occur the first
    /// is returned. An I/O error ends the parse immediately.
    pub fn parse<R, H>(&self, input: R, handler: &mut H) -> Result<(), MimeError>
    where
        R: Read,
        H: MimeHandler + ?Sized,
    {
        self.stop.reset();
        let mut stream = MimeTokenStream::with_stop_handle(input, self.config.clone(), self.stop.clone());
        stream.set_recursion_mode(self.recursion);
        stream.set_content_decoding(self.content_decoding);

        let mut failure = None;
        let mut state = stream.state();
        loop {
            handler.set_locator(stream.locator());
            if let Err(e) = deliver(&mut stream, state, handler) {
                stream.stop();
                failure.get_or_insert(e);
            }
            if state == EntityState::EndOfStream {
                break;
            }
            state = loop {
                match stream.advance() {
                    Ok(next) => break next,
                    Err(e @ MimeError::Io(_)) => return Err(failure.unwrap_or(e)),
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            };
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn deliver<R, H>(stream: &mut MimeTokenStream<R>, state: EntityState, handler: &mut H) -> Result<(), MimeError>
where
    R: Read,
    H: MimeHandler + ?Sized,
{
    match state {
        EntityState::StartMessage => handler.start_message(),
        EntityState::EndMessage => handler.end_message(),
        EntityState::StartHeader => handler.start_header(),
        EntityState::Field => match stream.field() {
            Some(field) => handler.field(field),
            None => Ok(()),
        },
        EntityState::EndHeader => handler.end_header(),
        EntityState::StartMultipart => {
            let descriptor = stream
                .shared_descriptor()
                .unwrap_or_else(|| BodyDescriptor::default_for(None).into());
            handler.start_multipart(&descriptor)
        }
        EntityState::Preamble => handler.preamble(&mut stream.input_stream()),
        EntityState::StartBodyPart => handler.start_body_part(),
        EntityState::EndBodyPart => handler.end_body_part(),
        EntityState::Epilogue => handler.epilogue(&mut stream.input_stream()),
        EntityState::EndMultipart => handler.end_multipart(),
        EntityState::Body => {
            let descriptor = stream
                .shared_descriptor()
                .unwrap_or_else(|| BodyDescriptor::default_for(None).into());
            handler.body(&descriptor, &mut stream.content_stream())
        }
        EntityState::RawEntity => handler.raw(&mut stream.input_stream()),
        EntityState::EndOfStream => Ok(()),
    }
}

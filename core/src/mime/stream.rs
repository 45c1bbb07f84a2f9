/*
 * stream.rs
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

//! Pull-model MIME entity parser.
//!
//! [`MimeTokenStream`] walks nested message / multipart / body-part structure in a
//! single forward pass and reports one [`EntityState`] at a time. Every start event
//! is matched by exactly one end event, properly nested, whatever the input looks
//! like and however the parse ends (end of input, [`stop`](MimeTokenStream::stop),
//! or a strict-mode protocol error).
//!
//! Nesting is an explicit stack of frames rather than recursion, so that
//! [`advance`](MimeTokenStream::advance) can suspend anywhere in the structure.
//! All frames share one byte cursor. Content (preamble, body, epilogue, raw entity)
//! is read lazily through [`content_stream`](MimeTokenStream::content_stream); what
//! the caller leaves unread is skipped on the next advance.

use std::fmt;
use std::io::{self, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::mime::boundary::{line_end, match_boundary, BoundaryKind};
use crate::mime::codec::DecodingReader;
use crate::mime::config::MimeConfig;
use crate::mime::descriptor::{BodyDescriptor, BodyDescriptorBuilder, TransferEncoding};
use crate::mime::error::{MimeError, MimeLocator, Violation};
use crate::mime::header::{HeaderStep, HeaderTokenizer, LineSource, RawField};
use crate::mime::reader::{BoundedReader, PositionReader};

/// Largest piece of content read from the source at once.
const CONTENT_CHUNK: usize = 4096;

/// The event the cursor is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    StartMessage,
    EndMessage,
    /// A whole entity, header included, reported as one unparsed stream (raw mode).
    RawEntity,
    StartHeader,
    Field,
    EndHeader,
    StartMultipart,
    Preamble,
    StartBodyPart,
    EndBodyPart,
    Epilogue,
    EndMultipart,
    Body,
    EndOfStream,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::StartMessage => "start message",
            EntityState::EndMessage => "end message",
            EntityState::RawEntity => "raw entity",
            EntityState::StartHeader => "start header",
            EntityState::Field => "field",
            EntityState::EndHeader => "end header",
            EntityState::StartMultipart => "start multipart",
            EntityState::Preamble => "preamble",
            EntityState::StartBodyPart => "start body part",
            EntityState::EndBodyPart => "end body part",
            EntityState::Epilogue => "epilogue",
            EntityState::EndMultipart => "end multipart",
            EntityState::Body => "body",
            EntityState::EndOfStream => "end of stream",
        }
    }

    /// True for events that carry a content stream.
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            EntityState::Preamble | EntityState::Epilogue | EntityState::Body | EntityState::RawEntity
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far the parser descends into nested entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecursionMode {
    /// Parse multiparts and embedded messages.
    #[default]
    Recurse,
    /// Parse multiparts; report embedded messages as bodies.
    NoRecurse,
    /// Report each body part and embedded message as a [`EntityState::RawEntity`].
    Raw,
    /// Report every body, multipart ones included, as a single [`EntityState::Body`].
    Flat,
}

/// Cancels a parse from anywhere: a handler callback or another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

type Source<R> = PositionReader<BufReader<BoundedReader<R>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Message,
    BodyPart,
    Multipart,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Start event reported.
    Start,
    /// StartHeader reported, fields pending.
    Header,
    /// Descriptor built; the body is next.
    BodyNext,
    /// Content reported.
    Body,
    /// A nested multipart or message is on the stack above.
    Child,
    Preamble,
    /// A body part is on the stack above.
    Part,
    Epilogue,
}

struct EntityFrame {
    kind: FrameKind,
    stage: Stage,
    descriptor: Option<Arc<BodyDescriptor>>,
    /// Multipart frames only.
    boundary: Vec<u8>,
}

impl EntityFrame {
    fn new(kind: FrameKind, stage: Stage) -> Self {
        Self {
            kind,
            stage,
            descriptor: None,
            boundary: Vec::new(),
        }
    }

    fn end_state(&self) -> Option<EntityState> {
        match self.kind {
            FrameKind::Message => Some(EntityState::EndMessage),
            FrameKind::BodyPart => Some(EntityState::EndBodyPart),
            FrameKind::Multipart => Some(EntityState::EndMultipart),
            FrameKind::Raw => None,
        }
    }
}

/// What ended the last piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    /// Delimiter line of the multipart frame at `frame`.
    Boundary { frame: usize, kind: BoundaryKind },
    Eof,
}

/// Innermost multipart whose delimiter `line` is. A multipart in its epilogue no
/// longer owns its boundary.
fn active_boundary(frames: &[EntityFrame], line: &[u8]) -> Option<(usize, BoundaryKind)> {
    frames.iter().enumerate().rev().find_map(|(i, frame)| {
        if frame.kind != FrameKind::Multipart || frame.stage == Stage::Epilogue {
            return None;
        }
        match_boundary(line, &frame.boundary).map(|kind| (i, kind))
    })
}

/// Cursor over the current piece of content.
///
/// The line break before a delimiter belongs to the delimiter, so each line break is
/// held back until the next line is known not to be one.
#[derive(Default)]
struct ContentCursor {
    active: bool,
    chunk: BytesMut,
    pos: usize,
    pending_eol: BytesMut,
    at_line_start: bool,
    done: bool,
}

impl ContentCursor {
    fn begin() -> Self {
        Self {
            active: true,
            at_line_start: true,
            ..Self::default()
        }
    }
}

/// Header open on the top frame.
struct OpenHeader {
    tokenizer: HeaderTokenizer,
    builder: BodyDescriptorBuilder,
}

/// Lines for the header tokenizer, straight off the shared cursor.
struct HeaderSource<'a, R: Read> {
    source: &'a mut Source<R>,
    frames: &'a [EntityFrame],
    stop: &'a AtomicBool,
}

impl<R: Read> LineSource for HeaderSource<'_, R> {
    fn read_line(&mut self, dst: &mut BytesMut, max: usize) -> io::Result<usize> {
        self.source.read_line(dst, max)
    }

    fn unread(&mut self, line: &[u8]) {
        self.source.unread(line);
    }

    fn is_boundary(&self, line: &[u8]) -> bool {
        active_boundary(self.frames, line).is_some()
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn locator(&self) -> MimeLocator {
        self.source.locator()
    }
}

/// Pull cursor over the MIME structure of one input.
///
/// ```
/// use tagliacarte_mime::mime::{EntityState, MimeConfig, MimeTokenStream};
/// use std::io::Read;
///
/// let input = &b"Subject: test\r\n\r\nHello"[..];
/// let mut stream = MimeTokenStream::new(input, MimeConfig::default());
/// let mut body = String::new();
/// loop {
///     match stream.advance().unwrap() {
///         EntityState::Body => {
///             stream.content_stream().read_to_string(&mut body).unwrap();
///         }
///         EntityState::EndOfStream => break,
///         _ => {}
///     }
/// }
/// assert_eq!(body, "Hello");
/// ```
pub struct MimeTokenStream<R: Read> {
    config: MimeConfig,
    source: Source<R>,
    frames: Vec<EntityFrame>,
    state: EntityState,
    recursion: RecursionMode,
    content_decoding: bool,
    stop: Arc<AtomicBool>,
    header: Option<OpenHeader>,
    field: Option<RawField>,
    content: ContentCursor,
    terminator: Option<Terminator>,
    /// Unwinding after stop or a fatal protocol error: only end events remain.
    closing: bool,
    limit_reported: bool,
}

impl<R: Read> MimeTokenStream<R> {
    /// Positioned on [`EntityState::StartMessage`].
    pub fn new(input: R, config: MimeConfig) -> Self {
        Self::with_stop_handle(input, config, StopHandle::new())
    }

    /// Parse with a stop handle shared with other code.
    pub fn with_stop_handle(input: R, config: MimeConfig, stop: StopHandle) -> Self {
        let bounded = BoundedReader::new(input, config.max_content_len);
        Self {
            source: PositionReader::new(BufReader::new(bounded)),
            frames: vec![EntityFrame::new(FrameKind::Message, Stage::Start)],
            state: EntityState::StartMessage,
            recursion: RecursionMode::default(),
            content_decoding: false,
            stop: stop.0,
            header: None,
            field: None,
            content: ContentCursor::default(),
            terminator: None,
            closing: false,
            limit_reported: false,
            config,
        }
    }

    pub fn config(&self) -> &MimeConfig {
        &self.config
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn recursion_mode(&self) -> RecursionMode {
        self.recursion
    }

    /// Takes effect for entities whose body has not been reached yet.
    pub fn set_recursion_mode(&mut self, mode: RecursionMode) {
        self.recursion = mode;
    }

    pub fn set_recurse(&mut self) {
        self.set_recursion_mode(RecursionMode::Recurse);
    }

    pub fn set_no_recurse(&mut self) {
        self.set_recursion_mode(RecursionMode::NoRecurse);
    }

    pub fn set_raw(&mut self) {
        self.set_recursion_mode(RecursionMode::Raw);
    }

    pub fn set_flat(&mut self) {
        self.set_recursion_mode(RecursionMode::Flat);
    }

    pub fn is_content_decoding(&self) -> bool {
        self.content_decoding
    }

    /// Whether [`content_stream`](Self::content_stream) undoes transfer encodings.
    pub fn set_content_decoding(&mut self, decode: bool) {
        self.content_decoding = decode;
    }

    /// Request the parse to end. The remaining events are the end events for every
    /// open entity, then [`EntityState::EndOfStream`].
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Position of the next unread byte.
    pub fn locator(&self) -> MimeLocator {
        self.source.locator()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The field, when positioned on [`EntityState::Field`].
    pub fn field(&self) -> Option<&RawField> {
        self.field.as_ref()
    }

    /// Descriptor of the innermost entity once its header is complete.
    pub fn body_descriptor(&self) -> Option<&BodyDescriptor> {
        self.frames.last()?.descriptor.as_deref()
    }

    pub(crate) fn shared_descriptor(&self) -> Option<Arc<BodyDescriptor>> {
        self.frames.last()?.descriptor.clone()
    }

    /// Raw bytes of the current content event. Empty for other events.
    /// Valid until the next [`advance`](Self::advance).
    pub fn input_stream(&mut self) -> ContentStream<'_, R> {
        ContentStream { stream: self }
    }

    /// Body bytes with the transfer encoding undone; other content is returned as is.
    pub fn decoded_input_stream(&mut self) -> DecodingReader<ContentStream<'_, R>> {
        let encoding = self.body_encoding();
        let strict = self.config.strict_decoding;
        DecodingReader::new(self.input_stream(), &encoding, strict)
    }

    /// [`decoded_input_stream`](Self::decoded_input_stream) when content decoding is on,
    /// otherwise the raw bytes.
    pub fn content_stream(&mut self) -> DecodingReader<ContentStream<'_, R>> {
        if self.content_decoding {
            self.decoded_input_stream()
        } else {
            DecodingReader::Identity(self.input_stream())
        }
    }

    fn body_encoding(&self) -> TransferEncoding {
        match (self.state, self.body_descriptor()) {
            (EntityState::Body, Some(d)) => d.transfer_encoding().clone(),
            _ => TransferEncoding::SevenBit,
        }
    }

    /// Move to the next event.
    ///
    /// A protocol error in strict mode is returned once; the following calls report
    /// the end events that close the open entities. An I/O error abandons the parse.
    pub fn advance(&mut self) -> Result<EntityState, MimeError> {
        if self.state == EntityState::EndOfStream {
            return Ok(EntityState::EndOfStream);
        }
        self.field = None;
        if let Err(e) = self.drain_content() {
            return Err(self.abandon(e));
        }
        if !self.closing && self.stop.load(Ordering::Acquire) {
            debug!(depth = self.frames.len(), "parse stopped");
            self.begin_closing();
        }
        let next = if self.closing {
            Ok(self.close_step())
        } else {
            self.step()
        };
        match next {
            Ok(state) => {
                trace!(state = %state, depth = self.frames.len(), "mime event");
                self.state = state;
                Ok(state)
            }
            Err(MimeError::Io(e)) => Err(self.abandon(e)),
            Err(e) => {
                self.begin_closing();
                Err(e)
            }
        }
    }

    fn abandon(&mut self, e: io::Error) -> MimeError {
        self.frames.clear();
        self.header = None;
        self.content = ContentCursor::default();
        self.state = EntityState::EndOfStream;
        MimeError::Io(e)
    }

    fn begin_closing(&mut self) {
        self.closing = true;
        self.content = ContentCursor::default();
        self.source.truncate();
    }

    fn close_step(&mut self) -> EntityState {
        if self.header.take().is_some() {
            return EntityState::EndHeader;
        }
        while let Some(frame) = self.frames.pop() {
            if let Some(end) = frame.end_state() {
                return end;
            }
        }
        EntityState::EndOfStream
    }

    fn violation(&self, violation: Violation) -> Result<(), MimeError> {
        let locator = self.source.locator();
        if self.config.strict_parsing {
            return Err(MimeError::protocol(violation, locator));
        }
        warn!(line = locator.line, offset = locator.offset, "{violation}");
        Ok(())
    }

    fn limit_exceeded(&mut self) -> bool {
        if self.limit_reported || !self.source.get_ref().get_ref().overflowed() {
            return false;
        }
        self.limit_reported = true;
        true
    }

    fn begin_content(&mut self) {
        self.content = ContentCursor::begin();
        self.terminator = None;
    }

    fn step(&mut self) -> Result<EntityState, MimeError> {
        loop {
            if self.limit_exceeded() {
                self.violation(Violation::ContentLimitExceeded)?;
            }
            let Some(top) = self.frames.len().checked_sub(1) else {
                return Ok(EntityState::EndOfStream);
            };
            let (kind, stage) = (self.frames[top].kind, self.frames[top].stage);
            match (kind, stage) {
                (FrameKind::Raw, _) => {
                    self.frames.pop();
                }
                (FrameKind::Multipart, Stage::Start) => {
                    self.frames[top].stage = Stage::Preamble;
                    self.begin_content();
                    return Ok(EntityState::Preamble);
                }
                (FrameKind::Multipart, Stage::Preamble | Stage::Part) => {
                    return self.next_part(top);
                }
                (FrameKind::Multipart, _) => {
                    self.frames.pop();
                    return Ok(EntityState::EndMultipart);
                }
                (_, Stage::Start) => {
                    if top == 0 {
                        if let Some(content_type) = self.config.headless_content_type.as_deref() {
                            let descriptor = BodyDescriptor::from_content_type(content_type);
                            self.frames[top].descriptor = Some(Arc::new(descriptor));
                            self.frames[top].stage = Stage::BodyNext;
                            continue;
                        }
                    }
                    let parent = top
                        .checked_sub(1)
                        .and_then(|i| self.frames[i].descriptor.as_deref());
                    self.header = Some(OpenHeader {
                        tokenizer: HeaderTokenizer::new(&self.config),
                        builder: BodyDescriptorBuilder::new(parent, self.config.maximal_body_descriptor),
                    });
                    self.frames[top].stage = Stage::Header;
                    return Ok(EntityState::StartHeader);
                }
                (_, Stage::Header) => return self.next_field(top),
                (_, Stage::BodyNext) => return Ok(self.enter_body(top)),
                (_, _) => {
                    let frame = self.frames.pop();
                    return Ok(frame.and_then(|f| f.end_state()).unwrap_or(EntityState::EndOfStream));
                }
            }
        }
    }

    fn next_field(&mut self, top: usize) -> Result<EntityState, MimeError> {
        let step = {
            let Some(open) = self.header.as_mut() else {
                self.frames[top].stage = Stage::BodyNext;
                return Ok(EntityState::EndHeader);
            };
            let mut src = HeaderSource {
                source: &mut self.source,
                frames: &self.frames,
                stop: &self.stop,
            };
            open.tokenizer.next_field(&mut src)
        };
        match step {
            Ok(HeaderStep::Field(field)) => {
                if let Some(open) = self.header.as_mut() {
                    open.builder.add_field(&field);
                }
                self.field = Some(field);
                Ok(EntityState::Field)
            }
            Ok(HeaderStep::End) => {
                if let Some(open) = self.header.take() {
                    self.frames[top].descriptor = Some(Arc::new(open.builder.build()));
                }
                self.frames[top].stage = Stage::BodyNext;
                Ok(EntityState::EndHeader)
            }
            Err(e) if e.violation() == Some(Violation::HeadersPrematureEnd) && self.limit_exceeded() => Err(
                MimeError::protocol(Violation::ContentLimitExceeded, self.source.locator()),
            ),
            Err(e) => Err(e),
        }
    }

    /// Decide what the body of the entity at `top` is.
    fn enter_body(&mut self, top: usize) -> EntityState {
        let descriptor = match &self.frames[top].descriptor {
            Some(d) => Arc::clone(d),
            None => {
                let d = Arc::new(BodyDescriptor::default_for(None));
                self.frames[top].descriptor = Some(Arc::clone(&d));
                d
            }
        };
        let flat = self.recursion == RecursionMode::Flat;

        if !flat && descriptor.is_multipart() {
            if let Some(boundary) = descriptor.boundary() {
                self.frames[top].stage = Stage::Child;
                let mut frame = EntityFrame::new(FrameKind::Multipart, Stage::Start);
                frame.boundary = boundary.as_bytes().to_vec();
                frame.descriptor = Some(descriptor);
                self.frames.push(frame);
                return EntityState::StartMultipart;
            }
        }

        let embedded = descriptor.is_message()
            && descriptor.sub_type() != "partial"
            && descriptor.transfer_encoding().is_identity();
        if !flat && embedded && self.recursion != RecursionMode::NoRecurse {
            self.frames[top].stage = Stage::Child;
            if self.recursion == RecursionMode::Raw {
                self.frames.push(EntityFrame::new(FrameKind::Raw, Stage::Body));
                self.begin_content();
                return EntityState::RawEntity;
            }
            self.frames.push(EntityFrame::new(FrameKind::Message, Stage::Start));
            return EntityState::StartMessage;
        }
        if descriptor.is_message() && !descriptor.transfer_encoding().is_identity() {
            debug!(encoding = %descriptor.transfer_encoding(), "encoded embedded message reported as body");
        }

        self.frames[top].stage = Stage::Body;
        self.begin_content();
        EntityState::Body
    }

    /// The multipart at `top` finished its preamble or a part: look at what ended it.
    fn next_part(&mut self, top: usize) -> Result<EntityState, MimeError> {
        match self.terminator.take() {
            Some(Terminator::Boundary { frame, kind }) if frame == top => match kind {
                BoundaryKind::Open => {
                    self.frames[top].stage = Stage::Part;
                    if self.recursion == RecursionMode::Raw {
                        self.frames.push(EntityFrame::new(FrameKind::Raw, Stage::Body));
                        self.begin_content();
                        return Ok(EntityState::RawEntity);
                    }
                    self.frames.push(EntityFrame::new(FrameKind::BodyPart, Stage::Start));
                    Ok(EntityState::StartBodyPart)
                }
                BoundaryKind::Close => {
                    self.frames[top].stage = Stage::Epilogue;
                    self.begin_content();
                    Ok(EntityState::Epilogue)
                }
            },
            other => {
                let violation = match other {
                    Some(Terminator::Boundary { .. }) => Violation::UnexpectedBoundary,
                    _ => Violation::BodyPrematureEnd,
                };
                // An enclosing multipart's delimiter is for the ancestors to handle.
                self.terminator = other;
                self.violation(violation)?;
                self.frames.pop();
                Ok(EntityState::EndMultipart)
            }
        }
    }

    fn drain_content(&mut self) -> io::Result<()> {
        if self.content.active {
            let mut scratch = [0u8; 1024];
            while self.read_content(&mut scratch)? > 0 {}
        }
        self.content.active = false;
        Ok(())
    }

    fn read_content(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.content.active || buf.is_empty() {
            return Ok(0);
        }
        loop {
            let c = &mut self.content;
            if c.pos < c.chunk.len() {
                let n = (c.chunk.len() - c.pos).min(buf.len());
                buf[..n].copy_from_slice(&c.chunk[c.pos..c.pos + n]);
                c.pos += n;
                return Ok(n);
            }
            if c.done {
                return Ok(0);
            }
            if self.stop.load(Ordering::Acquire) {
                c.done = true;
                return Ok(0);
            }
            self.fill_content()?;
        }
    }

    fn fill_content(&mut self) -> io::Result<()> {
        let c = &mut self.content;
        c.chunk.clear();
        c.pos = 0;
        let at_line_start = c.at_line_start;
        if self.source.read_line(&mut c.chunk, CONTENT_CHUNK)? == 0 {
            c.done = true;
            c.chunk = std::mem::take(&mut c.pending_eol);
            self.terminator = Some(Terminator::Eof);
            return Ok(());
        }
        // Keep a CRLF split by the chunk size together.
        if c.chunk.ends_with(b"\r") {
            match self.source.read_byte()? {
                Some(b'\n') => c.chunk.extend_from_slice(b"\n"),
                Some(b) => self.source.unread(&[b]),
                None => {}
            }
        }
        c.at_line_start = c.chunk.ends_with(b"\n");

        if at_line_start {
            if let Some((frame, kind)) = active_boundary(&self.frames, &c.chunk) {
                c.done = true;
                c.chunk.clear();
                c.pending_eol.clear();
                self.terminator = Some(Terminator::Boundary { frame, kind });
                return Ok(());
            }
        }

        let eol_len = line_end(&c.chunk).len();
        let eol = c.chunk.split_off(c.chunk.len() - eol_len);
        if c.pending_eol.is_empty() {
            c.pending_eol = eol;
        } else {
            let mut chunk = std::mem::replace(&mut c.pending_eol, eol);
            chunk.extend_from_slice(&c.chunk);
            c.chunk = chunk;
        }
        Ok(())
    }
}

/// Content of the current event. Borrowing the cursor keeps it valid until the next
/// advance.
pub struct ContentStream<'a, R: Read> {
    stream: &'a mut MimeTokenStream<R>,
}

impl<R: Read> Read for ContentStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read_content(buf)
    }
}

/*
 * endpoint.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Passerella, a WebSocket endpoint library.
 *
 * Passerella is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Passerella is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Passerella.  If not, see <http://www.gnu.org/licenses/>.
 */

//! The WebSocket endpoint: protocol engine and public operations.
//!
//! One mutex guards all protocol state. Engine methods take `&mut Inner`, so
//! paths that re-enter (a protocol violation inside frame receipt initiates
//! the close sequence) are plain method calls under the already-held lock.
//! User delegates are never invoked under the lock: events queue up and the
//! dispatcher drains the queue after the lock is released, so a delegate may
//! call straight back into the endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Buf, BytesMut};

use crate::frame::{
    self, FrameHeader, MAX_CONTROL_PAYLOAD, OP_BINARY, OP_CLOSE, OP_CONTINUATION, OP_PING,
    OP_PONG, OP_TEXT,
};
use crate::handler::WebSocketHandler;
use crate::handshake;
use crate::http::{Request, Response};
use crate::mask;
use crate::transport::Transport;

/// Which side of the connection this endpoint plays. Clients mask every
/// outbound frame and refuse masked inbound ones; servers the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// User-tunable knobs.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Cap on the frame reassembly buffer, pending incoming bytes included.
    /// Zero means unlimited. Exceeding it fails the connection with 1009.
    pub max_frame_size: usize,
}

/// Fragmented-message state, tracked independently per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fragmented {
    None,
    Text,
    Binary,
}

/// A user-observable outcome, queued until delegates are set and the lock is
/// free.
enum Event {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close { code: u16, reason: String },
}

/// A WebSocket endpoint over an already-upgraded byte stream.
///
/// Created inert; becomes open when [`finish_open_as_client`] or
/// [`open_as_server`] succeeds; terminal once the close handshake completes
/// or the transport breaks. Public operations on a terminal or unopened
/// endpoint are no-ops.
///
/// Handles are cheap to clone and share one endpoint. The transport's
/// callbacks hold only weak references, so dropping every handle cancels
/// delivery safely.
///
/// [`finish_open_as_client`]: WebSocket::finish_open_as_client
/// [`open_as_server`]: WebSocket::open_as_server
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket").finish_non_exhaustive()
    }
}

struct Inner {
    configuration: Configuration,
    transport: Option<Arc<dyn Transport>>,
    role: Role,
    /// Base64 nonce sent as Sec-WebSocket-Key (client) or received (server).
    key: String,
    close_sent: bool,
    close_received: bool,
    sending: Fragmented,
    receiving: Fragmented,
    delegates: Option<Arc<dyn WebSocketHandler>>,
    event_queue: VecDeque<Event>,
    /// Received bytes not yet parceled into frames.
    frame_buffer: BytesMut,
    /// Payloads of a fragmented message being reassembled.
    message_buffer: Vec<u8>,
}

impl Default for WebSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocket {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                configuration: Configuration::default(),
                transport: None,
                role: Role::Client,
                key: String::new(),
                close_sent: false,
                close_received: false,
                sending: Fragmented::None,
                receiving: Fragmented::None,
                delegates: None,
                event_queue: VecDeque::new(),
                frame_buffer: BytesMut::new(),
                message_buffer: Vec::new(),
            })),
        }
    }

    /// Overwrite the configuration. Safe at any time.
    pub fn configure(&self, configuration: Configuration) {
        self.inner.lock().unwrap().configuration = configuration;
    }

    /// Populate the opening-handshake headers of `request` and remember the
    /// generated key. Follow up with [`finish_open_as_client`] once the
    /// response arrives.
    ///
    /// [`finish_open_as_client`]: WebSocket::finish_open_as_client
    pub fn start_open_as_client(&self, request: &mut Request) {
        let mut inner = self.inner.lock().unwrap();
        inner.key = handshake::start_client(request);
    }

    /// Validate the server's handshake response. On success the endpoint
    /// binds `transport` in the client role and returns true; on failure
    /// nothing is bound and false is returned.
    pub fn finish_open_as_client(
        &self,
        transport: Arc<dyn Transport>,
        response: &Response,
    ) -> bool {
        let key = self.inner.lock().unwrap().key.clone();
        if !handshake::validate_client_response(response, &key) {
            return false;
        }
        self.open(transport, Role::Client);
        true
    }

    /// Validate a client's upgrade request. On success `response` becomes the
    /// 101 the caller must write out, the endpoint binds `transport` in the
    /// server role, and true is returned. `trailer` is whatever arrived after
    /// the request head; it must be empty (pipelined bytes cannot be
    /// attributed to the WebSocket stream).
    pub fn open_as_server(
        &self,
        transport: Arc<dyn Transport>,
        request: &Request,
        response: &mut Response,
        trailer: &[u8],
    ) -> bool {
        let Some(key) = handshake::accept_server_request(request, response, trailer) else {
            return false;
        };
        self.inner.lock().unwrap().key = key;
        self.open(transport, Role::Server);
        true
    }

    /// Send a ping. Ignored when not open, once a close was sent or
    /// received, or when the payload exceeds the 125-byte control-frame cap.
    pub fn ping(&self, data: &[u8]) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transport.is_none() || inner.close_sent || inner.close_received {
                return;
            }
            if data.len() > MAX_CONTROL_PAYLOAD {
                return;
            }
            inner.send_frame(true, OP_PING, data);
        }
        dispatch_events(&self.inner);
    }

    /// Send an unsolicited pong. Same preconditions as [`ping`](WebSocket::ping).
    pub fn pong(&self, data: &[u8]) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transport.is_none() || inner.close_sent || inner.close_received {
                return;
            }
            if data.len() > MAX_CONTROL_PAYLOAD {
                return;
            }
            inner.send_frame(true, OP_PONG, data);
        }
        dispatch_events(&self.inner);
    }

    /// Send a text message or fragment. The first fragment opens a text
    /// sequence; further calls continue it until one passes
    /// `last_fragment = true`. Ignored when not open, once a close was sent
    /// or received, or while a binary fragment sequence is in progress.
    pub fn send_text(&self, data: &str, last_fragment: bool) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transport.is_none() || inner.close_sent || inner.close_received {
                return;
            }
            if inner.sending == Fragmented::Binary {
                return;
            }
            let opcode = if inner.sending == Fragmented::Text {
                OP_CONTINUATION
            } else {
                OP_TEXT
            };
            inner.send_frame(last_fragment, opcode, data.as_bytes());
            inner.sending = if last_fragment {
                Fragmented::None
            } else {
                Fragmented::Text
            };
        }
        dispatch_events(&self.inner);
    }

    /// Send a binary message or fragment. Mirror of [`send_text`](WebSocket::send_text).
    pub fn send_binary(&self, data: &[u8], last_fragment: bool) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transport.is_none() || inner.close_sent || inner.close_received {
                return;
            }
            if inner.sending == Fragmented::Text {
                return;
            }
            let opcode = if inner.sending == Fragmented::Binary {
                OP_CONTINUATION
            } else {
                OP_BINARY
            };
            inner.send_frame(last_fragment, opcode, data);
            inner.sending = if last_fragment {
                Fragmented::None
            } else {
                Fragmented::Binary
            };
        }
        dispatch_events(&self.inner);
    }

    /// Initiate the closing handshake with the given status code and reason.
    /// Further sends are ignored; the transport closes once the peer's close
    /// frame arrives (or has already arrived).
    pub fn close(&self, code: u16, reason: &str) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.transport.is_none() {
                return;
            }
            inner.close(code, reason, false);
        }
        dispatch_events(&self.inner);
    }

    /// Install the delegates and flush any events queued before this call.
    pub fn set_delegates(&self, delegates: Arc<dyn WebSocketHandler>) {
        self.inner.lock().unwrap().delegates = Some(delegates);
        dispatch_events(&self.inner);
    }

    /// Bind the transport and hook its delegates up to the engine. The
    /// closures hold a weak reference so a dropped endpoint cancels
    /// delivery.
    fn open(&self, transport: Arc<dyn Transport>, role: Role) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.transport = Some(transport.clone());
            inner.role = role;
        }
        let weak = Arc::downgrade(&self.inner);
        transport.set_data_received_delegate(Box::new(move |data| {
            if let Some(inner) = weak.upgrade() {
                inner.lock().unwrap().receive_data(data);
                dispatch_events(&inner);
            }
        }));
        let weak = Arc::downgrade(&self.inner);
        transport.set_broken_delegate(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().unwrap().connection_broken();
                dispatch_events(&inner);
            }
        }));
    }
}

/// Drain the event queue and deliver, outside the lock. The delegates and
/// the queued events are snapshotted under the lock, then the lock is
/// released before any user code runs; a delegate that re-enters the
/// endpoint therefore cannot deadlock. Events stay queued until delegates
/// are set.
fn dispatch_events(inner: &Arc<Mutex<Inner>>) {
    let (delegates, events) = {
        let mut guard = inner.lock().unwrap();
        let Some(delegates) = guard.delegates.clone() else {
            return;
        };
        (delegates, std::mem::take(&mut guard.event_queue))
    };
    for event in events {
        match event {
            Event::Text(message) => delegates.text(message),
            Event::Binary(message) => delegates.binary(message),
            Event::Ping(data) => delegates.ping(data),
            Event::Pong(data) => delegates.pong(data),
            Event::Close { code, reason } => delegates.close(code, reason),
        }
    }
}

impl Inner {
    fn peer_id(&self) -> String {
        self.transport
            .as_ref()
            .map(|t| t.peer_id())
            .unwrap_or_default()
    }

    /// Construct and emit one frame, masking when in the client role.
    fn send_frame(&mut self, fin: bool, opcode: u8, payload: &[u8]) {
        let mask_key = match self.role {
            Role::Client => Some(mask::generate_key()),
            Role::Server => None,
        };
        let mut out = BytesMut::new();
        frame::encode_frame(fin, opcode, payload, mask_key, &mut out);
        if let Some(transport) = &self.transport {
            transport.send_bytes(&out);
        }
    }

    /// Initiate the close sequence. 1006 (abnormal closure) is never put on
    /// the wire: that path reports the close locally and leaves the
    /// transport to its fate. With `fail` set the close is also reported
    /// locally right away instead of waiting for the peer's close frame.
    fn close(&mut self, code: u16, reason: &str, fail: bool) {
        if self.close_sent {
            return;
        }
        self.close_sent = true;
        if code == 1006 {
            self.on_close(code, reason.to_string());
        } else {
            let mut payload = Vec::new();
            if code != 1005 {
                payload.extend_from_slice(&code.to_be_bytes());
                payload.extend_from_slice(reason.as_bytes());
            }
            self.send_frame(true, OP_CLOSE, &payload);
            if fail {
                log::debug!("failing connection to {}: {}", self.peer_id(), reason);
                self.on_close(code, reason.to_string());
            } else if self.close_received {
                if let Some(transport) = &self.transport {
                    transport.close(true);
                }
            }
            log::info!("connection to {} closed ({})", self.peer_id(), reason);
        }
    }

    /// Record the close as observed and queue the Close event. When our own
    /// close frame went out earlier, both directions are now done and the
    /// transport is broken off.
    fn on_close(&mut self, code: u16, reason: String) {
        let close_sent_earlier = self.close_sent;
        self.close_received = true;
        self.event_queue.push_back(Event::Close { code, reason });
        if close_sent_earlier {
            if let Some(transport) = &self.transport {
                transport.close(false);
            }
        }
    }

    fn on_text_message(&mut self, message: Vec<u8>) {
        match String::from_utf8(message) {
            Ok(text) => self.event_queue.push_back(Event::Text(text)),
            Err(_) => self.close(1007, "invalid UTF-8 encoding in text message", true),
        }
    }

    fn on_binary_message(&mut self, message: Vec<u8>) {
        self.event_queue.push_back(Event::Binary(message));
    }

    /// Handle one complete frame sitting at the front of `frame_buffer`.
    /// Validation order matters: reserved bits, then masking direction, then
    /// opcode. Frames after a received close are discarded.
    fn receive_frame(&mut self, header: &FrameHeader) {
        if self.close_received {
            return;
        }
        if header.rsv != 0 {
            self.close(1002, "reserved bits set", true);
            return;
        }
        if header.masked {
            if self.role == Role::Client {
                self.close(1002, "masked frame", true);
                return;
            }
        } else if self.role == Role::Server {
            self.close(1002, "unmasked frame", true);
            return;
        }
        let start = header.header_len;
        let end = start + header.payload_len as usize;
        let mut data = self.frame_buffer[start..end].to_vec();
        if header.masked {
            mask::apply(header.masking_key(&self.frame_buffer), &mut data);
        }
        match header.opcode {
            OP_CONTINUATION => {
                self.message_buffer.extend_from_slice(&data);
                match self.receiving {
                    Fragmented::Text => {
                        if header.fin {
                            let message = std::mem::take(&mut self.message_buffer);
                            self.on_text_message(message);
                        }
                    }
                    Fragmented::Binary => {
                        if header.fin {
                            let message = std::mem::take(&mut self.message_buffer);
                            self.on_binary_message(message);
                        }
                    }
                    Fragmented::None => {
                        self.message_buffer.clear();
                        self.close(1002, "unexpected continuation frame", true);
                    }
                }
                if header.fin {
                    self.receiving = Fragmented::None;
                    self.message_buffer.clear();
                }
            }

            OP_TEXT => {
                if self.receiving == Fragmented::None {
                    if header.fin {
                        self.on_text_message(data);
                    } else {
                        self.receiving = Fragmented::Text;
                        self.message_buffer = data;
                    }
                } else {
                    self.close(1002, "last message incomplete", true);
                }
            }

            OP_BINARY => {
                if self.receiving == Fragmented::None {
                    if header.fin {
                        self.on_binary_message(data);
                    } else {
                        self.receiving = Fragmented::Binary;
                        self.message_buffer = data;
                    }
                } else {
                    self.close(1002, "last message incomplete", true);
                }
            }

            OP_CLOSE => {
                let mut code: u16 = 1005;
                let mut reason = String::new();
                let mut fail = false;
                if data.len() >= 2 {
                    code = u16::from_be_bytes([data[0], data[1]]);
                    match String::from_utf8(data.split_off(2)) {
                        Ok(text) => reason = text,
                        Err(_) => {
                            self.close(1007, "invalid UTF-8 encoding in close reason", true);
                            fail = true;
                        }
                    }
                }
                if !fail {
                    self.on_close(code, reason);
                    log::info!("connection to {} closed by peer", self.peer_id());
                }
            }

            OP_PING => {
                self.send_frame(true, OP_PONG, &data);
                self.event_queue.push_back(Event::Ping(data));
            }

            OP_PONG => {
                self.event_queue.push_back(Event::Pong(data));
            }

            _ => {
                self.close(1002, "unknown opcode", true);
            }
        }
    }

    /// Accumulate received bytes and consume as many complete frames as they
    /// yield. Chunk boundaries are immaterial: a frame is handled exactly
    /// when its last byte arrives, whatever the chunking.
    fn receive_data(&mut self, data: &[u8]) {
        if self.transport.is_none() {
            return;
        }
        if self.configuration.max_frame_size > 0
            && self.frame_buffer.len() + data.len() > self.configuration.max_frame_size
        {
            self.close(1009, "frame too large", true);
            return;
        }
        self.frame_buffer.extend_from_slice(data);
        loop {
            let Some(header) = frame::parse_header(&self.frame_buffer) else {
                return;
            };
            if (self.frame_buffer.len() as u64) < header.frame_len() {
                return;
            }
            self.receive_frame(&header);
            self.frame_buffer.advance(header.frame_len() as usize);
        }
    }

    fn connection_broken(&mut self) {
        if self.transport.is_none() {
            return;
        }
        self.close(1006, "connection broken by peer", true);
        log::info!("connection to {} broken by peer", self.peer_id());
    }
}

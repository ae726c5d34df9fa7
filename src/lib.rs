/*
 * lib.rs
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

//! WebSocket endpoint (RFC 6455, protocol version 13).
//!
//! The center of the crate is [`WebSocket`]: a passive protocol engine that
//! multiplexes one already-upgraded byte stream into a message-oriented
//! channel (text, binary, ping, pong, close). It is driven entirely from the
//! outside — application threads call the public operations, the transport
//! delivers received bytes and break notification through delegates — and it
//! never blocks on I/O itself.
//!
//! Design:
//! - Callback-based event API: install a [`WebSocketHandler`]; events queue
//!   until one is set and are always delivered outside the endpoint lock, so
//!   a handler may call back into the endpoint freely.
//! - The transport is a collaborator behind the [`Transport`] trait. Any
//!   reliable ordered stream works; [`net::TokioTransport`] adapts a tokio
//!   TCP or TLS stream, and [`WebSocketClient`] performs the whole ws://
//!   or wss:// opening handshake on top of it.
//! - Buffers: the `bytes` crate (`BytesMut` accumulation, push-style frame
//!   header parse). Handshake hashing: `sha1` + standard `base64`.
//!
//! Servers embed the other way around: parse the upgrade request with your
//! HTTP stack (or [`http::Request::parse_head`]), then call
//! [`WebSocket::open_as_server`] with the request, a response to fill in,
//! and any bytes that followed the request head.

pub mod client;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod http;
pub mod mask;
pub mod net;
pub mod transport;

mod endpoint;

pub use client::WebSocketClient;
pub use endpoint::{Configuration, Role, WebSocket};
pub use handler::WebSocketHandler;
pub use transport::{BrokenDelegate, DataReceivedDelegate, Transport};

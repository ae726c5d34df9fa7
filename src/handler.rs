/*
 * handler.rs
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

//! WebSocket delegate trait. Every method has a no-op default, so a handler
//! implements only the events it cares about; the rest are dropped.

/// Handler for WebSocket events. Installed with
/// [`WebSocket::set_delegates`](crate::WebSocket::set_delegates); events that
/// arrive earlier queue up and are flushed on installation.
///
/// Methods are invoked outside the endpoint lock, one dispatch at a time, in
/// the order the triggering frames arrived. A handler may call back into the
/// endpoint (for example, answer a text message from inside [`text`]) without
/// deadlocking.
///
/// [`text`]: WebSocketHandler::text
pub trait WebSocketHandler: Send + Sync {
    /// A complete text message was received (UTF-8 already validated).
    fn text(&self, message: String) {
        let _ = message;
    }

    /// A complete binary message was received.
    fn binary(&self, message: Vec<u8>) {
        let _ = message;
    }

    /// A ping arrived. The endpoint has already echoed a pong with the same
    /// payload; this is informational.
    fn ping(&self, data: Vec<u8>) {
        let _ = data;
    }

    /// A pong arrived.
    fn pong(&self, data: Vec<u8>) {
        let _ = data;
    }

    /// The WebSocket closed. `code` is 1005 when the peer's close frame
    /// carried no status, 1006 when the connection failed without one.
    fn close(&self, code: u16, reason: String) {
        let _ = (code, reason);
    }
}

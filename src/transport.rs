/*
 * transport.rs
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

//! Transport collaborator contract. The endpoint consumes an
//! already-upgraded reliable, ordered byte stream through this trait and
//! never performs I/O itself.

/// Callback invoked with bytes received from the peer.
pub type DataReceivedDelegate = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Callback invoked when the stream breaks.
pub type BrokenDelegate = Box<dyn Fn() + Send + Sync>;

/// A reliable, ordered byte stream carrying WebSocket frames.
///
/// `send_bytes` must not block the caller: implementations enqueue the bytes
/// for in-order delivery. Delegates are invoked at most one at a time, from
/// whatever thread or task the implementation uses; the endpoint installs
/// delegates that hold only weak references to its state, so a dropped
/// endpoint turns delivery into a no-op.
pub trait Transport: Send + Sync {
    /// Enqueue `data` for in-order delivery to the peer.
    fn send_bytes(&self, data: &[u8]);

    /// Terminate the stream. `clean` requests a graceful close (TCP FIN or
    /// TLS close_notify) after pending writes; otherwise the stream is torn
    /// down abruptly.
    fn close(&self, clean: bool);

    /// Identity of the peer, used only in diagnostics.
    fn peer_id(&self) -> String;

    /// Install the callback for received bytes, replacing any earlier one.
    fn set_data_received_delegate(&self, delegate: DataReceivedDelegate);

    /// Install the callback for stream breakage, replacing any earlier one.
    fn set_broken_delegate(&self, delegate: BrokenDelegate);
}

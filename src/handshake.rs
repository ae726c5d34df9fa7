/*
 * handshake.rs
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

//! WebSocket opening handshake (RFC 6455 §4): key generation, the
//! Sec-WebSocket-Accept computation, and validation of both sides of the
//! upgrade. Works on [`Request`]/[`Response`] heads; the endpoint facade
//! decides when a successful validation actually opens the connection.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::http::{Request, Response};

/// Magic string appended to Sec-WebSocket-Key before hashing (RFC 6455 §4.2.2).
const WS_ACCEPT_MAGIC: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The protocol version this library speaks.
const SUPPORTED_VERSION: &str = "13";

/// Required length of the Base64-decoded Sec-WebSocket-Key.
const KEY_LENGTH: usize = 16;

/// Compute the Sec-WebSocket-Accept value matching `key`:
/// `Base64(SHA1(key || magic))`, standard alphabet, no wrapping.
pub fn compute_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_ACCEPT_MAGIC);
    BASE64.encode(hasher.finalize())
}

/// Generate a Sec-WebSocket-Key: Base64 of a fresh 16-byte nonce.
pub fn generate_key() -> String {
    let nonce: [u8; 16] = rand::random();
    BASE64.encode(nonce)
}

/// Populate the upgrade request a client sends, returning the generated key
/// so the caller can verify the response later. Any Connection tokens the
/// caller already set are kept.
pub fn start_client(request: &mut Request) -> String {
    request
        .headers
        .set("Sec-WebSocket-Version", SUPPORTED_VERSION);
    let key = generate_key();
    request.headers.set("Sec-WebSocket-Key", key.clone());
    request.headers.set("Upgrade", "websocket");
    request.headers.add_token("Connection", "upgrade");
    key
}

/// Validate the server's handshake response against the key we sent.
/// Extensions and subprotocols are not negotiated, so a response selecting
/// either is refused.
pub fn validate_client_response(response: &Response, key: &str) -> bool {
    if response.code != 101 {
        return false;
    }
    if !response.headers.has_token("Connection", "upgrade") {
        return false;
    }
    if !response
        .headers
        .get("Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    {
        return false;
    }
    if response.headers.get("Sec-WebSocket-Accept") != Some(compute_accept(key).as_str()) {
        return false;
    }
    if !response.headers.tokens("Sec-WebSocket-Extensions").is_empty() {
        return false;
    }
    if !response.headers.tokens("Sec-WebSocket-Protocol").is_empty() {
        return false;
    }
    true
}

/// Validate a client's upgrade request as the server. On success the
/// response is turned into a 101 with the accept header and the client's key
/// is returned. On failure the response is left alone for plain
/// non-WebSocket requests, or set to 400 Bad Request where the request was a
/// recognizable but malformed upgrade. `trailer` is whatever arrived after
/// the request head; a WebSocket upgrade must not pipeline data.
pub fn accept_server_request(
    request: &Request,
    response: &mut Response,
    trailer: &[u8],
) -> Option<String> {
    if request.method != "GET" {
        return None;
    }
    if !request.headers.has_token("Connection", "upgrade") {
        return None;
    }
    if !request
        .headers
        .get("Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    {
        return None;
    }
    if request.headers.get("Sec-WebSocket-Version") != Some(SUPPORTED_VERSION) {
        set_bad_request(response);
        return None;
    }
    if !trailer.is_empty() {
        set_bad_request(response);
        return None;
    }
    let key = request.headers.get("Sec-WebSocket-Key").unwrap_or("");
    let decoded_len = BASE64.decode(key).map(|d| d.len()).unwrap_or(0);
    if decoded_len != KEY_LENGTH {
        set_bad_request(response);
        return None;
    }
    response.code = 101;
    response.reason = "Switching Protocols".to_string();
    response.headers.add_token("Connection", "upgrade");
    response.headers.set("Upgrade", "websocket");
    response
        .headers
        .set("Sec-WebSocket-Accept", compute_accept(key));
    Some(key.to_string())
}

fn set_bad_request(response: &mut Response) {
    response.code = 400;
    response.reason = "Bad Request".to_string();
}

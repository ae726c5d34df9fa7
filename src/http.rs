/*
 * http.rs
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

//! Minimal HTTP/1.1 message objects for the opening handshake: header
//! collection with token-list operations, request/response heads with
//! serialize and parse. Bodies are out of scope; a WebSocket upgrade never
//! carries one.
//!
//! Header names compare case-insensitively; token matches (`Connection:
//! keep-alive, Upgrade`) are case-insensitive per RFC 9110 too.

use std::io;

/// Ordered header collection. Lookups are case-insensitive on the name;
/// insertion order is preserved for serialization.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `name` with a single one (appends when absent).
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.entries.push((name.to_string(), value));
    }

    /// All comma-separated tokens of every `name` header, trimmed and
    /// lowercased. Empty when the header is absent or has no tokens.
    pub fn tokens(&self, name: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for (n, v) in &self.entries {
            if n.eq_ignore_ascii_case(name) {
                for token in v.split(',') {
                    let token = token.trim();
                    if !token.is_empty() {
                        tokens.push(token.to_ascii_lowercase());
                    }
                }
            }
        }
        tokens
    }

    /// Whether any `name` header carries `token` (case-insensitive).
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.tokens(name)
            .iter()
            .any(|t| t.eq_ignore_ascii_case(token))
    }

    /// Append `token` to the `name` token list, keeping the tokens already
    /// present.
    pub fn add_token(&mut self, name: &str, token: &str) {
        let mut tokens = self.tokens(name);
        tokens.push(token.to_ascii_lowercase());
        self.set(name, tokens.join(", "));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
    }
}

/// HTTP request head: method, target, headers.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub headers: Headers,
}

impl Request {
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            headers: Headers::new(),
        }
    }

    /// Serialize the request head, final CRLF included.
    pub fn serialize_head(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(b" HTTP/1.1\r\n");
        self.headers.write_to(&mut out);
        out
    }

    /// Parse a request head from the front of `buf`. Returns the request and
    /// the number of bytes consumed (bytes past that point belong to whatever
    /// follows the head), or None when the blank line has not arrived yet.
    pub fn parse_head(buf: &[u8]) -> io::Result<Option<(Request, usize)>> {
        let Some(head_len) = find_head_end(buf) else {
            return Ok(None);
        };
        let head = std::str::from_utf8(&buf[..head_len])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid head UTF-8"))?;
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or("");
        let mut parts = request_line.splitn(3, ' ');
        let method = parts
            .next()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing method"))?;
        let target = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing target"))?;
        let mut request = Request::new(method, target);
        parse_header_lines(lines, &mut request.headers)?;
        Ok(Some((request, head_len + 4)))
    }
}

/// HTTP response head: status code, reason phrase, headers.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub reason: String,
    pub headers: Headers,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            code: 200,
            reason: "OK".to_string(),
            headers: Headers::new(),
        }
    }
}

impl Response {
    /// Serialize the response head, final CRLF included.
    pub fn serialize_head(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.code.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.reason.as_bytes());
        out.extend_from_slice(b"\r\n");
        self.headers.write_to(&mut out);
        out
    }

    /// Parse a response head from the front of `buf`. Same contract as
    /// [`Request::parse_head`].
    pub fn parse_head(buf: &[u8]) -> io::Result<Option<(Response, usize)>> {
        let Some(head_len) = find_head_end(buf) else {
            return Ok(None);
        };
        let head = std::str::from_utf8(&buf[..head_len])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid head UTF-8"))?;
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or("");
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing HTTP version",
            ));
        }
        let code = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing status code"))?;
        let reason = parts.next().unwrap_or("").to_string();
        let mut response = Response {
            code,
            reason,
            headers: Headers::new(),
        };
        parse_header_lines(lines, &mut response.headers)?;
        Ok(Some((response, head_len + 4)))
    }
}

/// Offset of the blank line terminating the head, or None if not yet present.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    headers: &mut Headers,
) -> io::Result<()> {
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let colon = line
            .find(':')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed header line"))?;
        let name = line[..colon].trim();
        let value = line[colon + 1..].trim();
        headers.set(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_compare_case_insensitively() {
        let mut headers = Headers::new();
        headers.set("Upgrade", "websocket");
        assert_eq!(headers.get("upgrade"), Some("websocket"));
        assert_eq!(headers.get("UPGRADE"), Some("websocket"));
        assert_eq!(headers.get("Connection"), None);
    }

    #[test]
    fn token_list_matching() {
        let mut headers = Headers::new();
        headers.set("Connection", "keep-alive, Upgrade");
        assert!(headers.has_token("Connection", "upgrade"));
        assert!(headers.has_token("connection", "Keep-Alive"));
        assert!(!headers.has_token("Connection", "close"));
        assert_eq!(headers.tokens("Connection"), vec!["keep-alive", "upgrade"]);
    }

    #[test]
    fn absent_header_has_no_tokens() {
        let headers = Headers::new();
        assert!(headers.tokens("Sec-WebSocket-Extensions").is_empty());
    }

    #[test]
    fn add_token_preserves_existing() {
        let mut headers = Headers::new();
        headers.add_token("Connection", "upgrade");
        assert_eq!(headers.get("Connection"), Some("upgrade"));
        headers.set("Connection", "keep-alive");
        headers.add_token("Connection", "upgrade");
        assert_eq!(headers.get("Connection"), Some("keep-alive, upgrade"));
    }

    #[test]
    fn request_head_round_trips() {
        let mut request = Request::new("GET", "/chat");
        request.headers.set("Host", "example.com");
        request.headers.set("Upgrade", "websocket");
        let mut bytes = request.serialize_head();
        bytes.extend_from_slice(b"\x81\x00");
        let (parsed, consumed) = Request::parse_head(&bytes).unwrap().unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.target, "/chat");
        assert_eq!(parsed.headers.get("host"), Some("example.com"));
        assert_eq!(&bytes[consumed..], b"\x81\x00");
    }

    #[test]
    fn response_head_round_trips() {
        let mut response = Response {
            code: 101,
            reason: "Switching Protocols".to_string(),
            headers: Headers::new(),
        };
        response.headers.set("Upgrade", "websocket");
        let bytes = response.serialize_head();
        let (parsed, consumed) = Response::parse_head(&bytes).unwrap().unwrap();
        assert_eq!(parsed.code, 101);
        assert_eq!(parsed.reason, "Switching Protocols");
        assert_eq!(parsed.headers.get("Upgrade"), Some("websocket"));
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn incomplete_head_returns_none() {
        assert!(Request::parse_head(b"GET / HTTP/1.1\r\nHost: x\r\n")
            .unwrap()
            .is_none());
        assert!(Response::parse_head(b"HTTP/1.1 101").unwrap().is_none());
    }

    #[test]
    fn garbage_status_line_is_an_error() {
        assert!(Response::parse_head(b"junk\r\n\r\n").is_err());
    }
}

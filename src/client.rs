/*
 * client.rs
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

//! WebSocket client: connect to a ws:// or wss:// URL, perform the opening
//! handshake, and return an open [`WebSocket`] endpoint bound to a
//! [`TokioTransport`].

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use url::Url;

use crate::endpoint::WebSocket;
use crate::http::{Request, Response};
use crate::net::{default_connector, NetStream, TokioTransport};

/// WebSocket client. Connect with `WebSocketClient::connect(url)`.
pub struct WebSocketClient;

impl WebSocketClient {
    /// Connect to the given WebSocket URL (ws:// or wss://), perform the
    /// opening handshake, and return the open endpoint. Install delegates
    /// with [`WebSocket::set_delegates`]; any messages that raced ahead are
    /// queued and flushed at that point.
    pub async fn connect(url: &str) -> io::Result<WebSocket> {
        let url = Url::parse(url)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "URL scheme must be ws or wss",
            ));
        }
        let use_tls = url.scheme() == "wss";
        let host = url
            .host_str()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "URL has no host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "URL has no port"))?;
        let mut target = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let peer = format!("{}:{}", host, port);
        let tcp = TcpStream::connect(&peer).await?;
        let mut stream = if use_tls {
            let server_name: ServerName<'static> = ServerName::try_from(host.clone())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
            let tls = default_connector()
                .connect(server_name, tcp)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
            NetStream::Tls(tls)
        } else {
            NetStream::Plain(tcp)
        };

        let host_header = if port == 80 || port == 443 {
            host.clone()
        } else {
            peer.clone()
        };
        let mut request = Request::new("GET", &target);
        request.headers.set("Host", host_header);
        let endpoint = WebSocket::new();
        endpoint.start_open_as_client(&mut request);
        stream.write_all(&request.serialize_head()).await?;
        stream.flush().await?;

        // Read until the response head is complete. Bytes past it are the
        // first WebSocket frames; they go to the transport once it starts.
        let mut read_buf = BytesMut::with_capacity(4096);
        let (response, leftover) = loop {
            if let Some((response, consumed)) = Response::parse_head(&read_buf)? {
                break (response, read_buf[consumed..].to_vec());
            }
            let mut tmp = [0u8; 4096];
            let n = stream.read(&mut tmp).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during handshake",
                ));
            }
            read_buf.extend_from_slice(&tmp[..n]);
        };

        let transport = TokioTransport::new(stream, peer);
        if !endpoint.finish_open_as_client(transport.clone(), &response) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "WebSocket handshake refused by server",
            ));
        }
        transport.start(leftover);
        Ok(endpoint)
    }
}

/*
 * net.rs
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

//! Tokio-backed transport: plain TCP or rustls TLS stream behind the
//! [`Transport`] trait. The stream is split into a reader task (delivers
//! received bytes to the endpoint's delegate) and a writer task (drains a
//! send queue), so `send_bytes` never blocks the caller.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::transport::{BrokenDelegate, DataReceivedDelegate, Transport};

/// Build a root certificate store: platform native certs first, then
/// webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// TLS client config for wss:// (native + Mozilla roots, no client auth,
/// ALPN pinned to http/1.1 — the upgrade does not survive h2).
pub fn tls_client_config() -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

static DEFAULT_CONNECTOR: std::sync::OnceLock<TlsConnector> = std::sync::OnceLock::new();

pub(crate) fn default_connector() -> &'static TlsConnector {
    DEFAULT_CONNECTOR.get_or_init(|| TlsConnector::from(tls_client_config()))
}

/// Async byte stream, plain or TLS.
pub enum NetStream {
    Plain(TcpStream),
    Tls(TokioTlsStream<TcpStream>),
}

impl AsyncRead for NetStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            NetStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            NetStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_flush(cx),
            NetStream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            NetStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            NetStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

enum Command {
    Send(Vec<u8>),
    Close { clean: bool },
}

/// [`Transport`] over a [`NetStream`]. Create with [`TokioTransport::new`]
/// inside a tokio runtime, bind it to an endpoint, then call
/// [`start`](TokioTransport::start) to begin delivering received bytes.
pub struct TokioTransport {
    peer: String,
    commands: mpsc::UnboundedSender<Command>,
    read_half: Mutex<Option<ReadHalf<NetStream>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    data_received: Mutex<Option<Arc<dyn Fn(&[u8]) + Send + Sync>>>,
    broken: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl TokioTransport {
    /// Wrap `stream`. The writer task starts immediately; reading is held
    /// back until [`start`](TokioTransport::start) so delegates can be
    /// installed first.
    pub fn new(stream: NetStream, peer: String) -> Arc<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::write_loop(write_half, rx));
        Arc::new(Self {
            peer,
            commands: tx,
            read_half: Mutex::new(Some(read_half)),
            reader: Mutex::new(None),
            data_received: Mutex::new(None),
            broken: Mutex::new(None),
        })
    }

    /// Begin the read loop. `initial` is whatever the caller already read
    /// past the handshake; it is delivered through the data delegate before
    /// the first read. Calling twice is a no-op.
    pub fn start(self: &Arc<Self>, initial: Vec<u8>) {
        let Some(mut read_half) = self.read_half.lock().unwrap().take() else {
            return;
        };
        let transport = self.clone();
        let handle = tokio::spawn(async move {
            if !initial.is_empty() {
                transport.deliver(&initial);
            }
            let mut buf = [0u8; 8192];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) | Err(_) => {
                        transport.notify_broken();
                        return;
                    }
                    Ok(n) => transport.deliver(&buf[..n]),
                }
            }
        });
        *self.reader.lock().unwrap() = Some(handle);
    }

    async fn write_loop(
        mut write_half: WriteHalf<NetStream>,
        mut rx: mpsc::UnboundedReceiver<Command>,
    ) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Send(data) => {
                    if write_half.write_all(&data).await.is_err() {
                        return;
                    }
                    if write_half.flush().await.is_err() {
                        return;
                    }
                }
                Command::Close { clean } => {
                    if clean {
                        let _ = write_half.shutdown().await;
                    }
                    return;
                }
            }
        }
        // Transport dropped: flush out with a graceful shutdown.
        let _ = write_half.shutdown().await;
    }

    fn deliver(&self, data: &[u8]) {
        let delegate = self.data_received.lock().unwrap().clone();
        if let Some(delegate) = delegate {
            delegate(data);
        }
    }

    fn notify_broken(&self) {
        let delegate = self.broken.lock().unwrap().clone();
        if let Some(delegate) = delegate {
            delegate();
        }
    }
}

impl Transport for TokioTransport {
    fn send_bytes(&self, data: &[u8]) {
        let _ = self.commands.send(Command::Send(data.to_vec()));
    }

    fn close(&self, clean: bool) {
        let _ = self.commands.send(Command::Close { clean });
        if !clean {
            // Abrupt break: stop delivering too.
            if let Some(handle) = self.reader.lock().unwrap().take() {
                handle.abort();
            }
        }
    }

    fn peer_id(&self) -> String {
        self.peer.clone()
    }

    fn set_data_received_delegate(&self, delegate: DataReceivedDelegate) {
        *self.data_received.lock().unwrap() = Some(Arc::from(delegate));
    }

    fn set_broken_delegate(&self, delegate: BrokenDelegate) {
        *self.broken.lock().unwrap() = Some(Arc::from(delegate));
    }
}

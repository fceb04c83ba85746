/*
 * connection.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of urlloader, a callback-based URL loading library.
 *
 * urlloader is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * urlloader is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with urlloader.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP connection: one TCP or TLS stream carrying exactly one request/response exchange.
//! Drives the H1 parser and forwards events to a `ResponseHandler`.

use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;

use crate::config::LoaderConfig;
use crate::net::upgrade_to_tls;
use crate::protocol::http::h1::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{check_header, Method, Request};
use crate::protocol::http::response::{ExpectedLength, ResponseInfo};
use crate::protocol::http::ResponseHandler;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Collects the response head from the parser and forwards body events to the handler.
struct H1Driver<'a> {
    status: &'a mut Option<(u16, Option<String>)>,
    headers: &'a mut Vec<(String, String)>,
    handler: &'a mut (dyn ResponseHandler + Send),
    completed: &'a mut bool,
}

impl H1ResponseHandler for H1Driver<'_> {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        *self.status = Some((code, reason.map(|s| s.to_string())));
        self.headers.clear();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.handler.body_chunk(data);
    }

    fn complete(&mut self) {
        *self.completed = true;
        self.handler.complete();
    }
}

/// HTTP/1.1 connection for a single exchange. Open with `HttpConnection::open`, then `send`.
pub struct HttpConnection {
    stream: HttpStream,
    host: String,
    port: u16,
    secure: bool,
    read_timeout: Option<Duration>,
    read_buffer_size: usize,
    user_agent: String,
    read_buf: BytesMut,
    parser: ResponseParser,
    status: Option<(u16, Option<String>)>,
    headers: Vec<(String, String)>,
}

impl HttpConnection {
    /// Connect to the request's host and port; TLS handshake for `https`.
    pub async fn open(request: &Request, config: &LoaderConfig) -> io::Result<Self> {
        let host = request.host().to_string();
        let port = request.port();
        let addr = format!("{}:{}", host, port);
        log::debug!("connecting to {}", addr);
        let tcp = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))??;
        if let Err(e) = tcp.set_nodelay(true) {
            log::trace!("TCP_NODELAY not set on {}: {}", addr, e);
        }

        let stream = if request.is_secure() {
            let tls = timeout(config.connect_timeout, upgrade_to_tls(tcp, &host))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
            HttpStream::Tls(Box::new(tls))
        } else {
            HttpStream::Plain(tcp)
        };
        Ok(Self::new(stream, host, port, request.is_secure(), config))
    }

    pub fn new(
        stream: HttpStream,
        host: String,
        port: u16,
        secure: bool,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            stream,
            host,
            port,
            secure,
            read_timeout: config.read_timeout,
            read_buffer_size: config.read_buffer_size,
            user_agent: config.user_agent.clone(),
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            parser: ResponseParser::new(),
            status: None,
            headers: Vec::new(),
        }
    }

    /// Send the request and run the read loop until the response is complete.
    /// The handler sees `response`, `body_chunk`s and `complete`; errors are returned, not
    /// reported through the handler.
    pub async fn send(
        &mut self,
        request: &Request,
        handler: &mut (dyn ResponseHandler + Send),
    ) -> io::Result<()> {
        self.status = None;
        self.headers.clear();
        self.parser.reset();

        self.write_request(request).await?;

        let mut completed = false;
        let mut tmp = vec![0u8; self.read_buffer_size];
        loop {
            let n = self.read_some(&mut tmp).await?;
            if n == 0 {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                    completed: &mut completed,
                };
                return self.parser.finish_at_eof(&mut driver);
            }
            self.read_buf.extend_from_slice(&tmp[..n]);
            self.drain(request, handler, &mut completed)?;
            if completed {
                return Ok(());
            }
        }
    }

    async fn read_some(&mut self, tmp: &mut [u8]) -> io::Result<usize> {
        match self.read_timeout {
            Some(limit) => timeout(limit, self.stream.read(tmp))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "HTTP read timed out"))?,
            None => self.stream.read(tmp).await,
        }
    }

    /// Parse everything currently buffered, handling any response heads that complete.
    fn drain(
        &mut self,
        request: &Request,
        handler: &mut (dyn ResponseHandler + Send),
        completed: &mut bool,
    ) -> io::Result<()> {
        loop {
            let mut driver = H1Driver {
                status: &mut self.status,
                headers: &mut self.headers,
                handler: &mut *handler,
                completed: &mut *completed,
            };
            self.parser.receive(&mut self.read_buf, &mut driver)?;

            if self.parser.state() != ParseState::HeadersComplete {
                return Ok(());
            }
            let (code, reason) = self.status.take().unwrap_or((0, None));
            if (100..200).contains(&code) && code != 101 {
                log::trace!("skipping interim {} response", code);
                self.parser.expect_next_head();
                continue;
            }

            let mode = body_mode(request.method(), code, &self.headers);
            let info = ResponseInfo {
                status: code,
                reason,
                headers: std::mem::take(&mut self.headers),
                expected_length: match mode {
                    BodyMode::None => ExpectedLength::Known(0),
                    BodyMode::Length(n) => ExpectedLength::Known(n),
                    BodyMode::Chunked | BodyMode::UntilClose => ExpectedLength::Unknown,
                },
                url: request.url().clone(),
            };
            log::debug!(
                "{} {} -> {} (length {})",
                request.method(),
                request.url(),
                code,
                info.expected_length
            );
            handler.response(info);

            let mut driver = H1Driver {
                status: &mut self.status,
                headers: &mut self.headers,
                handler: &mut *handler,
                completed: &mut *completed,
            };
            self.parser.set_body_mode(mode, &mut driver);
        }
    }

    async fn write_request(&mut self, request: &Request) -> io::Result<()> {
        let host_header = if (self.secure && self.port != 443) || (!self.secure && self.port != 80)
        {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        };
        let mut req = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\n",
            request.method().as_str(),
            request.target(),
            host_header
        );
        if request.get_header("user-agent").is_none() && !self.user_agent.is_empty() {
            check_header("User-Agent", &self.user_agent)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
            req.push_str("User-Agent: ");
            req.push_str(&self.user_agent);
            req.push_str("\r\n");
        }
        for (k, v) in request.headers() {
            if k.eq_ignore_ascii_case("host")
                || k.eq_ignore_ascii_case("connection")
                || k.eq_ignore_ascii_case("content-length")
                || k.eq_ignore_ascii_case("transfer-encoding")
            {
                continue;
            }
            req.push_str(k);
            req.push_str(": ");
            req.push_str(v);
            req.push_str("\r\n");
        }
        let body = request.body_bytes();
        if let Some(body) = body {
            req.push_str(&format!("Content-Length: {}\r\n", body.len()));
        } else if matches!(request.method(), Method::Post | Method::Put | Method::Patch) {
            req.push_str("Content-Length: 0\r\n");
        }
        req.push_str("Connection: close\r\n\r\n");
        self.stream.write_all(req.as_bytes()).await?;
        if let Some(body) = body {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }
}

/// Body framing per RFC 9112 section 6.3.
fn body_mode(method: Method, code: u16, headers: &[(String, String)]) -> BodyMode {
    if method == Method::Head || code == 204 || code == 304 || (100..200).contains(&code) {
        return BodyMode::None;
    }
    let chunked = headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
    });
    if chunked {
        return BodyMode::Chunked;
    }
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<u64>().ok());
    match content_length {
        Some(n) => BodyMode::Length(n),
        None => BodyMode::UntilClose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn body_mode_rules() {
        let cl = headers(&[("Content-Length", "5")]);
        assert_eq!(body_mode(Method::Get, 200, &cl), BodyMode::Length(5));
        assert_eq!(body_mode(Method::Head, 200, &cl), BodyMode::None);
        assert_eq!(body_mode(Method::Get, 304, &cl), BodyMode::None);
        assert_eq!(body_mode(Method::Get, 204, &[]), BodyMode::None);
        let te = headers(&[("Transfer-Encoding", "gzip, Chunked"), ("Content-Length", "5")]);
        assert_eq!(body_mode(Method::Get, 200, &te), BodyMode::Chunked);
        assert_eq!(body_mode(Method::Get, 200, &[]), BodyMode::UntilClose);
    }
}

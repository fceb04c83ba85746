/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or
//! read-until-close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Longest status/header/chunk-size line accepted before giving up.
const MAX_LINE: usize = 16 * 1024;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to
/// the `ResponseHandler`.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; connection must call `set_body_mode()` (or `expect_next_head()` for 1xx).
    HeadersComplete,
    Body,
    ReadToClose,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
}

/// How the body of the current response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    Length(u64),
    Chunked,
    UntilClose,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked
/// as complete tokens are parsed. Partial tokens stay in the buffer.
pub struct ResponseParser {
    state: ParseState,
    body_remaining: u64,
    chunk_remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            body_remaining: 0,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.body_remaining = 0;
        self.chunk_remaining = 0;
    }

    /// Offset of the first CRLF in buf.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Split off one CRLF-terminated line (without the CRLF). `Ok(None)` if incomplete.
    fn take_line(buf: &mut BytesMut, what: &str) -> io::Result<Option<String>> {
        let line_end = match Self::find_crlf(buf) {
            Some(n) => n,
            None if buf.len() > MAX_LINE => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} line too long", what),
                ))
            }
            None => return Ok(None),
        };
        let line = buf.split_to(line_end + 2);
        let s = std::str::from_utf8(&line[..line_end]).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid {} UTF-8", what))
        })?;
        Ok(Some(s.to_string()))
    }

    fn split_header(line: &str) -> Option<(&str, &str)> {
        let colon = line.find(':')?;
        Some((line[..colon].trim(), line[colon + 1..].trim()))
    }

    /// Consume and parse as much as possible from buf.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let line = match Self::take_line(buf, "status")? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or_default();
                    if !version.starts_with("HTTP/") {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("not an HTTP status line: {:?}", line),
                        ));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| {
                            io::Error::new(io::ErrorKind::InvalidData, "invalid status code")
                        })?;
                    let reason = parts.next().filter(|r| !r.is_empty());
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line = match Self::take_line(buf, "header")? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = Self::split_header(&line) {
                        handler.header(name, value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let to_read = (self.body_remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(to_read);
                    handler.body_chunk(&chunk);
                    self.body_remaining -= to_read as u64;
                    if self.body_remaining == 0 {
                        handler.complete();
                        self.state = ParseState::Idle;
                    }
                }
                ParseState::ReadToClose => {
                    if !buf.is_empty() {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                    }
                    // Connection close signals the end (see finish_at_eof).
                    return Ok(());
                }
                ParseState::ChunkSize => {
                    let line = match Self::take_line(buf, "chunk size")? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    let hex_part = line.split(';').next().unwrap_or(&line).trim();
                    self.chunk_remaining = u64::from_str_radix(hex_part, 16).map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("invalid chunk size {:?}", hex_part),
                        )
                    })?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let to_read = (self.chunk_remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(to_read);
                    handler.body_chunk(&chunk);
                    self.chunk_remaining -= to_read as u64;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "missing CRLF after chunk data",
                        ));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line = match Self::take_line(buf, "trailer")? {
                        Some(l) => l,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        handler.complete();
                        self.state = ParseState::Idle;
                    } else if let Some((name, value)) = Self::split_header(&line) {
                        log::trace!("ignoring trailer {}: {}", name, value);
                    }
                }
            }
        }
    }

    /// Called by the connection once headers are complete and the body framing is known.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.state = match mode {
            BodyMode::None | BodyMode::Length(0) => {
                handler.complete();
                ParseState::Idle
            }
            BodyMode::Length(n) => {
                self.body_remaining = n;
                ParseState::Body
            }
            BodyMode::Chunked => ParseState::ChunkSize,
            BodyMode::UntilClose => ParseState::ReadToClose,
        };
    }

    /// Discard an interim (1xx) response head and wait for the next status line.
    pub fn expect_next_head(&mut self) {
        if self.state == ParseState::HeadersComplete {
            self.reset();
        }
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else
    /// still in progress is an unexpected EOF.
    pub fn finish_at_eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::ReadToClose => {
                handler.complete();
                self.state = ParseState::Idle;
                Ok(())
            }
            state => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed mid-response ({:?})", state),
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        chunks: Vec<Vec<u8>>,
        completed: usize,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.chunks.push(data.to_vec());
        }
        fn complete(&mut self) {
            self.completed += 1;
        }
    }

    impl Recorder {
        fn body(&self) -> Vec<u8> {
            self.chunks.concat()
        }
    }

    #[test]
    fn content_length_body_in_pieces() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-A:  b \r\n\r\nhel"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        assert_eq!(rec.status, Some((200, Some("OK".to_string()))));
        assert_eq!(rec.headers[1], ("X-A".to_string(), "b".to_string()));

        parser.set_body_mode(BodyMode::Length(5), &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body(), b"hel");
        assert_eq!(rec.completed, 0);

        buf.extend_from_slice(b"lo");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.body(), b"hello");
        assert_eq!(rec.completed, 1);
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn chunked_body_with_extension_and_trailer() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Chunked, &mut rec);

        buf.extend_from_slice(b"3;name=val\r\nhel\r\n2\r\nlo\r\n0\r\nX-Checksum: abc\r\n\r\n");
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.chunks, vec![b"hel".to_vec(), b"lo".to_vec()]);
        assert_eq!(rec.completed, 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn chunk_split_across_reads() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Chunked, &mut rec);

        for piece in [&b"a"[..], b"\r", b"\n0123", b"456789", b"\r", b"\n0\r\n", b"\r\n"] {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut rec).unwrap();
        }
        assert_eq!(rec.body(), b"0123456789");
        assert_eq!(rec.completed, 1);
    }

    #[test]
    fn bad_chunk_size_is_an_error() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\nzz\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Chunked, &mut rec);
        let err = parser.receive(&mut buf, &mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_until_close_completes_at_eof() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::UntilClose, &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.completed, 0);
        parser.finish_at_eof(&mut rec).unwrap();
        assert_eq!(rec.body(), b"abc");
        assert_eq!(rec.completed, 1);
    }

    #[test]
    fn eof_mid_body_is_unexpected() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Length(10), &mut rec);
        parser.receive(&mut buf, &mut rec).unwrap();
        let err = parser.finish_at_eof(&mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(rec.completed, 0);
    }

    #[test]
    fn interim_response_is_discarded() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf =
            BytesMut::from(&b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status.as_ref().map(|s| s.0), Some(100));
        parser.expect_next_head();
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status.as_ref().map(|s| s.0), Some(204));
        parser.set_body_mode(BodyMode::None, &mut rec);
        assert_eq!(rec.completed, 1);
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn rejects_garbage_status_line() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }
}

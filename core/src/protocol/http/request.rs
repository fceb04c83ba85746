/*
 * request.rs
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

//! HTTP request description: target URL, method, headers, optional body.
//!
//! A `Request` is validated on construction (http/https with a host) and is otherwise an
//! opaque value handed to the fetcher.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use url::Url;

use crate::error::{LoaderError, Result};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => return Err(LoaderError::InvalidRequest(format!("unsupported method {:?}", s))),
        };
        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to load: method, URL, headers, body.
///
/// Headers keep insertion order; `header` replaces an existing header of the same name
/// (case-insensitive).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(LoaderError::InvalidRequest(format!(
                    "unsupported URL scheme {:?}",
                    other
                )))
            }
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(LoaderError::InvalidRequest(format!("URL has no host: {}", url)));
        }
        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Parse `url` and build a GET request.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, Url::parse(url)?)
    }

    pub fn parse(method: &str, url: &str) -> Result<Self> {
        Self::new(method.parse()?, Url::parse(url)?)
    }

    /// Add or replace a header. Fails with `InvalidRequest` for a name that is not an HTTP
    /// token or a value containing CR, LF or NUL; the request is left unchanged.
    pub fn header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = name.into();
        let value = value.into();
        check_header(&name, &value)?;
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        Ok(self)
    }

    pub fn body(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.body = Some(data.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Host name as it appears in the URL (IPv6 literals keep their brackets).
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port from the URL, or the scheme default.
    pub fn port(&self) -> u16 {
        self.url
            .port_or_known_default()
            .unwrap_or(if self.is_secure() { 443 } else { 80 })
    }

    /// Request-target in origin form: path plus query, never empty.
    pub fn target(&self) -> String {
        let path = self.url.path();
        let path = if path.is_empty() { "/" } else { path };
        match self.url.query() {
            Some(q) => format!("{}?{}", path, q),
            None => path.to_string(),
        }
    }
}

/// Header field check (RFC 9110 section 5): the name is a token, the value has no line
/// breaks or NUL.
pub(crate) fn check_header(name: &str, value: &str) -> Result<()> {
    let token = |b: u8| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b);
    if name.is_empty() || !name.bytes().all(token) {
        return Err(LoaderError::InvalidRequest(format!(
            "invalid header name {:?}",
            name
        )));
    }
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(LoaderError::InvalidRequest(format!(
            "invalid value for header {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let err = Request::get("ftp://example.com/file").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidRequest(_)));
        assert!(Request::get("not a url").is_err());
    }

    #[test]
    fn default_ports_and_target() {
        let req = Request::get("https://example.com/a/b?x=1&y=2#frag").unwrap();
        assert_eq!(req.port(), 443);
        assert!(req.is_secure());
        assert_eq!(req.target(), "/a/b?x=1&y=2");

        let req = Request::get("http://example.com:8080").unwrap();
        assert_eq!(req.port(), 8080);
        assert_eq!(req.target(), "/");
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let mut req = Request::get("http://example.com/").unwrap();
        req.header("Accept", "text/plain")
            .unwrap()
            .header("accept", "*/*")
            .unwrap();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.get_header("ACCEPT"), Some("*/*"));
    }

    #[test]
    fn parses_method_names() {
        let req = Request::parse("post", "http://example.com/submit").unwrap();
        assert_eq!(req.method(), Method::Post);
        assert!(Request::parse("BREW", "http://example.com/").is_err());
    }

    #[test]
    fn header_rejects_line_breaks_and_bad_names() {
        let mut req = Request::get("http://example.com/").unwrap();
        for (name, value) in [
            ("X-A", "1\r\nX-Injected: evil"),
            ("X-A", "line\nbreak"),
            ("X-A", "nul\0"),
            ("X-Bad\r\n", "v"),
            ("Two Words", "v"),
            ("Colon:", "v"),
            ("", "v"),
        ] {
            let err = req.header(name, value).unwrap_err();
            assert!(matches!(err, LoaderError::InvalidRequest(_)), "{:?}", name);
        }
        assert!(req.headers().is_empty());

        req.header("X-Trace-Id", "a b\tc; q=\"1\"").unwrap();
        assert_eq!(req.get_header("x-trace-id"), Some("a b\tc; q=\"1\""));
    }
}

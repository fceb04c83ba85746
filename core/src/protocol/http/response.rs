/*
 * response.rs
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

//! Response metadata: status, headers, declared length, encoding hint.

use std::fmt;

use url::Url;

/// Declared body length of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedLength {
    Known(u64),
    /// No Content-Length (chunked or read-until-close).
    Unknown,
}

impl ExpectedLength {
    /// From a Content-Length header value; anything unparsable counts as unknown.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(ExpectedLength::Known)
            .unwrap_or(ExpectedLength::Unknown)
    }

    pub fn as_option(&self) -> Option<u64> {
        match self {
            ExpectedLength::Known(n) => Some(*n),
            ExpectedLength::Unknown => None,
        }
    }
}

impl fmt::Display for ExpectedLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedLength::Known(n) => write!(f, "{}", n),
            ExpectedLength::Unknown => f.write_str("unknown"),
        }
    }
}

/// Response head as seen by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    pub reason: Option<String>,
    /// Headers in arrival order. Names may repeat.
    pub headers: Vec<(String, String)>,
    pub expected_length: ExpectedLength,
    pub url: Url,
}

impl ResponseInfo {
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            expected_length: ExpectedLength::Unknown,
            url,
        }
    }

    /// Add a header. Setting Content-Length also sets `expected_length`.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("content-length") {
            self.expected_length = ExpectedLength::from_header(Some(&value));
        }
        self.headers.push((name, value));
        self
    }

    /// First value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// `type/subtype` of Content-Type, lowercased, without parameters.
    pub fn mime_type(&self) -> Option<String> {
        let ct = self.content_type()?;
        let mime = ct.split(';').next().unwrap_or(ct).trim();
        if mime.is_empty() {
            None
        } else {
            Some(mime.to_ascii_lowercase())
        }
    }

    /// The `charset` parameter of Content-Type, unquoted.
    pub fn text_encoding_name(&self) -> Option<String> {
        let ct = self.content_type()?;
        ct.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            let value = value.trim().trim_matches('"').trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        })
    }
}

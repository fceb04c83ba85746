/*
 * config.rs
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

//! Loader configuration: timeouts, user agent, read buffer size.
//!
//! Built in code via `LoaderConfig::default()` and the setters, or loaded from an XML file:
//!
//! ```xml
//! <urlloader>
//!   <connect-timeout>15</connect-timeout>
//!   <read-timeout>60</read-timeout>
//!   <user-agent>MyApp/1.0</user-agent>
//!   <read-buffer-size>8192</read-buffer-size>
//! </urlloader>
//! ```
//!
//! Timeouts are in seconds; a read timeout of 0 disables it. Unknown elements are ignored.
//! All XML reading uses the quick_xml parser.

use std::fs;
use std::path::Path;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{LoaderError, Result};
use crate::protocol::http::check_header;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_READ_BUFFER_SIZE: usize = 8192;
const MIN_READ_BUFFER_SIZE: usize = 512;
const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub connect_timeout: Duration,
    /// Upper bound on a single socket read. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Sent as `User-Agent` unless the request sets its own.
    pub user_agent: String,
    pub read_buffer_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            user_agent: format!("urlloader/{}", env!("CARGO_PKG_VERSION")),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl LoaderConfig {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// A value containing CR, LF or NUL makes every fetch fail before anything is sent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Clamped to 512 bytes .. 1 MiB.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    /// Load from an XML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no loader config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(LoaderError::Config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Self::from_xml_str(&content)
    }

    /// Parse `<urlloader>...</urlloader>`. Elements that are absent keep their default value.
    pub fn from_xml_str(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut config = Self::default();
        let mut in_root = false;
        let mut element_name = Vec::<u8>::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = e.name();
                    let name = name.as_ref();
                    if name == b"urlloader" {
                        in_root = true;
                    } else if in_root {
                        element_name.clear();
                        element_name.extend_from_slice(name);
                    }
                }
                Event::Text(e) => {
                    if !in_root || element_name.is_empty() {
                        continue;
                    }
                    let text = e
                        .unescape()
                        .map_err(|e| LoaderError::Config(e.to_string()))?
                        .trim()
                        .to_string();
                    config.apply(&element_name, &text)?;
                    element_name.clear();
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"urlloader" {
                        in_root = false;
                    }
                    element_name.clear();
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(config)
    }

    fn apply(&mut self, element: &[u8], text: &str) -> Result<()> {
        match element {
            b"connect-timeout" => {
                self.connect_timeout = Duration::from_secs(parse_number(element, text)?);
            }
            b"read-timeout" => {
                let secs = parse_number(element, text)?;
                self.read_timeout = if secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(secs))
                };
            }
            b"user-agent" => {
                check_header("User-Agent", text).map_err(|e| LoaderError::Config(e.to_string()))?;
                self.user_agent = text.to_string();
            }
            b"read-buffer-size" => {
                let size = usize::try_from(parse_number(element, text)?).unwrap_or(usize::MAX);
                self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
            }
            other => {
                log::debug!(
                    "ignoring unknown config element <{}>",
                    String::from_utf8_lossy(other)
                );
            }
        }
        Ok(())
    }
}

fn parse_number(element: &[u8], text: &str) -> Result<u64> {
    text.parse::<u64>().map_err(|_| {
        LoaderError::Config(format!(
            "<{}> expects a non-negative integer, got {:?}",
            String::from_utf8_lossy(element),
            text
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = LoaderConfig::from_xml_str("<urlloader/>").unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn parses_all_elements() {
        let xml = r#"<?xml version="1.0"?>
            <urlloader>
              <connect-timeout>3</connect-timeout>
              <read-timeout>0</read-timeout>
              <user-agent>Demo/2.0 (test)</user-agent>
              <read-buffer-size>16384</read-buffer-size>
              <retries>5</retries>
            </urlloader>"#;
        let config = LoaderConfig::from_xml_str(xml).unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.user_agent, "Demo/2.0 (test)");
        assert_eq!(config.read_buffer_size, 16384);
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = LoaderConfig::from_xml_str(
            "<urlloader><connect-timeout>soon</connect-timeout></urlloader>",
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
        assert!(err.to_string().contains("connect-timeout"));
    }

    #[test]
    fn buffer_size_is_clamped() {
        let config = LoaderConfig::default().read_buffer_size(1);
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);
        let config = LoaderConfig::default().read_buffer_size(usize::MAX);
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
        let config = LoaderConfig::from_xml_str(
            "<urlloader><read-buffer-size>18446744073709551615</read-buffer-size></urlloader>",
        )
        .unwrap();
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn user_agent_with_entity_line_break_is_rejected() {
        let err = LoaderConfig::from_xml_str(
            "<urlloader><user-agent>ua/1&#13;&#10;X-Injected: 1</user-agent></urlloader>",
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig::load(&dir.path().join("absent.xml")).unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.xml");
        fs::write(
            &path,
            "<urlloader><user-agent>FromFile/1</user-agent></urlloader>",
        )
        .unwrap();
        let config = LoaderConfig::load(&path).unwrap();
        assert_eq!(config.user_agent, "FromFile/1");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }
}

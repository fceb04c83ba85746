/*
 * error.rs
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

//! Loader errors.
//!
//! Usage errors (`AlreadyInFlight`, `NoResponse`, ...) are returned synchronously by the
//! offending call. Fetch failures never come back from `start`: the transport's `io::Error`
//! is handed to the error callback unmodified. `Network` exists for callers that want to
//! lift such an error into a `LoaderError`.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoaderError>;

#[derive(Error, Debug)]
pub enum LoaderError {
    /// `start` was called while a previous fetch on the same loader is still running.
    #[error("a fetch is already in flight on this loader")]
    AlreadyInFlight,
    /// Never returned by this crate: fetch failures reach the error callback as the bare
    /// `io::Error`. Lets callers fold such an error into `LoaderError` with `?` or `into()`.
    #[error("network error: {0}")]
    Network(#[from] io::Error),
    /// Received bytes are not valid in the declared (or fallback) text encoding.
    #[error("received data is not valid {encoding}")]
    Decode { encoding: &'static str },
    /// Accessor needs response metadata but no response has been received yet.
    #[error("no response received")]
    NoResponse,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// `start` called outside a tokio runtime and no runtime handle was configured.
    #[error("no tokio runtime available to drive the fetch")]
    NoRuntime,
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<url::ParseError> for LoaderError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<quick_xml::Error> for LoaderError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Config(format!("XML parse error: {}", e))
    }
}

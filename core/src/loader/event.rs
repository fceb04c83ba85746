/*
 * event.rs
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

//! Lifecycle events as values, for observers that want a single stream of everything.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::protocol::http::{ExpectedLength, ResponseInfo};

/// Closed set of event kinds a loader emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResponseReceived,
    DataReceived,
    Success,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ResponseReceived => "response-received",
            EventKind::DataReceived => "data-received",
            EventKind::Success => "success",
            EventKind::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Success | EventKind::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event of a fetch.
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    ResponseReceived(ResponseInfo),
    /// Cumulative byte count after a chunk arrived.
    DataReceived {
        received: u64,
        expected: ExpectedLength,
    },
    Success {
        data: Bytes,
        status: u16,
    },
    /// The fetcher's error, shared so the event stays cloneable.
    Error(Arc<io::Error>),
}

impl LoaderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LoaderEvent::ResponseReceived(_) => EventKind::ResponseReceived,
            LoaderEvent::DataReceived { .. } => EventKind::DataReceived,
            LoaderEvent::Success { .. } => EventKind::Success,
            LoaderEvent::Error(_) => EventKind::Error,
        }
    }
}

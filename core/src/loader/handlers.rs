/*
 * handlers.rs
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

//! Caller-supplied handlers: four optional callbacks plus an optional event observer.
//!
//! Every slot is independent; an absent slot is a no-op. Callbacks run on the runtime worker
//! driving the fetch, so they must be `Send`. They may call back into the loader (accessors,
//! `cancel`, `start`).

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::loader::event::LoaderEvent;
use crate::protocol::http::{ExpectedLength, ResponseInfo};

pub type ResponseCallback = Box<dyn FnMut(&ResponseInfo) + Send>;
/// Bytes received so far and the expected total.
pub type ProgressCallback = Box<dyn FnMut(u64, ExpectedLength) + Send>;
/// Full received body and final status code.
pub type CompletionCallback = Box<dyn FnMut(Bytes, u16) + Send>;
/// The fetcher's error, as reported.
pub type ErrorCallback = Box<dyn FnMut(&io::Error) + Send>;
pub type EventCallback = Box<dyn FnMut(&LoaderEvent) + Send>;

#[derive(Default)]
pub struct Handlers {
    pub on_response: Option<ResponseCallback>,
    pub on_progress: Option<ProgressCallback>,
    pub on_completion: Option<CompletionCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_event: Option<EventCallback>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion and error only: the common case.
    pub fn completion<C, E>(on_completion: C, on_error: E) -> Self
    where
        C: FnMut(Bytes, u16) + Send + 'static,
        E: FnMut(&io::Error) + Send + 'static,
    {
        Self::new().on_completion(on_completion).on_error(on_error)
    }

    pub fn on_response(mut self, f: impl FnMut(&ResponseInfo) + Send + 'static) -> Self {
        self.on_response = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(u64, ExpectedLength) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_completion(mut self, f: impl FnMut(Bytes, u16) + Send + 'static) -> Self {
        self.on_completion = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&io::Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_event(mut self, f: impl FnMut(&LoaderEvent) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    /// Handlers that forward every event into a channel. Events sent after the receiver is
    /// dropped are discarded.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoaderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handlers = Self::new().on_event(move |event| {
            let _ = tx.send(event.clone());
        });
        (handlers, rx)
    }

    // `current` is re-checked before each slot: a cancel landing between two callbacks
    // suppresses the rest.

    pub(crate) fn emit_response(&mut self, info: &ResponseInfo, current: &dyn Fn() -> bool) {
        if let Some(f) = self.on_response.as_mut().filter(|_| current()) {
            f(info);
        }
        if let Some(f) = self.on_event.as_mut().filter(|_| current()) {
            f(&LoaderEvent::ResponseReceived(info.clone()));
        }
    }

    pub(crate) fn emit_progress(
        &mut self,
        received: u64,
        expected: ExpectedLength,
        current: &dyn Fn() -> bool,
    ) {
        if let Some(f) = self.on_progress.as_mut().filter(|_| current()) {
            f(received, expected);
        }
        if let Some(f) = self.on_event.as_mut().filter(|_| current()) {
            f(&LoaderEvent::DataReceived { received, expected });
        }
    }

    pub(crate) fn emit_completion(&mut self, data: Bytes, status: u16, current: &dyn Fn() -> bool) {
        if let Some(f) = self.on_completion.as_mut().filter(|_| current()) {
            f(data.clone(), status);
        }
        if let Some(f) = self.on_event.as_mut().filter(|_| current()) {
            f(&LoaderEvent::Success { data, status });
        }
    }

    pub(crate) fn emit_error(&mut self, error: io::Error, current: &dyn Fn() -> bool) {
        let error = Arc::new(error);
        if let Some(f) = self.on_error.as_mut().filter(|_| current()) {
            f(error.as_ref());
        }
        if let Some(f) = self.on_event.as_mut().filter(|_| current()) {
            f(&LoaderEvent::Error(error));
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_response", &self.on_response.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_completion", &self.on_completion.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

/*
 * relay.rs
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

//! Relay: the `ResponseHandler` a loader hands to its fetcher. Accumulates bytes into the
//! loader state and fans events out to the caller's handlers.
//!
//! Each relay is bound to one fetch generation. Events for a generation that is no longer
//! current (cancelled, or already terminated) are dropped. Callbacks run with the handlers
//! lock held, and the generation is re-checked before each callback slot, so a `cancel`
//! that waits on that lock sees no callback for the cancelled fetch once it returns.

use std::cell::RefCell;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::loader::handlers::Handlers;
use crate::loader::{lock, FetchState, Shared};
use crate::protocol::http::{ExpectedLength, ResponseHandler, ResponseInfo};

thread_local! {
    /// Handler sets whose callbacks are running on this thread.
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn dispatch_key(handlers: &Arc<Mutex<Handlers>>) -> usize {
    Arc::as_ptr(handlers) as usize
}

/// Whether the current thread is inside a callback of `handlers`.
pub(crate) fn is_dispatching(handlers: &Arc<Mutex<Handlers>>) -> bool {
    let key = dispatch_key(handlers);
    DISPATCHING.with(|d| d.borrow().contains(&key))
}

/// Handlers lock, marked as dispatching on this thread until dropped.
struct Dispatch<'a> {
    guard: MutexGuard<'a, Handlers>,
    key: usize,
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        DISPATCHING.with(|d| {
            let mut d = d.borrow_mut();
            if let Some(pos) = d.iter().rposition(|k| *k == self.key) {
                d.remove(pos);
            }
        });
    }
}

impl Deref for Dispatch<'_> {
    type Target = Handlers;

    fn deref(&self) -> &Handlers {
        &self.guard
    }
}

impl DerefMut for Dispatch<'_> {
    fn deref_mut(&mut self) -> &mut Handlers {
        &mut self.guard
    }
}

#[derive(Clone)]
pub(crate) struct Relay {
    shared: Arc<Shared>,
    handlers: Arc<Mutex<Handlers>>,
    generation: u64,
}

impl Relay {
    pub(crate) fn new(shared: Arc<Shared>, handlers: Arc<Mutex<Handlers>>, generation: u64) -> Self {
        Self {
            shared,
            handlers,
            generation,
        }
    }

    fn dispatch(&self) -> Dispatch<'_> {
        let guard = lock(&self.handlers);
        let key = dispatch_key(&self.handlers);
        DISPATCHING.with(|d| d.borrow_mut().push(key));
        Dispatch { guard, key }
    }

    /// Not cancelled or superseded. Stays true after this fetch's own terminal transition.
    fn is_current(&self) -> bool {
        lock(&self.shared.state).generation == self.generation
    }

    /// Run `f` on the state if this relay's fetch is still the active one.
    fn with_current<R>(&self, f: impl FnOnce(&mut FetchState) -> R) -> Option<R> {
        let mut state = lock(&self.shared.state);
        if state.generation != self.generation || state.task.is_none() {
            log::trace!("dropping event for stale fetch generation {}", self.generation);
            return None;
        }
        Some(f(&mut state))
    }

    fn terminate(&self, error: io::Error) {
        let mut handlers = self.dispatch();
        if self.with_current(|state| state.task = None).is_some() {
            log::debug!("fetch generation {} failed: {}", self.generation, error);
            handlers.emit_error(error, &|| self.is_current());
        }
    }

    /// Called when the fetch task ends. A task that ended without reporting completion or
    /// failure (the fetcher returned early, or something in the task panicked) still owes
    /// the caller a terminal event.
    pub(crate) fn finish_unterminated(&self, error: io::Error) {
        let still_running = {
            let state = lock(&self.shared.state);
            state.generation == self.generation && state.task.is_some()
        };
        if still_running {
            log::warn!("fetch task ended without a terminal event: {}", error);
            self.terminate(error);
        }
    }
}

impl ResponseHandler for Relay {
    fn response(&mut self, info: ResponseInfo) {
        let mut handlers = self.dispatch();
        let first = self.with_current(|state| {
            if state.response.is_some() {
                return false;
            }
            state.response = Some(info.clone());
            true
        });
        match first {
            Some(true) => handlers.emit_response(&info, &|| self.is_current()),
            Some(false) => log::warn!("ignoring repeated response head ({})", info.status),
            None => {}
        }
    }

    fn body_chunk(&mut self, data: &[u8]) {
        let mut handlers = self.dispatch();
        let progress = self.with_current(|state| {
            state.data.extend_from_slice(data);
            let expected = state
                .response
                .as_ref()
                .map(|r| r.expected_length)
                .unwrap_or(ExpectedLength::Unknown);
            (state.data.len() as u64, expected)
        });
        if let Some((received, expected)) = progress {
            log::trace!("received {} bytes ({} of {})", data.len(), received, expected);
            handlers.emit_progress(received, expected, &|| self.is_current());
        }
    }

    fn complete(&mut self) {
        let mut handlers = self.dispatch();
        let outcome = self.with_current(|state| {
            state.task = None;
            match &state.response {
                Some(response) => Ok((Bytes::copy_from_slice(&state.data), response.status)),
                None => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "fetch completed without a response",
                )),
            }
        });
        match outcome {
            Some(Ok((data, status))) => {
                log::debug!(
                    "fetch generation {} complete: {} bytes, status {}",
                    self.generation,
                    data.len(),
                    status
                );
                handlers.emit_completion(data, status, &|| self.is_current());
            }
            Some(Err(e)) => {
                log::warn!("{}", e);
                handlers.emit_error(e, &|| self.is_current());
            }
            None => {}
        }
    }

    fn failed(&mut self, error: io::Error) {
        self.terminate(error);
    }
}

/// Lives inside the spawned fetch task and reports a missing terminal event when the task
/// ends, whether the fetch future returned or the task was torn down by a panic. After a
/// cancel the generation has moved on, so it stays silent.
pub(crate) struct TaskGuard {
    relay: Relay,
    returned: bool,
}

impl TaskGuard {
    pub(crate) fn new(relay: Relay) -> Self {
        Self {
            relay,
            returned: false,
        }
    }

    pub(crate) fn returned(&mut self) {
        self.returned = true;
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let error = if self.returned {
            io::Error::new(io::ErrorKind::UnexpectedEof, "fetch ended without completing")
        } else {
            io::Error::new(io::ErrorKind::Other, "fetch task stopped before completing")
        };
        self.relay.finish_unterminated(error);
    }
}

/*
 * mod.rs
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

//! URL loader: start a request, accumulate the body, fan events out to caller handlers.
//!
//! Lifecycle of one fetch: `start` → response (at most once) → progress (×n) → exactly one
//! of completion or error → inert. `cancel` returns to inert without a terminal event.
//! Starting while a fetch is in flight fails with `AlreadyInFlight`; the running fetch is
//! not disturbed.
//!
//! Sample:
//!
//! ```no_run
//! # async fn demo() -> urlloader_core::Result<()> {
//! use urlloader_core::{Handlers, Request, UrlLoader};
//!
//! let request = Request::get("https://example.com/")?;
//! let handlers = Handlers::new()
//!     .on_progress(|received, expected| println!("{} of {}", received, expected))
//!     .on_completion(|data, status| println!("{} bytes, status {}", data.len(), status))
//!     .on_error(|e| eprintln!("failed: {}", e));
//! let loader = UrlLoader::new(request, handlers);
//! loader.start()?;
//! # Ok(())
//! # }
//! ```

mod event;
mod handlers;
mod relay;
mod text;

pub use event::{EventKind, LoaderEvent};
pub use handlers::{
    CompletionCallback, ErrorCallback, EventCallback, Handlers, ProgressCallback,
    ResponseCallback,
};
pub use text::decode_text;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::fetch::Fetcher;
use crate::protocol::http::{HttpFetcher, Request, ResponseInfo};

use relay::{Relay, TaskGuard};

/// Lock, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable loader state shared with the relay of the current fetch.
pub(crate) struct FetchState {
    /// Identifies the current fetch; bumped on every start and cancel.
    pub(crate) generation: u64,
    /// Present only while a fetch is in flight.
    pub(crate) task: Option<AbortHandle>,
    pub(crate) data: BytesMut,
    pub(crate) response: Option<ResponseInfo>,
    /// Lock order: a relay locks handlers before state, never the reverse.
    pub(crate) handlers: Arc<Mutex<Handlers>>,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<FetchState>,
}

/// Callback-based wrapper around one request. One fetch in flight at a time.
///
/// Dropping the loader cancels any fetch in flight.
pub struct UrlLoader {
    request: Request,
    fetcher: Arc<dyn Fetcher>,
    runtime: Option<Handle>,
    shared: Arc<Shared>,
}

impl UrlLoader {
    /// Loader using the built-in HTTP fetcher with default configuration. No I/O happens
    /// until `start`.
    pub fn new(request: Request, handlers: Handlers) -> Self {
        Self::with_config(request, handlers, LoaderConfig::default())
    }

    pub fn with_config(request: Request, handlers: Handlers, config: LoaderConfig) -> Self {
        Self::with_fetcher(request, handlers, Arc::new(HttpFetcher::new(config)))
    }

    pub fn with_fetcher(request: Request, handlers: Handlers, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            request,
            fetcher,
            runtime: None,
            shared: Arc::new(Shared {
                state: Mutex::new(FetchState {
                    generation: 0,
                    task: None,
                    data: BytesMut::new(),
                    response: None,
                    handlers: Arc::new(Mutex::new(handlers)),
                }),
            }),
        }
    }

    /// Spawn fetches on this runtime instead of the one current at `start`.
    pub fn with_runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Begin the fetch and return immediately. Clears data and response of any previous
    /// fetch. All outcomes of the fetch itself arrive through the handlers.
    pub fn start(&self) -> Result<()> {
        self.start_inner(None)
    }

    /// Replace the handlers, then start. Fails without touching the handlers if a fetch is
    /// already in flight.
    pub fn start_with(&self, handlers: Handlers) -> Result<()> {
        self.start_inner(Some(handlers))
    }

    fn start_inner(&self, replacement: Option<Handlers>) -> Result<()> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| LoaderError::NoRuntime)?,
        };

        let mut state = lock(&self.shared.state);
        if state.task.is_some() {
            return Err(LoaderError::AlreadyInFlight);
        }
        if let Some(handlers) = replacement {
            state.handlers = Arc::new(Mutex::new(handlers));
        }
        state.generation += 1;
        state.data.clear();
        state.response = None;

        let relay = Relay::new(
            Arc::clone(&self.shared),
            Arc::clone(&state.handlers),
            state.generation,
        );
        let fetch = self
            .fetcher
            .fetch(self.request.clone(), Box::new(relay.clone()));
        // Spawned while holding the lock: the relay cannot observe the fetch before its
        // abort handle is recorded.
        let task = runtime.spawn(async move {
            let mut guard = TaskGuard::new(relay);
            fetch.await;
            guard.returned();
        });
        state.task = Some(task.abort_handle());
        log::debug!(
            "started fetch generation {}: {} {}",
            state.generation,
            self.request.method(),
            self.request.url()
        );
        Ok(())
    }

    /// Abort the fetch in flight, if any. No completion or error fires for it afterwards.
    ///
    /// Called from outside the loader's callbacks, this also waits for a callback already
    /// running on another thread to return. Called from inside one, it returns at once and
    /// the remaining callbacks for the event are skipped.
    pub fn cancel(&self) {
        let (task, handlers) = {
            let mut state = lock(&self.shared.state);
            let task = state.task.take();
            if task.is_some() {
                state.generation += 1;
            }
            (task, Arc::clone(&state.handlers))
        };
        if let Some(task) = task {
            task.abort();
            log::debug!("cancelled fetch of {}", self.request.url());
        }
        if !relay::is_dispatching(&handlers) {
            drop(lock(&handlers));
        }
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared.state).task.is_some()
    }

    /// Bytes received so far by the current (or last) fetch.
    pub fn received_data(&self) -> Bytes {
        Bytes::copy_from_slice(&lock(&self.shared.state).data)
    }

    pub fn response(&self) -> Option<ResponseInfo> {
        lock(&self.shared.state).response.clone()
    }

    pub fn status_code(&self) -> Result<u16> {
        lock(&self.shared.state)
            .response
            .as_ref()
            .map(|r| r.status)
            .ok_or(LoaderError::NoResponse)
    }

    /// Received bytes decoded with the response's charset (UTF-8 when absent or unknown).
    pub fn received_string(&self) -> Result<String> {
        let state = lock(&self.shared.state);
        let response = state.response.as_ref().ok_or(LoaderError::NoResponse)?;
        decode_text(&state.data, response.text_encoding_name().as_deref())
    }
}

impl Drop for UrlLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

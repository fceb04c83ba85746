/*
 * lib.rs
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

//! C FFI for urlloader core. Requests and loaders are opaque pointers owned by the caller;
//! free them with the matching `_free` function. All string parameters are UTF-8
//! NUL-terminated. Callbacks run on a runtime worker thread; hosts with a UI thread must
//! marshal to it themselves.

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::{CStr, CString};
use std::fmt;
use std::ptr;
use urlloader_core::{ExpectedLength, Handlers, LoaderError, Request, UrlLoader};

/// Wrapper so *mut c_void can be moved into Send closures. C callbacks are invoked from worker threads.
#[derive(Clone, Copy)]
struct SendableUserData(*mut c_void);
unsafe impl Send for SendableUserData {}
unsafe impl Sync for SendableUserData {}

impl SendableUserData {
    fn get(self) -> *mut c_void {
        self.0
    }
}

/// Response head: status code, expected length (-1 when unknown), user_data.
pub type OnResponse = extern "C" fn(c_int, i64, *mut c_void);
/// Progress: bytes received so far, expected length (-1 when unknown), user_data.
pub type OnProgress = extern "C" fn(u64, i64, *mut c_void);
/// Completion: data, length, status code, user_data. Data is only valid during the call.
pub type OnComplete = extern "C" fn(*const u8, size_t, c_int, *mut c_void);
/// Error: message (valid only during the call), user_data.
pub type OnError = extern "C" fn(*const c_char, *mut c_void);

/// Callback table for `urlloader_new`. Every callback may be NULL.
#[repr(C)]
pub struct UrlLoaderCallbacks {
    pub on_response: Option<OnResponse>,
    pub on_progress: Option<OnProgress>,
    pub on_complete: Option<OnComplete>,
    pub on_error: Option<OnError>,
    pub user_data: *mut c_void,
}

/// Opaque request under construction.
pub struct UrlLoaderRequest {
    request: Request,
}

/// Opaque loader.
pub struct UrlLoaderHandle {
    loader: UrlLoader,
}

/// Hosts the shared tokio runtime all fetches run on.
struct Registry {
    runtime: tokio::runtime::Runtime,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("urlloader-io")
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");
        Registry { runtime }
    })
}

fn ptr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok() }
}

/// CString from arbitrary text; interior NULs become spaces.
fn c_message(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}

fn length_to_c(length: ExpectedLength) -> i64 {
    length
        .as_option()
        .and_then(|n| i64::try_from(n).ok())
        .unwrap_or(-1)
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(err: impl fmt::Display) {
    let msg = c_message(&err.to_string());
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn handlers_from(callbacks: &UrlLoaderCallbacks) -> Handlers {
    let user_data = SendableUserData(callbacks.user_data);
    let mut handlers = Handlers::new();
    if let Some(cb) = callbacks.on_response {
        handlers = handlers.on_response(move |info| {
            cb(info.status as c_int, length_to_c(info.expected_length), user_data.get())
        });
    }
    if let Some(cb) = callbacks.on_progress {
        handlers = handlers.on_progress(move |received, expected| {
            cb(received, length_to_c(expected), user_data.get())
        });
    }
    if let Some(cb) = callbacks.on_complete {
        handlers = handlers.on_completion(move |data, status| {
            cb(data.as_ptr(), data.len(), status as c_int, user_data.get())
        });
    }
    if let Some(cb) = callbacks.on_error {
        handlers = handlers.on_error(move |error| {
            let msg = c_message(&error.to_string());
            cb(msg.as_ptr(), user_data.get())
        });
    }
    handlers
}

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn urlloader_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the next FFI call. Do not free.
#[no_mangle]
pub extern "C" fn urlloader_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by urlloader_received_string. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn urlloader_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Free a buffer returned by urlloader_received_data. len must be the length it reported.
#[no_mangle]
pub unsafe extern "C" fn urlloader_free_data(ptr: *mut u8, len: size_t) {
    if !ptr.is_null() {
        let _ = Box::from_raw(std::slice::from_raw_parts_mut(ptr, len) as *mut [u8]);
    }
}

// ---------- Request ----------

/// Create a request. method may be NULL for GET. url must be http or https.
/// Returns NULL on error (see urlloader_last_error). Free with urlloader_request_free.
#[no_mangle]
pub extern "C" fn urlloader_request_new(
    method: *const c_char,
    url: *const c_char,
) -> *mut UrlLoaderRequest {
    let url = match ptr_to_str(url) {
        Some(u) => u,
        None => {
            set_last_error("url is null or not valid UTF-8");
            return ptr::null_mut();
        }
    };
    let method = if method.is_null() {
        "GET"
    } else {
        match ptr_to_str(method) {
            Some(m) => m,
            None => {
                set_last_error("method is not valid UTF-8");
                return ptr::null_mut();
            }
        }
    };
    match Request::parse(method, url) {
        Ok(request) => {
            clear_last_error();
            Box::into_raw(Box::new(UrlLoaderRequest { request }))
        }
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Set a request header, replacing any existing value of the same name. Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn urlloader_request_set_header(
    request: *mut UrlLoaderRequest,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let request = match request.as_mut() {
        Some(r) => r,
        None => {
            set_last_error("request is null");
            return -1;
        }
    };
    let (name, value) = match (ptr_to_str(name), ptr_to_str(value)) {
        (Some(n), Some(v)) if !n.is_empty() => (n, v),
        _ => {
            set_last_error("header name or value is null, empty or not valid UTF-8");
            return -1;
        }
    };
    if let Err(e) = request.request.header(name, value) {
        set_last_error(&e);
        return -1;
    }
    clear_last_error();
    0
}

/// Set the request body (copied). data may be NULL only when len is 0. Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn urlloader_request_set_body(
    request: *mut UrlLoaderRequest,
    data: *const u8,
    len: size_t,
) -> c_int {
    let request = match request.as_mut() {
        Some(r) => r,
        None => {
            set_last_error("request is null");
            return -1;
        }
    };
    if data.is_null() && len > 0 {
        set_last_error("body data is null");
        return -1;
    }
    let body = if len == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(data, len).to_vec()
    };
    request.request.body(body);
    clear_last_error();
    0
}

#[no_mangle]
pub unsafe extern "C" fn urlloader_request_free(request: *mut UrlLoaderRequest) {
    if !request.is_null() {
        let _ = Box::from_raw(request);
    }
}

// ---------- Loader ----------

/// Create a loader for a copy of request (the caller still frees request). callbacks may be
/// NULL; the table is copied. Returns NULL on error. Free with urlloader_free.
#[no_mangle]
pub unsafe extern "C" fn urlloader_new(
    request: *const UrlLoaderRequest,
    callbacks: *const UrlLoaderCallbacks,
) -> *mut UrlLoaderHandle {
    let request = match request.as_ref() {
        Some(r) => r.request.clone(),
        None => {
            set_last_error("request is null");
            return ptr::null_mut();
        }
    };
    let handlers = callbacks.as_ref().map(handlers_from).unwrap_or_default();
    let loader = UrlLoader::new(request, handlers)
        .with_runtime_handle(registry().runtime.handle().clone());
    log::debug!("created loader for {}", loader.request().url());
    clear_last_error();
    Box::into_raw(Box::new(UrlLoaderHandle { loader }))
}

/// Start the fetch. Returns 0 when started, -1 on error (e.g. a fetch is already in flight).
#[no_mangle]
pub unsafe extern "C" fn urlloader_start(handle: *mut UrlLoaderHandle) -> c_int {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => {
            set_last_error("loader is null");
            return -1;
        }
    };
    match handle.loader.start() {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(&e);
            -1
        }
    }
}

/// Cancel the fetch in flight. When called outside the loader's callbacks, waits for a
/// callback running on a worker thread to return; afterwards no callback fires for the fetch.
#[no_mangle]
pub unsafe extern "C" fn urlloader_cancel(handle: *mut UrlLoaderHandle) {
    if let Some(h) = handle.as_ref() {
        h.loader.cancel();
    }
}

/// 1 while a fetch is in flight, 0 otherwise (or if handle is NULL).
#[no_mangle]
pub unsafe extern "C" fn urlloader_is_loading(handle: *const UrlLoaderHandle) -> c_int {
    match handle.as_ref() {
        Some(h) if h.loader.is_loading() => 1,
        _ => 0,
    }
}

/// Cancel any fetch in flight and free the loader. No-op if handle is NULL.
/// Called outside the loader's callbacks, it returns only once no callback is running, so
/// user_data may be released right after.
#[no_mangle]
pub unsafe extern "C" fn urlloader_free(handle: *mut UrlLoaderHandle) {
    if !handle.is_null() {
        let _ = Box::from_raw(handle);
    }
}

// ---------- Accessors ----------

/// Status code of the last response, or -1 if none has been received.
#[no_mangle]
pub unsafe extern "C" fn urlloader_status_code(handle: *const UrlLoaderHandle) -> c_int {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => {
            set_last_error("loader is null");
            return -1;
        }
    };
    match handle.loader.status_code() {
        Ok(code) => code as c_int,
        Err(e) => {
            set_last_error(&e);
            -1
        }
    }
}

/// Declared length of the last response, or -1 when unknown or no response yet.
#[no_mangle]
pub unsafe extern "C" fn urlloader_expected_length(handle: *const UrlLoaderHandle) -> i64 {
    handle
        .as_ref()
        .and_then(|h| h.loader.response())
        .map(|r| length_to_c(r.expected_length))
        .unwrap_or(-1)
}

/// Copy of the bytes received so far. Writes the length to out_len. Returns NULL when
/// nothing has been received. Free with urlloader_free_data(ptr, len).
#[no_mangle]
pub unsafe extern "C" fn urlloader_received_data(
    handle: *const UrlLoaderHandle,
    out_len: *mut size_t,
) -> *mut u8 {
    if out_len.is_null() {
        set_last_error("null output pointer");
        return ptr::null_mut();
    }
    *out_len = 0;
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => {
            set_last_error("loader is null");
            return ptr::null_mut();
        }
    };
    let data = handle.loader.received_data();
    clear_last_error();
    if data.is_empty() {
        return ptr::null_mut();
    }
    *out_len = data.len();
    Box::into_raw(data.to_vec().into_boxed_slice()) as *mut u8
}

/// Received bytes decoded per the response charset. Returns NULL on error (no response,
/// malformed text, or text containing NUL). Free with urlloader_free_string.
#[no_mangle]
pub unsafe extern "C" fn urlloader_received_string(handle: *const UrlLoaderHandle) -> *mut c_char {
    let handle = match handle.as_ref() {
        Some(h) => h,
        None => {
            set_last_error("loader is null");
            return ptr::null_mut();
        }
    };
    let text = match handle.loader.received_string() {
        Ok(t) => t,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };
    match CString::new(text) {
        Ok(s) => {
            clear_last_error();
            s.into_raw()
        }
        Err(_) => {
            set_last_error("received text contains NUL");
            ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// Collects callback invocations; passed to C callbacks as user_data.
    struct Probe {
        lines: Mutex<Vec<String>>,
        done: Mutex<mpsc::Sender<()>>,
    }

    impl Probe {
        fn new() -> (Self, mpsc::Receiver<()>) {
            let (tx, rx) = mpsc::channel();
            let probe = Probe {
                lines: Mutex::new(Vec::new()),
                done: Mutex::new(tx),
            };
            (probe, rx)
        }

        fn callbacks(&self) -> UrlLoaderCallbacks {
            UrlLoaderCallbacks {
                on_response: Some(probe_response),
                on_progress: Some(probe_progress),
                on_complete: Some(probe_complete),
                on_error: Some(probe_error),
                user_data: self as *const Probe as *mut c_void,
            }
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    fn probe<'a>(user_data: *mut c_void) -> &'a Probe {
        unsafe { &*(user_data as *const Probe) }
    }

    extern "C" fn probe_response(status: c_int, expected: i64, user_data: *mut c_void) {
        let p = probe(user_data);
        p.lines.lock().unwrap().push(format!("response {} {}", status, expected));
    }

    extern "C" fn probe_progress(received: u64, expected: i64, user_data: *mut c_void) {
        let p = probe(user_data);
        p.lines.lock().unwrap().push(format!("progress {} {}", received, expected));
    }

    extern "C" fn probe_complete(data: *const u8, len: size_t, status: c_int, user_data: *mut c_void) {
        let p = probe(user_data);
        let body = unsafe { std::slice::from_raw_parts(data, len) };
        p.lines
            .lock()
            .unwrap()
            .push(format!("complete {} {}", status, String::from_utf8_lossy(body)));
        let _ = p.done.lock().unwrap().send(());
    }

    extern "C" fn probe_error(message: *const c_char, user_data: *mut c_void) {
        let p = probe(user_data);
        let message = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
        p.lines.lock().unwrap().push(format!("error {}", message));
        let _ = p.done.lock().unwrap().send(());
    }

    /// One-shot server: reads the request head, waits for `release` if given, replies, closes.
    fn serve(response: &'static [u8], release: Option<mpsc::Receiver<()>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/resource\0", listener.local_addr().unwrap());
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 512];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).unwrap();
                if n == 0 {
                    return;
                }
                head.extend_from_slice(&buf[..n]);
            }
            if let Some(release) = release {
                let _ = release.recv();
            }
            let _ = socket.write_all(response);
        });
        url
    }

    fn last_error() -> String {
        let ptr = urlloader_last_error();
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    #[test]
    fn fetch_through_c_api() {
        let url = serve(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello",
            None,
        );
        let (probe, done) = Probe::new();
        unsafe {
            let request = urlloader_request_new(ptr::null(), url.as_ptr() as *const c_char);
            assert!(!request.is_null());
            assert_eq!(
                urlloader_request_set_header(request, b"Accept\0".as_ptr() as _, b"text/plain\0".as_ptr() as _),
                0
            );
            let callbacks = probe.callbacks();
            let loader = urlloader_new(request, &callbacks);
            urlloader_request_free(request);
            assert!(!loader.is_null());
            assert_eq!(urlloader_status_code(loader), -1);

            assert_eq!(urlloader_start(loader), 0);
            done.recv_timeout(Duration::from_secs(10)).unwrap();

            let lines = probe.lines();
            assert_eq!(lines.first().map(String::as_str), Some("response 200 5"));
            assert!(lines.contains(&"progress 5 5".to_string()));
            assert_eq!(lines.last().map(String::as_str), Some("complete 200 hello"));
            assert_eq!(urlloader_is_loading(loader), 0);
            assert_eq!(urlloader_status_code(loader), 200);
            assert_eq!(urlloader_expected_length(loader), 5);

            let mut len: size_t = 0;
            let data = urlloader_received_data(loader, &mut len);
            assert_eq!(std::slice::from_raw_parts(data, len), b"hello");
            urlloader_free_data(data, len);

            let text = urlloader_received_string(loader);
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "hello");
            urlloader_free_string(text);

            urlloader_free(loader);
        }
    }

    #[test]
    fn connection_failure_reaches_error_callback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/\0", listener.local_addr().unwrap());
        drop(listener);

        let (probe, done) = Probe::new();
        unsafe {
            let request = urlloader_request_new(b"GET\0".as_ptr() as _, url.as_ptr() as _);
            let callbacks = probe.callbacks();
            let loader = urlloader_new(request, &callbacks);
            urlloader_request_free(request);
            assert_eq!(urlloader_start(loader), 0);
            done.recv_timeout(Duration::from_secs(10)).unwrap();

            let lines = probe.lines();
            assert_eq!(lines.len(), 1);
            assert!(lines[0].starts_with("error "), "{:?}", lines);
            assert_eq!(urlloader_status_code(loader), -1);
            assert!(last_error().contains("no response"));

            let mut len: size_t = 7;
            assert!(urlloader_received_data(loader, &mut len).is_null());
            assert_eq!(len, 0);
            assert!(urlloader_received_string(loader).is_null());
            urlloader_free(loader);
        }
    }

    #[test]
    fn second_start_fails_until_cancelled() {
        let (release_tx, release_rx) = mpsc::channel();
        let url = serve(b"HTTP/1.1 204 No Content\r\n\r\n", Some(release_rx));
        let (probe, _done) = Probe::new();
        unsafe {
            let request = urlloader_request_new(ptr::null(), url.as_ptr() as _);
            let callbacks = probe.callbacks();
            let loader = urlloader_new(request, &callbacks);
            urlloader_request_free(request);

            assert_eq!(urlloader_start(loader), 0);
            assert_eq!(urlloader_is_loading(loader), 1);
            assert_eq!(urlloader_start(loader), -1);
            assert!(last_error().contains("already in flight"));

            urlloader_cancel(loader);
            assert_eq!(urlloader_is_loading(loader), 0);
            let _ = release_tx.send(());
            thread::sleep(Duration::from_millis(100));
            assert!(probe.lines().is_empty());
            urlloader_free(loader);
        }
    }

    #[test]
    fn invalid_arguments_set_last_error() {
        assert!(urlloader_request_new(ptr::null(), ptr::null()).is_null());
        assert!(last_error().contains("url is null"));

        let bad = urlloader_request_new(ptr::null(), b"ftp://example.com/\0".as_ptr() as _);
        assert!(bad.is_null());
        assert!(last_error().starts_with("invalid request"));

        let bad = urlloader_request_new(b"FETCH\0".as_ptr() as _, b"http://example.com/\0".as_ptr() as _);
        assert!(bad.is_null());

        unsafe {
            assert_eq!(urlloader_start(ptr::null_mut()), -1);
            assert_eq!(urlloader_is_loading(ptr::null()), 0);
            assert_eq!(urlloader_expected_length(ptr::null()), -1);
            assert!(urlloader_new(ptr::null(), ptr::null()).is_null());
            urlloader_cancel(ptr::null_mut());
            urlloader_free(ptr::null_mut());
            urlloader_request_free(ptr::null_mut());
            urlloader_free_string(ptr::null_mut());
            urlloader_free_data(ptr::null_mut(), 0);

            let request = urlloader_request_new(ptr::null(), b"http://example.com/\0".as_ptr() as _);
            assert_eq!(
                urlloader_request_set_header(request, b"X-Bad\r\n\0".as_ptr() as _, b"v\0".as_ptr() as _),
                -1
            );
            assert!(last_error().starts_with("invalid request"));
            assert_eq!(
                urlloader_request_set_header(
                    request,
                    b"X-A\0".as_ptr() as _,
                    b"1\r\nX-Injected: evil\0".as_ptr() as _
                ),
                -1
            );
            assert_eq!(urlloader_request_set_body(request, ptr::null(), 3), -1);
            assert_eq!(urlloader_request_set_body(request, b"abc".as_ptr(), 3), 0);
            urlloader_request_free(request);
        }
    }

    #[test]
    fn version_matches_package() {
        let version = unsafe { CStr::from_ptr(urlloader_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}

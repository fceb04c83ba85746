/*
 * client.rs
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

//! HTTP client: the built-in `Fetcher`. Opens one connection per request.

use crate::config::LoaderConfig;
use crate::fetch::{FetchFuture, Fetcher};
use crate::protocol::http::connection::HttpConnection;
use crate::protocol::http::{Request, ResponseHandler};

/// HTTP/1.1 fetcher over tokio TCP, with rustls for `https`. No redirects, no pooling.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    config: LoaderConfig,
}

impl HttpFetcher {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: Request, mut handler: Box<dyn ResponseHandler + Send>) -> FetchFuture {
        let config = self.config.clone();
        Box::pin(async move {
            let mut conn = match HttpConnection::open(&request, &config).await {
                Ok(conn) => conn,
                Err(e) => {
                    log::debug!("connect to {} failed: {}", request.url(), e);
                    handler.failed(e);
                    return;
                }
            };
            if let Err(e) = conn.send(&request, handler.as_mut()).await {
                log::debug!("{} {} failed: {}", request.method(), request.url(), e);
                handler.failed(e);
            }
        })
    }
}

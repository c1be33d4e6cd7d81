// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! HTTP status responder.
//!
//! A read-only view over the published status: it never talks to the control loop, it only
//! reads the latest snapshot.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use countdown_snapshot::SnapshotReader;
use tiny_http::{Header, Method, Response, Server};
use tracing::{debug, error, info};

/// The status page, polling `/api/status` every 5 seconds.
const INDEX_HTML: &str = include_str!("../static/index.html");

/// A response, before it is handed over to the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl StatusResponse {
    fn text(status: u16, body: &str) -> StatusResponse {
        StatusResponse {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
        }
    }
}

/// Route a request to its response.
pub fn route(method: &Method, url: &str, reader: &SnapshotReader) -> StatusResponse {
    let path = url.split_once('?').map_or(url, |(path, _)| path);

    if *method != Method::Get {
        return StatusResponse::text(405, "Method Not Allowed");
    }

    match path {
        "/" | "/index.html" => StatusResponse {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: INDEX_HTML.to_string(),
        },
        "/api/status" => match reader.snapshot().report().to_json() {
            Ok(body) => StatusResponse {
                status: 200,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                error!(error = ?e, "Failed to serialize status");
                StatusResponse::text(500, "Internal Server Error")
            }
        },
        _ => StatusResponse::text(404, "Not Found"),
    }
}

/// The responder, serving requests on its own thread.
pub struct StatusServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl StatusServer {
    /// Bind `listen` and start serving.
    pub fn start(listen: &str, reader: SnapshotReader) -> anyhow::Result<StatusServer> {
        let server = Server::http(listen)
            .map_err(|e| anyhow::anyhow!("bind status responder on {}: {}", listen, e))?;
        let server = Arc::new(server);
        info!("Status page served on http://{}", server.server_addr());

        let serving = server.clone();
        let handle = thread::Builder::new()
            .name(String::from("status-http"))
            .spawn(move || serve(&serving, &reader))
            .context("spawn status responder thread")?;

        Ok(StatusServer {
            server,
            handle: Some(handle),
        })
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Stop serving and wait for the responder thread.
    pub fn stop(mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Status responder thread panicked");
            }
        }
    }
}

fn serve(server: &Server, reader: &SnapshotReader) {
    for request in server.incoming_requests() {
        let routed = route(request.method(), request.url(), reader);
        debug!(
            method = %request.method(),
            url = %request.url(),
            status = %routed.status,
            "Status request"
        );

        let mut response = Response::from_string(routed.body).with_status_code(routed.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], routed.content_type.as_bytes())
        {
            response = response.with_header(header);
        }
        if let Err(e) = request.respond(response) {
            debug!(error = ?e, "Failed to send status response");
        }
    }
}

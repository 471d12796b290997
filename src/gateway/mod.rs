use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

/// Pass-through between the browser-facing API and the processing service.
/// Both routes relay the processor's status and body unchanged; only
/// transport-level failures are translated into a 500 here.
pub struct Gateway {
    client: reqwest::Client,
    processor_url: String,
}

impl Gateway {
    pub fn new(processor_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            processor_url: processor_url.into(),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/api/upload", post(upload))
            .route("/api/status", get(status))
            .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
            .with_state(Arc::new(self))
    }
}

pub async fn serve(gateway: Gateway, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!(%addr, "gateway listening");
    axum::serve(listener, gateway.router())
        .await
        .context("gateway server failed")
}

async fn upload(State(gateway): State<Arc<Gateway>>, mut multipart: Multipart) -> Response {
    let mut file: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    let name = field.file_name().unwrap_or("upload.csv").to_string();
                    match field.bytes().await {
                        Ok(bytes) => file = Some((name, bytes.to_vec())),
                        Err(err) => return transport_error(err.to_string()),
                    }
                    break;
                }
            }
            Ok(None) => break,
            // A body we cannot decode is a transport problem, not a missing
            // file.
            Err(err) => return transport_error(err.to_string()),
        }
    }

    let Some((name, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No file provided" })),
        )
            .into_response();
    };
    info!(file = %name, size = bytes.len(), "relaying upload to processor");

    let part = match reqwest::multipart::Part::bytes(bytes)
        .file_name(name)
        .mime_str("text/csv")
    {
        Ok(part) => part,
        Err(err) => return transport_error(err.to_string()),
    };
    let form = reqwest::multipart::Form::new().part("file", part);

    let result = gateway
        .client
        .post(format!("{}/api/process", gateway.processor_url))
        .multipart(form)
        .send()
        .await;
    relay(result).await
}

async fn status(State(gateway): State<Arc<Gateway>>) -> Response {
    let result = gateway
        .client
        .get(format!("{}/api/status", gateway.processor_url))
        .header("Cache-Control", "no-cache")
        .send()
        .await;
    relay(result).await
}

/// Forward the processor's status code and JSON body verbatim; anything that
/// keeps us from doing so becomes a 500 with `{error, details}`.
async fn relay(result: reqwest::Result<reqwest::Response>) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(err) => return transport_error(err.to_string()),
    };

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    match response.json::<Value>().await {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => transport_error(err.to_string()),
    }
}

fn transport_error(details: String) -> Response {
    error!(details = %details, "relay failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "details": details })),
    )
        .into_response()
}

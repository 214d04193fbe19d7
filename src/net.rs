//! Network fetch adapter backed by reqwest, satisfying the worker's
//! fetcher contract.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;

use crate::worker::{Request, WireResponse};

/// Thin wrapper over a shared reqwest client.
#[derive(Clone)]
pub struct NetworkClient {
  client: reqwest::Client,
}

impl NetworkClient {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { client })
  }

  /// Fetch a request and read the full body. A transport failure is an
  /// error; an HTTP error status is a regular response.
  pub async fn fetch(&self, request: Request) -> Result<WireResponse> {
    let response = self
      .client
      .get(request.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", request.url, e))?
      .to_vec();

    Ok(WireResponse {
      status,
      content_type,
      body,
    })
  }
}

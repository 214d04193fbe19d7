//! Request and response types for the offline cache manager.

use url::Url;

/// How a request was issued by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// A page navigation (address bar, link, reload).
  Navigate,
  /// A subresource fetch (script, style, image, data).
  Resource,
}

/// One outgoing request intercepted by the worker.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: Url,
  pub mode: RequestMode,
}

impl Request {
  pub fn navigation(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::Navigate,
    }
  }

  pub fn resource(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::Resource,
    }
  }

  /// Only HTTP(S) requests are ever intercepted.
  pub fn is_http(&self) -> bool {
    matches!(self.url.scheme(), "http" | "https")
  }
}

/// A response body as it moves between network, cache, and caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl WireResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Synthetic 503 for an uncached external resource while offline.
  pub fn offline_stub() -> Self {
    Self {
      status: 503,
      content_type: None,
      body: b"Offline".to_vec(),
    }
  }

  /// Synthetic 503 with a plain-text notice for uncached app resources.
  pub fn offline_notice() -> Self {
    Self {
      status: 503,
      content_type: Some("text/plain".to_string()),
      body: b"You are offline and this resource has not been saved.".to_vec(),
    }
  }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  /// Live network response.
  Network,
  /// Entry from the current cache generation.
  Cache,
  /// Substitute response fabricated by the worker.
  Synthetic,
}

/// Outcome of routing one intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// The worker produced a response for the page.
  Served {
    response: WireResponse,
    source: ServedFrom,
  },
  /// Non-HTTP request, left untouched for default handling.
  PassThrough,
}

impl FetchOutcome {
  pub fn served(response: WireResponse, source: ServedFrom) -> Self {
    Self::Served { response, source }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_http_schemes_are_interceptable() {
    let http = Request::resource(Url::parse("http://example.com/a.js").unwrap());
    let https = Request::resource(Url::parse("https://example.com/a.js").unwrap());
    let ext = Request::resource(Url::parse("chrome-extension://abc/a.js").unwrap());

    assert!(http.is_http());
    assert!(https.is_http());
    assert!(!ext.is_http());
  }

  #[test]
  fn synthetic_responses_are_503() {
    assert_eq!(WireResponse::offline_stub().status, 503);
    let notice = WireResponse::offline_notice();
    assert_eq!(notice.status, 503);
    assert_eq!(notice.content_type.as_deref(), Some("text/plain"));
  }
}

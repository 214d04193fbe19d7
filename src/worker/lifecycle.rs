//! Install/update lifecycle and per-request routing for the offline cache
//! manager.
//!
//! One `ServiceWorker` value models one installed worker generation as an
//! explicit state machine: `Installing` pre-caches the critical-asset
//! manifest into the new generation, `Activating` sweeps every other
//! generation and claims open clients, and only `Active` routes requests.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::cache::CacheStore;
use super::routes::{RouteClass, RoutePolicy};
use super::types::{FetchOutcome, Request, RequestMode, ServedFrom, WireResponse};

/// Lifecycle state of one worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  Activating,
  Active,
}

/// The offline cache manager for one deployed version.
pub struct ServiceWorker<C: CacheStore> {
  cache: Arc<C>,
  /// Tag of the generation this worker owns.
  version: String,
  /// Origin of the app shell; only same-origin responses enter the cache on
  /// the network-first path.
  origin: url::Origin,
  /// Root document served as the SPA entry point for uncached navigations.
  root_document: Url,
  /// Fixed build-time manifest of critical assets to pre-cache.
  precache_manifest: Vec<Url>,
  policy: RoutePolicy,
  state: WorkerState,
  clients_claimed: bool,
}

impl<C: CacheStore> ServiceWorker<C> {
  /// Create a worker generation in the `Installing` state.
  pub fn new(
    version: impl Into<String>,
    root_document: Url,
    precache_manifest: Vec<Url>,
    policy: RoutePolicy,
    cache: C,
  ) -> Self {
    Self {
      cache: Arc::new(cache),
      version: version.into(),
      origin: root_document.origin(),
      root_document,
      precache_manifest,
      policy,
      state: WorkerState::Installing,
      clients_claimed: false,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Whether this generation has claimed the open clients.
  pub fn clients_claimed(&self) -> bool {
    self.clients_claimed
  }

  /// Install: open the new generation and pre-cache the manifest.
  ///
  /// Each manifest fetch is attempted independently; a failed asset is
  /// logged and skipped so it cannot abort the rest. Installation always
  /// completes and immediately requests activation without waiting for old
  /// pages to close.
  pub async fn install<F, Fut>(&mut self, fetch: F) -> Result<()>
  where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<WireResponse>>,
  {
    if self.state != WorkerState::Installing {
      return Err(eyre!("install called in state {:?}", self.state));
    }

    self.cache.open_generation(&self.version)?;
    info!(version = %self.version, "Pre-caching critical assets");

    // Each asset is fetched independently so one failure cannot stop the rest.
    let fetches = self.precache_manifest.iter().map(|url| {
      let fut = fetch(Request::resource(url.clone()));
      async move { (url, fut.await) }
    });

    for (url, result) in join_all(fetches).await {
      match result {
        Ok(response) if response.is_success() => {
          if let Err(e) = self.cache.put(&self.version, url, &response) {
            warn!(%url, "Failed to cache pre-cache asset: {}", e);
          }
        }
        Ok(response) => {
          warn!(%url, status = response.status, "Pre-cache fetch returned error status");
        }
        Err(e) => {
          warn!(%url, "Pre-cache fetch failed: {}", e);
        }
      }
    }

    // Skip waiting: the new generation requests activation immediately.
    self.state = WorkerState::Activating;
    Ok(())
  }

  /// Activate: sweep every generation whose tag is not ours, then claim the
  /// open clients so they route through this worker without a reload.
  pub fn activate(&mut self) -> Result<()> {
    if self.state != WorkerState::Activating {
      return Err(eyre!("activate called in state {:?}", self.state));
    }

    for tag in self.cache.generations()? {
      if tag != self.version {
        info!(old = %tag, "Clearing old cache generation");
        self.cache.delete_generation(&tag)?;
      }
    }

    self.clients_claimed = true;
    self.state = WorkerState::Active;
    Ok(())
  }

  /// Route one intercepted request. Only valid once `Active`.
  ///
  /// Never fails for request-level reasons: network and cache errors degrade
  /// to cached or synthetic responses.
  pub async fn handle_fetch<F, Fut>(&self, request: Request, fetch: F) -> Result<FetchOutcome>
  where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Result<WireResponse>>,
  {
    if self.state != WorkerState::Active {
      return Err(eyre!("handle_fetch called in state {:?}", self.state));
    }

    if !request.is_http() {
      return Ok(FetchOutcome::PassThrough);
    }

    match self.policy.classify(&request.url) {
      RouteClass::CacheFirst => Ok(self.cache_first(request, fetch).await),
      RouteClass::NetworkFirst => Ok(self.network_first(request, fetch).await),
    }
  }

  /// Class A: serve the cached entry when present, accepting staleness;
  /// otherwise fetch, cache successful responses, and degrade to a synthetic
  /// 503 when offline with nothing cached.
  async fn cache_first<F, Fut>(&self, request: Request, fetch: F) -> FetchOutcome
  where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Result<WireResponse>>,
  {
    if let Some(hit) = self.lookup(&request.url) {
      return FetchOutcome::served(hit, ServedFrom::Cache);
    }

    let url = request.url.clone();
    match fetch(request).await {
      Ok(response) => {
        if response.is_success() {
          self.store(&url, &response);
        }
        FetchOutcome::served(response, ServedFrom::Network)
      }
      Err(e) => {
        warn!(%url, "Fetch failed for external resource: {}", e);
        FetchOutcome::served(WireResponse::offline_stub(), ServedFrom::Synthetic)
      }
    }
  }

  /// Class B: prefer the network and keep the cache fresh with successful
  /// same-origin responses; offline, fall back to the cached entry, then to
  /// the cached root document for navigations, then to a synthetic 503.
  async fn network_first<F, Fut>(&self, request: Request, fetch: F) -> FetchOutcome
  where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Result<WireResponse>>,
  {
    let url = request.url.clone();
    let mode = request.mode;

    match fetch(request).await {
      Ok(response) => {
        if response.is_success() && url.origin() == self.origin {
          self.store(&url, &response);
        }
        FetchOutcome::served(response, ServedFrom::Network)
      }
      Err(_) => {
        if let Some(hit) = self.lookup(&url) {
          return FetchOutcome::served(hit, ServedFrom::Cache);
        }

        if mode == RequestMode::Navigate {
          // Treat the cached root document as the SPA entry point for any
          // uncached route.
          if let Some(root) = self.lookup(&self.root_document) {
            return FetchOutcome::served(root, ServedFrom::Cache);
          }
        }

        FetchOutcome::served(WireResponse::offline_notice(), ServedFrom::Synthetic)
      }
    }
  }

  /// Cache lookup that absorbs storage errors into a miss.
  fn lookup(&self, url: &Url) -> Option<WireResponse> {
    match self.cache.get(&self.version, url) {
      Ok(hit) => hit,
      Err(e) => {
        warn!(%url, "Cache lookup failed: {}", e);
        None
      }
    }
  }

  /// Cache write that absorbs storage errors.
  fn store(&self, url: &Url, response: &WireResponse) {
    if let Err(e) = self.cache.put(&self.version, url, response) {
      warn!(%url, "Failed to cache response: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::worker::cache::MemoryCacheStore;
  use std::sync::atomic::{AtomicUsize, Ordering};

  const ROOT: &str = "https://app.local/index.html";

  fn worker() -> ServiceWorker<MemoryCacheStore> {
    worker_with_version("relato-v1")
  }

  fn worker_with_version(version: &str) -> ServiceWorker<MemoryCacheStore> {
    let root = Url::parse(ROOT).unwrap();
    let manifest = vec![
      root.clone(),
      Url::parse("https://app.local/manifest.json").unwrap(),
      Url::parse("https://cdn.tailwindcss.com/").unwrap(),
    ];
    ServiceWorker::new(
      version,
      root,
      manifest,
      RoutePolicy::default(),
      MemoryCacheStore::new(),
    )
  }

  fn ok_response(body: &str) -> WireResponse {
    WireResponse {
      status: 200,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  async fn installed() -> ServiceWorker<MemoryCacheStore> {
    let mut worker = worker();
    worker
      .install(|_req| async { Ok(ok_response("asset")) })
      .await
      .unwrap();
    worker.activate().unwrap();
    worker
  }

  #[tokio::test]
  async fn install_precaches_manifest_and_requests_activation() {
    let mut worker = worker();
    assert_eq!(worker.state(), WorkerState::Installing);

    worker
      .install(|req| async move { Ok(ok_response(req.url.as_str())) })
      .await
      .unwrap();

    assert_eq!(worker.state(), WorkerState::Activating);
    let root = Url::parse(ROOT).unwrap();
    assert!(worker.cache.get("relato-v1", &root).unwrap().is_some());
  }

  #[tokio::test]
  async fn failed_precache_asset_does_not_abort_install() {
    let mut worker = worker();
    worker
      .install(|req| async move {
        if req.url.path().ends_with("manifest.json") {
          Err(eyre!("connection refused"))
        } else {
          Ok(ok_response("asset"))
        }
      })
      .await
      .unwrap();

    assert_eq!(worker.state(), WorkerState::Activating);
    let root = Url::parse(ROOT).unwrap();
    let manifest = Url::parse("https://app.local/manifest.json").unwrap();
    assert!(worker.cache.get("relato-v1", &root).unwrap().is_some());
    assert!(worker.cache.get("relato-v1", &manifest).unwrap().is_none());
  }

  #[tokio::test]
  async fn activation_sweeps_every_other_generation() {
    let mut worker = worker_with_version("relato-v2");
    let old_url = Url::parse("https://app.local/old.js").unwrap();
    worker.cache.open_generation("relato-v1").unwrap();
    worker
      .cache
      .put("relato-v1", &old_url, &ok_response("old"))
      .unwrap();

    worker
      .install(|_req| async { Ok(ok_response("asset")) })
      .await
      .unwrap();
    worker.activate().unwrap();

    assert_eq!(worker.state(), WorkerState::Active);
    assert!(worker.clients_claimed());
    assert!(worker.cache.get("relato-v1", &old_url).unwrap().is_none());
    assert_eq!(
      worker.cache.generations().unwrap(),
      vec!["relato-v2".to_string()]
    );
  }

  #[tokio::test]
  async fn fetch_before_active_is_an_error() {
    let worker = worker();
    let request = Request::resource(Url::parse("https://app.local/app.js").unwrap());
    let result = worker
      .handle_fetch(request, |_req| async { Ok(ok_response("x")) })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn non_http_requests_pass_through() {
    let worker = installed().await;
    let request = Request::resource(Url::parse("chrome-extension://abc/panel.js").unwrap());
    let outcome = worker
      .handle_fetch(request, |_req| async { Ok(ok_response("x")) })
      .await
      .unwrap();
    assert_eq!(outcome, FetchOutcome::PassThrough);
  }

  #[tokio::test]
  async fn class_a_hit_skips_the_network() {
    let worker = installed().await;
    let lib = Url::parse("https://esm.sh/react@19").unwrap();
    let calls = AtomicUsize::new(0);

    // First request populates the cache from the network.
    let outcome = worker
      .handle_fetch(Request::resource(lib.clone()), |_req| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(ok_response("lib")) }
      })
      .await
      .unwrap();
    assert!(matches!(
      outcome,
      FetchOutcome::Served {
        source: ServedFrom::Network,
        ..
      }
    ));

    // Second request must not touch the network, even though it would fail.
    let outcome = worker
      .handle_fetch(Request::resource(lib), |_req| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(eyre!("network unavailable")) }
      })
      .await
      .unwrap();
    match outcome {
      FetchOutcome::Served { response, source } => {
        assert_eq!(source, ServedFrom::Cache);
        assert_eq!(response.body, b"lib");
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn class_a_miss_offline_yields_synthetic_503() {
    let worker = installed().await;
    let lib = Url::parse("https://esm.sh/uncached@1").unwrap();

    let outcome = worker
      .handle_fetch(Request::resource(lib), |_req| async {
        Err(eyre!("network unavailable"))
      })
      .await
      .unwrap();

    match outcome {
      FetchOutcome::Served { response, source } => {
        assert_eq!(source, ServedFrom::Synthetic);
        assert_eq!(response.status, 503);
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn class_a_error_status_is_returned_but_not_cached() {
    let worker = installed().await;
    let lib = Url::parse("https://esm.sh/broken@1").unwrap();

    let outcome = worker
      .handle_fetch(Request::resource(lib.clone()), |_req| async {
        Ok(WireResponse {
          status: 404,
          content_type: None,
          body: Vec::new(),
        })
      })
      .await
      .unwrap();
    assert!(matches!(
      outcome,
      FetchOutcome::Served {
        source: ServedFrom::Network,
        ..
      }
    ));
    assert!(worker.cache.get("relato-v1", &lib).unwrap().is_none());
  }

  #[tokio::test]
  async fn class_b_success_updates_the_cached_entry() {
    let worker = installed().await;
    let app = Url::parse("https://app.local/app.js").unwrap();

    worker
      .handle_fetch(Request::resource(app.clone()), |_req| async {
        Ok(ok_response("v1"))
      })
      .await
      .unwrap();
    worker
      .handle_fetch(Request::resource(app.clone()), |_req| async {
        Ok(ok_response("v2"))
      })
      .await
      .unwrap();

    let cached = worker.cache.get("relato-v1", &app).unwrap().unwrap();
    assert_eq!(cached.body, b"v2");
  }

  #[tokio::test]
  async fn class_b_does_not_cache_cross_origin_responses() {
    let worker = installed().await;
    let other = Url::parse("https://other.example/data.json").unwrap();

    worker
      .handle_fetch(Request::resource(other.clone()), |_req| async {
        Ok(ok_response("cross"))
      })
      .await
      .unwrap();

    assert!(worker.cache.get("relato-v1", &other).unwrap().is_none());
  }

  #[tokio::test]
  async fn class_b_offline_falls_back_to_cached_entry() {
    let worker = installed().await;
    let app = Url::parse("https://app.local/app.js").unwrap();

    worker
      .handle_fetch(Request::resource(app.clone()), |_req| async {
        Ok(ok_response("last-known-good"))
      })
      .await
      .unwrap();

    let outcome = worker
      .handle_fetch(Request::resource(app), |_req| async {
        Err(eyre!("network unavailable"))
      })
      .await
      .unwrap();

    match outcome {
      FetchOutcome::Served { response, source } => {
        assert_eq!(source, ServedFrom::Cache);
        assert_eq!(response.body, b"last-known-good");
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn offline_navigation_falls_back_to_cached_root_document() {
    let worker = installed().await;
    let route = Url::parse("https://app.local/reports/42").unwrap();

    let outcome = worker
      .handle_fetch(Request::navigation(route), |_req| async {
        Err(eyre!("network unavailable"))
      })
      .await
      .unwrap();

    match outcome {
      FetchOutcome::Served { response, source } => {
        assert_eq!(source, ServedFrom::Cache);
        // Pre-cached root document stands in for the uncached route.
        assert_eq!(response.body, b"asset");
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn offline_non_navigation_miss_yields_offline_notice() {
    let worker = installed().await;
    let data = Url::parse("https://app.local/api/none").unwrap();

    let outcome = worker
      .handle_fetch(Request::resource(data), |_req| async {
        Err(eyre!("network unavailable"))
      })
      .await
      .unwrap();

    match outcome {
      FetchOutcome::Served { response, source } => {
        assert_eq!(source, ServedFrom::Synthetic);
        assert_eq!(response, WireResponse::offline_notice());
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }
}

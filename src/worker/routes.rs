//! Per-request routing policy: which caching strategy a URL gets.

use url::Url;

/// The two request classes the worker distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
  /// Versioned or external library and static-image resources: availability
  /// beats freshness.
  CacheFirst,
  /// App shell, navigations, local scripts: freshness beats availability.
  NetworkFirst,
}

/// Hostname and extension heuristics for classifying requests.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
  /// Substring matches against the request hostname (CDN and font hosts).
  cdn_hosts: Vec<String>,
  /// Path extensions treated as static images.
  image_extensions: Vec<String>,
}

impl Default for RoutePolicy {
  fn default() -> Self {
    Self {
      cdn_hosts: ["esm.sh", "tailwindcss", "google"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
      image_extensions: ["png", "jpg", "jpeg", "gif", "webp", "svg"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
  }
}

impl RoutePolicy {
  pub fn new(cdn_hosts: Vec<String>, image_extensions: Vec<String>) -> Self {
    Self {
      cdn_hosts,
      image_extensions,
    }
  }

  pub fn classify(&self, url: &Url) -> RouteClass {
    if let Some(host) = url.host_str() {
      if self.cdn_hosts.iter().any(|fragment| host.contains(fragment.as_str())) {
        return RouteClass::CacheFirst;
      }
    }

    if let Some(extension) = path_extension(url.path()) {
      if self
        .image_extensions
        .iter()
        .any(|e| e.eq_ignore_ascii_case(extension))
      {
        return RouteClass::CacheFirst;
      }
    }

    RouteClass::NetworkFirst
  }
}

fn path_extension(path: &str) -> Option<&str> {
  let file = path.rsplit('/').next()?;
  match file.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() => Some(ext),
    _ => None,
  }
}

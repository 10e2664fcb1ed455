//! Classification of outgoing requests into cache routes.

use reqwest::Method;

use super::http::Request;

/// How the offline cache treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Data-store or auth read: api partition, cache-first
  Api,
  /// Any other read: lookup across partitions, stored in the static partition
  Static,
  /// Writes and other non-GET requests go straight to the network
  Bypass,
}

/// Path-prefix rules that decide which requests count as API traffic.
///
/// A prefix matches on whole path segments: `rest/v1` matches
/// `/rest/v1/projects` but not `/blog/rest/v1` or `/rest/v1-notes`.
#[derive(Debug, Clone)]
pub struct RouteTable {
  api_prefixes: Vec<Vec<String>>,
}

impl RouteTable {
  pub fn new<I, S>(api_prefixes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let api_prefixes = api_prefixes
      .into_iter()
      .map(|p| segments(p.as_ref()))
      .filter(|segs| !segs.is_empty())
      .collect();

    Self { api_prefixes }
  }

  pub fn classify(&self, request: &Request) -> Route {
    if request.method != Method::GET {
      return Route::Bypass;
    }

    let path = segments(request.url.path());
    let is_api = self
      .api_prefixes
      .iter()
      .any(|prefix| path.len() >= prefix.len() && path[..prefix.len()] == prefix[..]);

    if is_api {
      Route::Api
    } else {
      Route::Static
    }
  }
}

fn segments(path: &str) -> Vec<String> {
  path
    .split('/')
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

//! Result metadata shared by cached lookups.

/// Result from a cached lookup, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Data freshly fetched from the data store.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Data served from the in-memory cache.
  pub fn from_memory(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Memory,
    }
  }

  /// Bundled content served because the data store could not be reached.
  pub fn defaults(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Defaults,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the data store (possibly answered by the offline cache)
  Network,
  /// Served from the in-memory TTL cache
  Memory,
  /// Fetch failed, bundled defaults returned instead
  Defaults,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Network => "network",
      Self::Memory => "memory",
      Self::Defaults => "defaults",
    };
    f.write_str(label)
  }
}

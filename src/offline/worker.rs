//! Offline worker: install, activate and per-request fetch handling.

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::http::{Request, Response};
use super::network::Network;
use super::route::{Route, RouteTable};
use super::storage::ResourceStore;

/// Names of the two live partitions for one cache version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
  pub static_name: String,
  pub api_name: String,
}

impl PartitionNames {
  /// Both names are derived from the same version so they are always bumped together.
  pub fn for_version(version: &str) -> Self {
    Self {
      static_name: format!("portfolio-static-{}", version),
      api_name: format!("portfolio-api-{}", version),
    }
  }

  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_name || name == self.api_name
  }
}

/// One row of [`OfflineWorker::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
  pub name: String,
  pub entries: usize,
  pub bytes: usize,
  pub current: bool,
}

/// Settings the worker is built from.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
  pub partitions: PartitionNames,
  pub routes: RouteTable,
  /// Base against which manifest paths are resolved
  pub origin: Url,
  /// Paths eagerly cached by [`OfflineWorker::install`]
  pub manifest: Vec<String>,
}

/// Intercepts requests between the application and the network.
///
/// Data-store reads are answered from the api partition when possible; other
/// reads from any partition. Only status 200 responses are ever stored, and a
/// network failure on a miss is returned to the caller unchanged.
///
/// The first `fetch` activates the worker, so partitions left by an older
/// version are gone before any request can be answered from them.
pub struct OfflineWorker<N: Network> {
  store: Arc<dyn ResourceStore>,
  network: N,
  options: WorkerOptions,
  /// Static-partition writes still running in the background
  pending: Mutex<JoinSet<()>>,
  /// Set once `activate` has run
  active: OnceCell<()>,
}

impl<N: Network> OfflineWorker<N> {
  pub fn new(store: Arc<dyn ResourceStore>, network: N, options: WorkerOptions) -> Self {
    Self {
      store,
      network,
      options,
      pending: Mutex::new(JoinSet::new()),
      active: OnceCell::new(),
    }
  }

  pub fn partitions(&self) -> &PartitionNames {
    &self.options.partitions
  }

  /// Whether the static partition for the current version exists.
  pub fn is_installed(&self) -> Result<bool> {
    let names = self.store.partition_names()?;
    Ok(names.contains(&self.options.partitions.static_name))
  }

  /// Pre-populate the static partition with every manifest asset.
  ///
  /// All assets are fetched first; if any fetch errors or returns anything but
  /// 200, nothing from this attempt is stored and the error is returned.
  pub async fn install(&self) -> Result<usize> {
    let static_name = &self.options.partitions.static_name;
    self.store.open_partition(static_name)?;

    let requests = self
      .options
      .manifest
      .iter()
      .map(|path| {
        self
          .options
          .origin
          .join(path)
          .map(Request::get)
          .map_err(|e| eyre!("Invalid manifest path {}: {}", path, e))
      })
      .collect::<Result<Vec<_>>>()?;

    let responses =
      futures::future::try_join_all(requests.iter().map(|r| self.network.send(r))).await?;

    if let Some((request, response)) = requests
      .iter()
      .zip(&responses)
      .find(|(_, response)| !response.is_cacheable())
    {
      return Err(eyre!(
        "Install failed: {} returned status {}",
        request.url,
        response.status
      ));
    }

    let entries: Vec<(Request, Response)> = requests.into_iter().zip(responses).collect();
    self.store.put_all(static_name, &entries)?;

    info!(partition = %static_name, assets = entries.len(), "installed offline manifest");
    Ok(entries.len())
  }

  /// Delete every partition that does not belong to the current version.
  pub async fn activate(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for name in self.store.partition_names()? {
      if self.options.partitions.is_current(&name) {
        continue;
      }
      if self.store.delete_partition(&name)? {
        info!(partition = %name, "deleted stale offline partition");
        deleted.push(name);
      }
    }

    // Fails only while the first fetch is activating, which sets it anyway
    let _ = self.active.set(());
    Ok(deleted)
  }

  async fn ensure_active(&self) -> Result<()> {
    self
      .active
      .get_or_try_init(|| async {
        self.activate().await?;
        Ok::<(), color_eyre::Report>(())
      })
      .await?;
    Ok(())
  }

  /// Handle one outgoing request.
  pub async fn fetch(&self, request: Request) -> Result<Response> {
    self.ensure_active().await?;

    match self.options.routes.classify(&request) {
      Route::Api => self.fetch_api(&request).await,
      Route::Static => self.fetch_static(request).await,
      Route::Bypass => self.network.send(&request).await,
    }
  }

  async fn fetch_api(&self, request: &Request) -> Result<Response> {
    let api_name = &self.options.partitions.api_name;

    match self.store.lookup(api_name, request) {
      Ok(Some(cached)) => {
        debug!(url = %request.url, "api cache hit");
        return Ok(cached);
      }
      Ok(None) => debug!(url = %request.url, "api cache miss"),
      Err(e) => warn!(url = %request.url, "api cache lookup failed: {}", e),
    }

    let response = self.network.send(request).await?;
    if response.is_cacheable() {
      if let Err(e) = self.store.put(api_name, request, &response) {
        warn!(url = %request.url, "failed to cache api response: {}", e);
      }
    }

    Ok(response)
  }

  async fn fetch_static(&self, request: Request) -> Result<Response> {
    match self.store.lookup_any(&request) {
      Ok(Some(cached)) => {
        debug!(url = %request.url, "static cache hit");
        return Ok(cached);
      }
      Ok(None) => debug!(url = %request.url, "static cache miss"),
      Err(e) => warn!(url = %request.url, "static cache lookup failed: {}", e),
    }

    let response = self.network.send(&request).await?;
    if response.is_cacheable() {
      let to_cache = response.clone();
      let store = Arc::clone(&self.store);
      let partition = self.options.partitions.static_name.clone();

      match self.pending.lock() {
        Ok(mut pending) => {
          while pending.try_join_next().is_some() {}
          pending.spawn_blocking(move || {
            if let Err(e) = store.put(&partition, &request, &to_cache) {
              warn!(url = %request.url, "failed to cache static response: {}", e);
            }
          });
        }
        Err(e) => warn!("Lock poisoned, static response not cached: {}", e),
      }
    }

    Ok(response)
  }

  /// Wait for all background cache writes started so far.
  pub async fn settle(&self) -> Result<()> {
    let mut pending = {
      let mut guard = self
        .pending
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      std::mem::take(&mut *guard)
    };

    while let Some(joined) = pending.join_next().await {
      if let Err(e) = joined {
        warn!("background cache write did not finish: {}", e);
      }
    }

    Ok(())
  }

  /// Forget the api-partition entry for `request`.
  pub fn evict(&self, request: &Request) -> Result<bool> {
    self
      .store
      .remove(&self.options.partitions.api_name, request)
  }

  /// Entry counts for every stored partition.
  pub fn status(&self) -> Result<Vec<PartitionInfo>> {
    let infos = self
      .store
      .stats()?
      .into_iter()
      .map(|s| PartitionInfo {
        current: self.options.partitions.is_current(&s.name),
        name: s.name,
        entries: s.entries,
        bytes: s.bytes,
      })
      .collect();

    Ok(infos)
  }
}

//! Portfolio data access with an in-memory TTL cache in front of the data store.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cache::{CacheResult, TtlCache};
use crate::offline::{Network, OfflineWorker};
use crate::perf::PerformanceMonitor;

use super::client::SupabaseClient;
use super::defaults;
use super::error::DataStoreError;
use super::types::{
  AuthUser, Certification, CvFile, Education, PortfolioData, Profile, Project, Record, Skill,
};

const PORTFOLIO_KEY: &str = "portfolio_data";
const PORTFOLIO_TIMER: &str = "portfolio_data_fetch";
const CV_BUCKET: &str = "cv-files";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// How [`PortfolioClient`] behaves.
#[derive(Debug, Clone)]
pub struct ClientOptions {
  /// Lifetime of cached data in memory
  pub ttl: Duration,
  /// Serve bundled defaults instead of failing when the data store is unreachable
  pub fallback_to_defaults: bool,
}

/// Portfolio data access with transparent caching.
///
/// Reads check the in-memory cache before going to the data store (and,
/// below that, the offline cache). Successful writes clear the in-memory
/// cache and evict the affected listing from the offline cache.
pub struct PortfolioClient<N: Network> {
  inner: SupabaseClient<N>,
  cache: Mutex<TtlCache<Value>>,
  monitor: Mutex<PerformanceMonitor>,
  options: ClientOptions,
}

impl<N: Network> PortfolioClient<N> {
  pub fn new(inner: SupabaseClient<N>, cache: TtlCache<Value>, options: ClientOptions) -> Self {
    Self {
      inner,
      cache: Mutex::new(cache),
      monitor: Mutex::new(PerformanceMonitor::new()),
      options,
    }
  }

  pub fn worker(&self) -> &OfflineWorker<N> {
    self.inner.worker()
  }

  /// Whether admin operations can be attempted at all.
  pub fn is_signed_in(&self) -> bool {
    self.inner.has_access_token()
  }

  fn cache(&self) -> Result<MutexGuard<'_, TtlCache<Value>>> {
    self.cache.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn monitor(&self) -> Result<MutexGuard<'_, PerformanceMonitor>> {
    self.monitor.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let Some(value) = self.cache()?.get(key) else {
      return Ok(None);
    };

    match serde_json::from_value(value) {
      Ok(data) => Ok(Some(data)),
      Err(e) => {
        warn!(key, "Ignoring unreadable cache entry: {}", e);
        Ok(None)
      }
    }
  }

  fn remember<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
    let value = serde_json::to_value(data)
      .map_err(|e| eyre!("Failed to serialize {} for caching: {}", key, e))?;

    let mut cache = self.cache()?;
    let purged = cache.purge_expired();
    if purged > 0 {
      debug!(purged, remaining = cache.len(), "dropped expired cache entries");
    }
    cache.set(key, value, Some(self.options.ttl));
    Ok(())
  }

  /// Everything the public site shows.
  ///
  /// If the fetch fails and defaults are enabled, the bundled content is
  /// returned with [`CacheSource::Defaults`](crate::cache::CacheSource::Defaults)
  /// so callers can tell it apart from real data.
  pub async fn portfolio(&self) -> Result<CacheResult<PortfolioData>> {
    self.monitor()?.start_timer(PORTFOLIO_TIMER);
    let result = self.load_portfolio().await;
    self.monitor()?.end_timer(PORTFOLIO_TIMER);

    match result {
      Ok(found) => Ok(found),
      Err(e) if self.options.fallback_to_defaults => {
        warn!("Failed to fetch portfolio data, using defaults: {}", e);
        Ok(CacheResult::defaults(defaults::portfolio()))
      }
      Err(e) => Err(e),
    }
  }

  async fn load_portfolio(&self) -> Result<CacheResult<PortfolioData>> {
    if let Some(data) = self.cached::<PortfolioData>(PORTFOLIO_KEY)? {
      return Ok(CacheResult::from_memory(data));
    }

    let (profile, projects, skills, education, certifications) = futures::join!(
      self.inner.first_profile(),
      self.inner.list::<Project>(),
      self.inner.list::<Skill>(),
      self.inner.list::<Education>(),
      self.inner.list::<Certification>(),
    );
    let profile = profile.map(|p| p.unwrap_or_else(defaults::profile));

    if !self.options.fallback_to_defaults {
      let data = PortfolioData {
        profile: profile?,
        projects: projects?,
        skills: skills?,
        education: education?,
        certifications: certifications?,
      };
      self.remember(PORTFOLIO_KEY, &data)?;
      return Ok(CacheResult::from_network(data));
    }

    let all_failed = profile.is_err()
      && projects.is_err()
      && skills.is_err()
      && education.is_err()
      && certifications.is_err();
    if all_failed {
      return Err(eyre!("No portfolio collection could be fetched"));
    }

    // Collections that failed are replaced one by one with bundled content
    let fallback = defaults::portfolio();
    let mut failed = Vec::new();
    let data = PortfolioData {
      profile: or_default("profile", profile, fallback.profile, &mut failed),
      projects: or_default(Project::TABLE, projects, fallback.projects, &mut failed),
      skills: or_default(Skill::TABLE, skills, fallback.skills, &mut failed),
      education: or_default(Education::TABLE, education, fallback.education, &mut failed),
      certifications: or_default(
        Certification::TABLE,
        certifications,
        fallback.certifications,
        &mut failed,
      ),
    };

    // Partial results are not kept, so the next call retries the failed ones
    if failed.is_empty() {
      self.remember(PORTFOLIO_KEY, &data)?;
    }
    Ok(CacheResult::from_network(data))
  }

  /// Drop everything cached in memory and fetch again.
  pub async fn refresh(&self) -> Result<CacheResult<PortfolioData>> {
    self.cache()?.clear();
    self.portfolio().await
  }

  /// Rows of one table, cached under the table name.
  pub async fn list<T: Record>(&self) -> Result<CacheResult<Vec<T>>> {
    if let Some(rows) = self.cached::<Vec<T>>(T::TABLE)? {
      return Ok(CacheResult::from_memory(rows));
    }

    let rows = self.inner.list::<T>().await?;
    self.remember(T::TABLE, &rows)?;
    Ok(CacheResult::from_network(rows))
  }

  pub async fn add<T: Record>(&self, record: &T) -> Result<T> {
    let created = self.inner.insert(record).await?;
    self.invalidate::<T>()?;
    Ok(created)
  }

  pub async fn update<T: Record>(&self, id: &str, patch: &Value) -> Result<T> {
    let updated = self.inner.update::<T>(id, patch).await?;
    self.invalidate::<T>()?;
    Ok(updated)
  }

  pub async fn delete<T: Record>(&self, id: &str) -> Result<()> {
    self.inner.delete::<T>(id).await?;
    self.invalidate::<T>()
  }

  /// The user the current access token belongs to.
  ///
  /// The stored auth response is dropped first: it is keyed by URL alone and
  /// may belong to a previously configured token.
  pub async fn signed_in_user(&self) -> Result<AuthUser> {
    self.inner.worker().evict(&self.inner.current_user_request()?)?;
    self.inner.current_user().await
  }

  /// Profile of the user the access token belongs to.
  pub async fn my_profile(&self) -> Result<Option<Profile>> {
    let user = self.signed_in_user().await?;
    self.inner.profile_for(&user.id).await
  }

  /// Create or update the signed-in user's profile.
  pub async fn update_profile(&self, patch: &Value) -> Result<Profile> {
    let user = self.signed_in_user().await?;
    let profile = self.inner.upsert_profile(&user.id, patch).await?;

    self.cache()?.clear();
    self.inner.worker().evict(&self.inner.first_profile_request()?)?;
    self.inner.worker().evict(&self.inner.profile_request(&user.id)?)?;
    Ok(profile)
  }

  /// Store a new CV and make it the active one.
  pub async fn upload_cv(&self, filename: &str, bytes: Vec<u8>) -> Result<CvFile> {
    if !bytes.starts_with(PDF_MAGIC) {
      return Err(DataStoreError::InvalidUpload(format!("{} is not a PDF file", filename)).into());
    }

    let user = self.signed_in_user().await?;
    let object_path = format!("{}/cv_{}.pdf", user.id, &content_hash(&bytes)[..16]);
    let file_size = bytes.len() as u64;

    self
      .inner
      .upload_object(CV_BUCKET, &object_path, bytes, "application/pdf")
      .await?;
    let public_url = self.inner.public_url(CV_BUCKET, &object_path)?;

    self
      .inner
      .update_matching::<CvFile>("user_id", &user.id, &serde_json::json!({"is_active": false}))
      .await?;

    let record = CvFile {
      id: String::new(),
      filename: filename.to_string(),
      file_path: public_url.to_string(),
      file_size,
      is_active: true,
      user_id: Some(user.id),
      uploaded_at: None,
    };
    self.add(&record).await
  }

  /// Uploaded CVs, newest first.
  pub async fn list_cv_files(&self) -> Result<Vec<CvFile>> {
    Ok(self.list::<CvFile>().await?.data)
  }

  /// Completed timers.
  pub fn metrics(&self) -> Result<BTreeMap<String, std::time::Duration>> {
    Ok(self.monitor()?.all_metrics())
  }

  fn invalidate<T: Record>(&self) -> Result<()> {
    self.cache()?.clear();
    self.inner.worker().evict(&self.inner.list_request::<T>()?)?;
    Ok(())
  }
}

fn or_default<T>(what: &str, result: Result<T>, fallback: T, failed: &mut Vec<String>) -> T {
  match result {
    Ok(data) => data,
    Err(e) => {
      warn!(collection = what, "Failed to fetch, using bundled content: {}", e);
      failed.push(what.to_string());
      fallback
    }
  }
}

/// Hex SHA-256 of `bytes`, used for content-addressed object names.
fn content_hash(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, ManualClock};
  use crate::offline::testing::FakeNetwork;
  use crate::offline::{PartitionNames, Response, RouteTable, SqliteStore, WorkerOptions};
  use chrono::{DateTime, Utc};
  use serde_json::json;
  use std::sync::Arc;
  use url::Url;

  const REST: &str = "https://abc.supabase.co/rest/v1";

  struct Harness {
    client: PortfolioClient<Arc<FakeNetwork>>,
    network: Arc<FakeNetwork>,
    clock: Arc<ManualClock>,
  }

  fn harness(token: Option<&str>, fallback: bool) -> Harness {
    let network = Arc::new(FakeNetwork::new());
    let worker = OfflineWorker::new(
      Arc::new(SqliteStore::in_memory().unwrap()),
      network.clone(),
      WorkerOptions {
        partitions: PartitionNames::for_version("v1"),
        routes: RouteTable::new(["rest/v1", "auth/v1"]),
        origin: Url::parse("https://site.dev/").unwrap(),
        manifest: Vec::new(),
      },
    );
    let inner = SupabaseClient::new(
      Arc::new(worker),
      "https://abc.supabase.co",
      "anon".to_string(),
      token.map(String::from),
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let client = PortfolioClient::new(
      inner,
      TtlCache::with_clock(clock.clone()),
      ClientOptions {
        ttl: Duration::minutes(5),
        fallback_to_defaults: fallback,
      },
    );

    Harness {
      client,
      network,
      clock,
    }
  }

  fn projects_url() -> String {
    format!("{}/projects?select=*&order=order_index.asc", REST)
  }

  fn serve_portfolio(network: &FakeNetwork) {
    network.route(
      &format!("{}/profiles?select=*&limit=1", REST),
      Response::new(200, r#"[{"id":"pr1","full_name":"Ada Lovelace"}]"#),
    );
    network.route(
      &projects_url(),
      Response::new(
        200,
        r#"[{"id":"p1","title":"Engine","description":"Analytical","tech_stack":["Brass"],"github_url":null,"live_url":null,"featured":true,"order_index":1}]"#,
      ),
    );
    network.route(
      &format!("{}/skills?select=*&order=category.asc%2Corder_index.asc", REST),
      Response::new(200, r#"[{"id":"s1","name":"Rust","category":"backend","order_index":1}]"#),
    );
    network.route(
      &format!("{}/education?select=*&order=order_index.asc", REST),
      Response::new(200, "[]"),
    );
    network.route(
      &format!("{}/certifications?select=*&order=order_index.asc", REST),
      Response::new(200, "[]"),
    );
  }

  #[tokio::test]
  async fn test_portfolio_fetches_then_serves_from_memory() {
    let h = harness(None, true);
    serve_portfolio(&h.network);

    let first = h.client.portfolio().await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data.profile.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(first.data.projects[0].title, "Engine");
    assert_eq!(h.network.total_calls(), 5);

    let second = h.client.portfolio().await.unwrap();
    assert_eq!(second.source, CacheSource::Memory);
    assert_eq!(second.data, first.data);
    assert_eq!(h.network.total_calls(), 5);
    assert!(h.client.metrics().unwrap().contains_key("portfolio_data_fetch"));
  }

  #[tokio::test]
  async fn test_expired_memory_falls_through_to_offline_cache() {
    let h = harness(None, true);
    serve_portfolio(&h.network);
    h.client.portfolio().await.unwrap();

    h.clock.advance(Duration::minutes(6));
    h.network.set_offline(true);

    let again = h.client.portfolio().await.unwrap();
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(again.data.profile.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(h.network.total_calls(), 5);
  }

  #[tokio::test]
  async fn test_missing_profile_uses_default_profile() {
    let h = harness(None, false);
    serve_portfolio(&h.network);
    h.network.route(
      &format!("{}/profiles?select=*&limit=1", REST),
      Response::new(200, "[]"),
    );

    let result = h.client.portfolio().await.unwrap();
    assert_eq!(result.data.profile, defaults::profile());
    assert_eq!(result.data.projects.len(), 1);
  }

  #[tokio::test]
  async fn test_unreachable_store_returns_defaults_when_enabled() {
    let h = harness(None, true);
    h.network.set_offline(true);

    let result = h.client.portfolio().await.unwrap();
    assert_eq!(result.source, CacheSource::Defaults);
    assert_eq!(result.data, defaults::portfolio());
  }

  #[tokio::test]
  async fn test_unreachable_store_is_an_error_when_fallback_disabled() {
    let h = harness(None, false);
    h.network.set_offline(true);

    assert!(h.client.portfolio().await.is_err());
  }

  #[tokio::test]
  async fn test_refresh_bypasses_memory() {
    let h = harness(None, true);
    serve_portfolio(&h.network);
    h.client.portfolio().await.unwrap();

    let refreshed = h.client.refresh().await.unwrap();
    assert_eq!(refreshed.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_delete_invalidates_both_caches() {
    let h = harness(Some("tok"), true);
    serve_portfolio(&h.network);
    h.network.route(&format!("{}/projects?id=eq.p1", REST), Response::new(204, ""));

    let listed = h.client.list::<Project>().await.unwrap();
    assert_eq!(listed.source, CacheSource::Network);
    assert_eq!(h.network.calls(&projects_url()), 1);

    h.client.delete::<Project>("p1").await.unwrap();
    h.network.route(&projects_url(), Response::new(200, "[]"));

    let listed = h.client.list::<Project>().await.unwrap();
    assert_eq!(listed.source, CacheSource::Network);
    assert!(listed.data.is_empty());
    assert_eq!(h.network.calls(&projects_url()), 2);
  }

  #[tokio::test]
  async fn test_admin_write_without_token_fails() {
    let h = harness(None, true);
    let patch = json!({"title": "x"});

    let err = h.client.update::<Project>("p1", &patch).await.unwrap_err();
    assert!(matches!(
      err.downcast_ref::<DataStoreError>(),
      Some(DataStoreError::Unauthenticated)
    ));
  }

  #[tokio::test]
  async fn test_upload_cv_rejects_non_pdf() {
    let h = harness(Some("tok"), true);

    let err = h
      .client
      .upload_cv("cv.docx", b"PK\x03\x04".to_vec())
      .await
      .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<DataStoreError>(),
      Some(DataStoreError::InvalidUpload(_))
    ));
    assert_eq!(h.network.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_upload_cv_stores_object_and_activates_record() {
    let h = harness(Some("tok"), true);
    let pdf = b"%PDF-1.7 minimal".to_vec();
    let object = format!("u1/cv_{}.pdf", &content_hash(&pdf)[..16]);

    h.network.route(
      "https://abc.supabase.co/auth/v1/user",
      Response::new(200, r#"{"id":"u1","email":"ada@example.com"}"#),
    );
    h.network.route(
      &format!("https://abc.supabase.co/storage/v1/object/cv-files/{}", object),
      Response::new(200, r#"{"Key":"cv-files"}"#),
    );
    h.network.route(
      &format!("{}/cv_files?user_id=eq.u1", REST),
      Response::new(204, ""),
    );
    h.network.route(
      &format!("{}/cv_files", REST),
      Response::new(
        201,
        format!(
          r#"[{{"id":"cv1","filename":"cv.pdf","file_path":"https://abc.supabase.co/storage/v1/object/public/cv-files/{}","file_size":16,"is_active":true,"user_id":"u1"}}]"#,
          object
        ),
      ),
    );

    let cv = h.client.upload_cv("cv.pdf", pdf).await.unwrap();
    assert_eq!(cv.id, "cv1");
    assert!(cv.is_active);

    let sent = h.network.sent();
    let methods: Vec<&str> = sent.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["GET", "POST", "PATCH", "POST"]);

    let inserted: Value = serde_json::from_slice(sent[3].body.as_ref().unwrap()).unwrap();
    assert_eq!(inserted[0]["file_size"], 16);
    assert_eq!(inserted[0]["is_active"], true);
    assert!(inserted[0]["file_path"]
      .as_str()
      .unwrap()
      .ends_with(&object));
  }

  fn certifications_url() -> String {
    format!("{}/certifications?select=*&order=order_index.asc", REST)
  }

  #[tokio::test]
  async fn test_failed_collection_falls_back_alone() {
    let h = harness(None, true);
    serve_portfolio(&h.network);
    h.network.route(&certifications_url(), Response::new(404, "missing"));

    let result = h.client.portfolio().await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.profile.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(result.data.projects[0].title, "Engine");
    assert_eq!(
      result.data.certifications,
      defaults::portfolio().certifications
    );

    // Partial data is not kept in memory, so the failed collection is retried
    let again = h.client.portfolio().await.unwrap();
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(h.network.calls(&certifications_url()), 2);
    assert_eq!(h.network.calls(&projects_url()), 1);
  }

  #[tokio::test]
  async fn test_failed_collection_is_an_error_when_fallback_disabled() {
    let h = harness(None, false);
    serve_portfolio(&h.network);
    h.network.route(&certifications_url(), Response::new(404, "missing"));

    let err = h.client.portfolio().await.unwrap_err();
    assert!(matches!(
      err.downcast_ref::<DataStoreError>(),
      Some(DataStoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_unreadable_memory_entry_is_refetched() {
    let h = harness(None, true);
    serve_portfolio(&h.network);
    h.client
      .cache()
      .unwrap()
      .set(PORTFOLIO_KEY, json!("not a portfolio"), None);

    let result = h.client.portfolio().await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(h.network.total_calls(), 5);

    let again = h.client.portfolio().await.unwrap();
    assert_eq!(again.source, CacheSource::Memory);
  }

  #[tokio::test]
  async fn test_update_profile_uses_current_identity_and_clears_memory() {
    let h = harness(Some("tok"), true);
    serve_portfolio(&h.network);
    let user_url = "https://abc.supabase.co/auth/v1/user";
    h.network.route(user_url, Response::new(200, r#"{"id":"u1"}"#));
    h.network.route(
      &format!("{}/profiles?select=*&user_id=eq.u1", REST),
      Response::new(200, "[]"),
    );
    assert!(h.client.my_profile().await.unwrap().is_none());
    h.client.portfolio().await.unwrap();

    // The token now belongs to a different user
    h.network.route(
      user_url,
      Response::new(200, r#"{"id":"u2","email":"grace@example.com"}"#),
    );
    h.network.route(
      &format!("{}/profiles?on_conflict=user_id", REST),
      Response::new(201, r#"[{"id":"pr2","user_id":"u2","full_name":"Grace"}]"#),
    );

    let profile = h
      .client
      .update_profile(&json!({"full_name": "Grace"}))
      .await
      .unwrap();
    assert_eq!(profile.user_id.as_deref(), Some("u2"));

    let sent = h.network.sent();
    let upsert = sent.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let body: Value = serde_json::from_slice(upsert.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["user_id"], "u2");

    h.network.route(
      &format!("{}/profiles?select=*&limit=1", REST),
      Response::new(200, r#"[{"id":"pr2","full_name":"Grace"}]"#),
    );
    let after = h.client.portfolio().await.unwrap();
    assert_eq!(after.source, CacheSource::Network);
    assert_eq!(after.data.profile.full_name.as_deref(), Some("Grace"));

    let user = h.client.signed_in_user().await.unwrap();
    assert_eq!(user.email.as_deref(), Some("grace@example.com"));
  }
}

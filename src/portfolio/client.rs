//! Data-store client speaking the PostgREST dialect.
//!
//! Every request goes through the offline worker, so reads may be answered
//! from the offline cache without reaching the network.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::offline::{Network, OfflineWorker, Request, Response};

use super::error::DataStoreError;
use super::types::{AuthUser, Profile, Record};

const REST_PATH: &str = "rest/v1/";
const AUTH_USER_PATH: &str = "auth/v1/user";
const STORAGE_PATH: &str = "storage/v1/object/";

/// Data-store client
pub struct SupabaseClient<N: Network> {
  worker: Arc<OfflineWorker<N>>,
  base: Url,
  anon_key: String,
  access_token: Option<String>,
}

impl<N: Network> SupabaseClient<N> {
  pub fn new(
    worker: Arc<OfflineWorker<N>>,
    url: &str,
    anon_key: String,
    access_token: Option<String>,
  ) -> Result<Self> {
    let mut base = Url::parse(url).map_err(|e| eyre!("Invalid data store URL {}: {}", url, e))?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    Ok(Self {
      worker,
      base,
      anon_key,
      access_token,
    })
  }

  pub fn worker(&self) -> &OfflineWorker<N> {
    &self.worker
  }

  pub fn has_access_token(&self) -> bool {
    self.access_token.is_some()
  }

  fn require_token(&self) -> Result<(), DataStoreError> {
    match self.access_token {
      Some(_) => Ok(()),
      None => Err(DataStoreError::Unauthenticated),
    }
  }

  fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url> {
    self.endpoint(&format!("{}{}", REST_PATH, table), query)
  }

  fn authorize(&self, request: Request) -> Request {
    let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
    request
      .header("apikey", self.anon_key.clone())
      .header("Authorization", format!("Bearer {}", bearer))
      .header("Accept", "application/json")
  }

  fn json_request<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: &B) -> Result<Request> {
    let body = serde_json::to_vec(body).map_err(|e| eyre!("Failed to serialize body: {}", e))?;
    Ok(
      Request::new(method, url)
        .header("Content-Type", "application/json")
        .body(body),
    )
  }

  async fn send(&self, request: Request) -> Result<Response> {
    let response = self.worker.fetch(self.authorize(request)).await?;
    if !response.is_success() {
      return Err(DataStoreError::from_status(response.status, &response.text()).into());
    }
    Ok(response)
  }

  fn parse<T: DeserializeOwned>(response: &Response) -> Result<T> {
    serde_json::from_slice(&response.body)
      .map_err(|e| DataStoreError::InvalidResponse(e.to_string()).into())
  }

  fn single<T: DeserializeOwned>(response: &Response, what: &str) -> Result<T> {
    Self::parse::<Vec<T>>(response)?
      .into_iter()
      .next()
      .ok_or_else(|| DataStoreError::NotFound(what.to_string()).into())
  }

  /// Read request for a full table listing. Its identity is stable, which lets
  /// callers evict exactly the entry `list` populated.
  pub fn list_request<T: Record>(&self) -> Result<Request> {
    let url = self.table_url(T::TABLE, &[("select", "*"), ("order", T::ORDER)])?;
    Ok(Request::get(url))
  }

  pub fn first_profile_request(&self) -> Result<Request> {
    let url = self.table_url(Profile::TABLE, &[("select", "*"), ("limit", "1")])?;
    Ok(Request::get(url))
  }

  pub fn profile_request(&self, user_id: &str) -> Result<Request> {
    let filter = format!("eq.{}", user_id);
    let url = self.table_url(Profile::TABLE, &[("select", "*"), ("user_id", filter.as_str())])?;
    Ok(Request::get(url))
  }

  /// All rows of `T`'s table in display order.
  pub async fn list<T: Record>(&self) -> Result<Vec<T>> {
    let response = self.send(self.list_request::<T>()?).await?;
    Self::parse(&response)
  }

  /// The first stored profile, used by the public site.
  pub async fn first_profile(&self) -> Result<Option<Profile>> {
    let response = self.send(self.first_profile_request()?).await?;
    Ok(Self::parse::<Vec<Profile>>(&response)?.into_iter().next())
  }

  /// The profile owned by `user_id`, if one exists.
  pub async fn profile_for(&self, user_id: &str) -> Result<Option<Profile>> {
    let response = self.send(self.profile_request(user_id)?).await?;
    Ok(Self::parse::<Vec<Profile>>(&response)?.into_iter().next())
  }

  /// Auth read is keyed by URL only, not by token.
  pub fn current_user_request(&self) -> Result<Request> {
    Ok(Request::get(self.endpoint(AUTH_USER_PATH, &[])?))
  }

  /// The user the access token belongs to.
  pub async fn current_user(&self) -> Result<AuthUser> {
    self.require_token()?;
    let response = self.send(self.current_user_request()?).await?;
    Self::parse(&response)
  }

  pub async fn insert<T: Record>(&self, record: &T) -> Result<T> {
    self.require_token()?;
    let url = self.table_url(T::TABLE, &[])?;
    let request = self
      .json_request(Method::POST, url, &[record])?
      .header("Prefer", "return=representation");

    let response = self.send(request).await?;
    Self::single(&response, T::TABLE)
  }

  pub async fn update<T: Record>(&self, id: &str, patch: &Value) -> Result<T> {
    self.require_token()?;
    let filter = format!("eq.{}", id);
    let url = self.table_url(T::TABLE, &[("id", filter.as_str())])?;
    let patch = if T::TOUCH_ON_UPDATE {
      touch(patch)
    } else {
      patch.clone()
    };
    let request = self
      .json_request(Method::PATCH, url, &patch)?
      .header("Prefer", "return=representation");

    let response = self.send(request).await?;
    Self::single(&response, &format!("{} {}", T::TABLE, id))
  }

  /// Apply `patch` to every row where `column` equals `value`.
  pub async fn update_matching<T: Record>(&self, column: &str, value: &str, patch: &Value) -> Result<()> {
    self.require_token()?;
    let filter = format!("eq.{}", value);
    let url = self.table_url(T::TABLE, &[(column, filter.as_str())])?;
    let request = self
      .json_request(Method::PATCH, url, patch)?
      .header("Prefer", "return=minimal");

    self.send(request).await?;
    Ok(())
  }

  pub async fn delete<T: Record>(&self, id: &str) -> Result<()> {
    self.require_token()?;
    let filter = format!("eq.{}", id);
    let url = self.table_url(T::TABLE, &[("id", filter.as_str())])?;

    self.send(Request::new(Method::DELETE, url)).await?;
    Ok(())
  }

  /// Insert or merge the profile owned by `user_id`.
  pub async fn upsert_profile(&self, user_id: &str, patch: &Value) -> Result<Profile> {
    self.require_token()?;
    let mut body = touch(patch);
    if let Value::Object(map) = &mut body {
      map.remove("id");
      map.insert("user_id".to_string(), Value::String(user_id.to_string()));
    }

    let url = self.table_url(Profile::TABLE, &[("on_conflict", "user_id")])?;
    let request = self
      .json_request(Method::POST, url, &body)?
      .header("Prefer", "resolution=merge-duplicates,return=representation");

    let response = self.send(request).await?;
    Self::single(&response, Profile::TABLE)
  }

  /// Upload a binary object to storage.
  pub async fn upload_object(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<()> {
    self.require_token()?;
    let url = self.endpoint(&format!("{}{}/{}", STORAGE_PATH, bucket, path), &[])?;
    let request = Request::new(Method::POST, url)
      .header("Content-Type", content_type)
      .body(bytes);

    self.send(request).await?;
    Ok(())
  }

  /// Public download URL for a stored object.
  pub fn public_url(&self, bucket: &str, path: &str) -> Result<Url> {
    self.endpoint(&format!("{}public/{}/{}", STORAGE_PATH, bucket, path), &[])
  }
}

/// Copy of `patch` with `updated_at` set to now.
fn touch(patch: &Value) -> Value {
  let mut patch = patch.clone();
  if let Value::Object(map) = &mut patch {
    map.insert(
      "updated_at".to_string(),
      Value::String(Utc::now().to_rfc3339()),
    );
  }
  patch
}

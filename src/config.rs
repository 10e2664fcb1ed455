use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub supabase: SupabaseConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
  /// Project URL, e.g. https://abc.supabase.co
  pub url: String,
  /// Public anon key (can be overridden with FOLIO_SUPABASE_ANON_KEY)
  pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Lifetime of in-memory entries, in seconds
  pub ttl_secs: u64,
  /// Serve bundled content when the data store can't be reached
  pub fallback_to_defaults: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: 5 * 60,
      fallback_to_defaults: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
  /// Store responses on disk; when false every request goes to the network
  pub enabled: bool,
  /// Bump to retire every partition written by an older version
  pub version: String,
  /// Site origin the manifest paths are resolved against
  pub origin: Option<String>,
  /// Assets fetched eagerly on install
  pub manifest: Vec<String>,
  /// Path prefixes treated as data-store / auth traffic
  pub api_prefixes: Vec<String>,
  /// Database file (default: $XDG_DATA_HOME/folio/offline.db)
  pub database: Option<PathBuf>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      version: "v1".to_string(),
      origin: None,
      manifest: [
        "/",
        "/index.html",
        "/static/js/bundle.js",
        "/static/css/main.css",
        "/profile.jpg",
        "/favicon.ico",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      api_prefixes: vec!["rest/v1".to_string(), "auth/v1".to_string()],
      database: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./folio.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/folio/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/folio/config.yaml\n\
                 with at least a `supabase.url` entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("folio.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("folio").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Data-store anon key: FOLIO_SUPABASE_ANON_KEY, else the config file.
  pub fn anon_key(&self) -> Result<String> {
    std::env::var("FOLIO_SUPABASE_ANON_KEY")
      .ok()
      .or_else(|| self.supabase.anon_key.clone())
      .ok_or_else(|| {
        eyre!("Anon key not found. Set supabase.anon_key or FOLIO_SUPABASE_ANON_KEY.")
      })
  }

  /// Access token for admin operations, from FOLIO_ACCESS_TOKEN.
  pub fn access_token() -> Option<String> {
    std::env::var("FOLIO_ACCESS_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache.ttl_secs as i64)
  }

  /// Where the offline cache database lives.
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.offline.database {
      Some(path) => Ok(path.clone()),
      None => Ok(Self::data_dir()?.join("offline.db")),
    }
  }

  /// Directory for log files.
  pub fn log_dir() -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("logs"))
  }

  fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("folio"))
  }
}

use crate::cache::{CacheSource, TtlCache};
use crate::cli::{AdminTarget, CollectionCommand, Command, CvAction, OfflineAction, RecordAction, Section};
use crate::config::Config;
use crate::offline::{
  HttpNetwork, NoopStore, OfflineWorker, PartitionNames, Request, ResourceStore, RouteTable,
  SqliteStore, WorkerOptions,
};
use crate::portfolio::{
  Certification, ClientOptions, Education, PortfolioClient, PortfolioData, Profile, Project,
  Record, Skill, SupabaseClient,
};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Main application state
pub struct App {
  config: Config,
  client: PortfolioClient<HttpNetwork>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let store: Arc<dyn ResourceStore> = if config.offline.enabled {
      let path = config.database_path()?;
      info!(path = %path.display(), "opening offline cache");
      Arc::new(SqliteStore::open(&path)?)
    } else {
      Arc::new(NoopStore)
    };

    let origin = config
      .offline
      .origin
      .as_deref()
      .unwrap_or(&config.supabase.url);
    let origin = Url::parse(origin).map_err(|e| eyre!("Invalid origin {}: {}", origin, e))?;

    let worker = OfflineWorker::new(
      store,
      HttpNetwork::new()?,
      WorkerOptions {
        partitions: PartitionNames::for_version(&config.offline.version),
        routes: RouteTable::new(&config.offline.api_prefixes),
        origin,
        manifest: config.offline.manifest.clone(),
      },
    );

    let inner = SupabaseClient::new(
      Arc::new(worker),
      &config.supabase.url,
      config.anon_key()?,
      Config::access_token(),
    )?;

    let client = PortfolioClient::new(
      inner,
      TtlCache::new(),
      ClientOptions {
        ttl: config.ttl(),
        fallback_to_defaults: config.cache.fallback_to_defaults,
      },
    );

    Ok(Self { config, client })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    if !matches!(command, Command::Offline { .. }) {
      self.prepare_offline().await?;
    }
    let result = self.dispatch(command).await;

    // Let background cache writes land before the runtime shuts down
    self.client.worker().settle().await?;
    result
  }

  /// Install the current version's assets when they are missing, e.g. after
  /// `offline.version` was bumped. Old partitions are dropped by the worker
  /// on its first fetch.
  async fn prepare_offline(&self) -> Result<()> {
    let worker = self.client.worker();
    if !self.config.offline.enabled
      || self.config.offline.origin.is_none()
      || worker.is_installed()?
    {
      return Ok(());
    }

    match worker.install().await {
      Ok(stored) => info!(stored, "installed offline assets for new version"),
      Err(e) => warn!("Offline install failed, continuing without it: {}", e),
    }
    Ok(())
  }

  async fn dispatch(&self, command: Command) -> Result<()> {
    match command {
      Command::Show { section, json } => self.show(section, json).await,
      Command::Offline { action } => self.offline(action).await,
      Command::Admin { target } => {
        self.require_sign_in()?;
        match target {
          AdminTarget::Profile { patch } => self.profile(patch).await,
          AdminTarget::Collection(collection) => self.collection(collection).await,
        }
      }
      Command::Cv { action } => {
        self.require_sign_in()?;
        self.cv(action).await
      }
      Command::Metrics => self.metrics().await,
    }
  }

  fn require_sign_in(&self) -> Result<()> {
    if self.client.is_signed_in() {
      Ok(())
    } else {
      Err(eyre!("Admin commands need an access token. Set FOLIO_ACCESS_TOKEN."))
    }
  }

  async fn show(&self, section: Option<Section>, json: bool) -> Result<()> {
    let result = self.client.portfolio().await?;
    if result.source == CacheSource::Defaults {
      eprintln!("warning: data store unreachable, showing bundled content");
    }

    if json {
      let value = section_json(&result.data, section)?;
      println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
      print!("{}", render_portfolio(&result.data, section));
    }
    Ok(())
  }

  async fn offline(&self, action: OfflineAction) -> Result<()> {
    let worker = self.client.worker();

    match action {
      OfflineAction::Install => {
        if self.config.offline.origin.is_none() {
          return Err(eyre!("offline.origin must be set to install site assets"));
        }
        let stored = worker.install().await?;
        println!(
          "Stored {} assets in {}",
          stored,
          worker.partitions().static_name
        );
      }
      OfflineAction::Activate => {
        let deleted = worker.activate().await?;
        if deleted.is_empty() {
          println!("No stale partitions");
        }
        for name in deleted {
          println!("Deleted {}", name);
        }
      }
      OfflineAction::Status => {
        let partitions = worker.status()?;
        if partitions.is_empty() {
          println!("Offline cache is empty");
        }
        for p in partitions {
          println!(
            "{:<32} {:>6} entries {:>10} bytes{}",
            p.name,
            p.entries,
            p.bytes,
            if p.current { "" } else { "  (stale)" }
          );
        }
      }
      OfflineAction::Get { url, body } => {
        let url = Url::parse(&url).map_err(|e| eyre!("Invalid URL {}: {}", url, e))?;
        let response = worker.fetch(Request::get(url)).await?;
        if body {
          print!("{}", response.text());
        } else {
          println!(
            "{} {} ({} bytes)",
            response.status,
            response.header("content-type").unwrap_or("-"),
            response.body.len()
          );
        }
      }
    }

    Ok(())
  }

  async fn profile(&self, patch: Option<String>) -> Result<()> {
    let user = self.client.signed_in_user().await?;
    eprintln!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));

    match patch {
      Some(patch) => {
        let patch = parse_json(&patch)?;
        let profile = self.client.update_profile(&patch).await?;
        println!("{}", serde_json::to_string_pretty(&profile)?);
      }
      None => match self.client.my_profile().await? {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("No profile yet"),
      },
    }
    Ok(())
  }

  async fn collection(&self, command: CollectionCommand) -> Result<()> {
    match command {
      CollectionCommand::Projects { action } => self.records::<Project>(action).await,
      CollectionCommand::Skills { action } => self.records::<Skill>(action).await,
      CollectionCommand::Education { action } => self.records::<Education>(action).await,
      CollectionCommand::Certifications { action } => {
        self.records::<Certification>(action).await
      }
    }
  }

  async fn records<T: Record>(&self, action: RecordAction) -> Result<()> {
    match action {
      RecordAction::List => {
        for record in self.client.list::<T>().await?.data {
          println!("{}", serde_json::to_string(&record)?);
        }
      }
      RecordAction::Add { json } => {
        let record: T = serde_json::from_str(&json)
          .map_err(|e| eyre!("Invalid {} record: {}", T::TABLE, e))?;
        let created = self.client.add(&record).await?;
        println!("Created {} {}", T::TABLE, created.id());
      }
      RecordAction::Update { id, json } => {
        let updated: T = self.client.update(&id, &parse_json(&json)?).await?;
        println!("Updated {} {}", T::TABLE, updated.id());
      }
      RecordAction::Delete { id } => {
        self.client.delete::<T>(&id).await?;
        println!("Deleted {} {}", T::TABLE, id);
      }
    }
    Ok(())
  }

  async fn cv(&self, action: CvAction) -> Result<()> {
    match action {
      CvAction::List => {
        for cv in self.client.list_cv_files().await? {
          println!(
            "{} {:<30} {:>9} bytes  {}",
            if cv.is_active { "*" } else { " " },
            cv.filename,
            cv.file_size,
            cv.file_path
          );
        }
      }
      CvAction::Upload { file } => {
        let bytes = std::fs::read(&file)
          .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
        let filename = file
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_else(|| "cv.pdf".to_string());

        let cv = self.client.upload_cv(&filename, bytes).await?;
        println!("Uploaded {} -> {}", cv.filename, cv.file_path);
      }
    }
    Ok(())
  }

  async fn metrics(&self) -> Result<()> {
    let result = self.client.portfolio().await?;
    println!("source: {}", result.source);

    for (name, elapsed) in self.client.metrics()? {
      println!("{}: {:.2}ms", name, elapsed.as_secs_f64() * 1000.0);
    }
    Ok(())
  }
}

fn parse_json(input: &str) -> Result<Value> {
  let value: Value = serde_json::from_str(input).map_err(|e| eyre!("Invalid JSON: {}", e))?;
  if !value.is_object() {
    return Err(eyre!("Expected a JSON object, got {}", input));
  }
  Ok(value)
}

fn section_json(data: &PortfolioData, section: Option<Section>) -> Result<Value> {
  let value = match section {
    None => serde_json::to_value(data)?,
    Some(Section::Profile) => serde_json::to_value(&data.profile)?,
    Some(Section::Projects) => serde_json::to_value(&data.projects)?,
    Some(Section::Skills) => serde_json::to_value(&data.skills)?,
    Some(Section::Education) => serde_json::to_value(&data.education)?,
    Some(Section::Certifications) => serde_json::to_value(&data.certifications)?,
  };
  Ok(value)
}

fn render_portfolio(data: &PortfolioData, section: Option<Section>) -> String {
  let wants = |s: Section| section.is_none() || section == Some(s);
  let mut out = String::new();

  if wants(Section::Profile) {
    render_profile(&mut out, &data.profile);
  }

  if wants(Section::Projects) {
    let _ = writeln!(out, "\nProjects");
    for p in &data.projects {
      let star = if p.featured { " *" } else { "" };
      let _ = writeln!(out, "  {}{}", p.title, star);
      let _ = writeln!(out, "    {}", p.description);
      if !p.tech_stack.is_empty() {
        let _ = writeln!(out, "    [{}]", p.tech_stack.join(", "));
      }
    }
  }

  if wants(Section::Skills) {
    let _ = writeln!(out, "\nSkills");
    let mut current = None;
    for s in &data.skills {
      if current != Some(s.category) {
        let _ = writeln!(out, "  {}:", s.category);
        current = Some(s.category);
      }
      let _ = writeln!(out, "    {}", s.name);
    }
  }

  if wants(Section::Education) {
    let _ = writeln!(out, "\nEducation");
    for e in &data.education {
      let _ = writeln!(out, "  {}, {} ({})", e.degree, e.institution, e.period);
    }
  }

  if wants(Section::Certifications) {
    let _ = writeln!(out, "\nCertifications");
    for c in &data.certifications {
      let _ = writeln!(out, "  {} ({})", c.name, c.year);
    }
  }

  out
}

fn render_profile(out: &mut String, profile: &Profile) {
  let name = profile.full_name.as_deref().unwrap_or("(unnamed)");
  let _ = writeln!(out, "{}", name);
  if let Some(title) = &profile.hero_title {
    let _ = writeln!(out, "{}", title);
  }
  if let Some(bio) = &profile.bio {
    let _ = writeln!(out, "\n{}", bio);
  }
  for link in [&profile.github_url, &profile.linkedin_url, &profile.twitter_url]
    .into_iter()
    .flatten()
  {
    let _ = writeln!(out, "  {}", link);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::portfolio::defaults;

  #[test]
  fn test_render_single_section() {
    let data = defaults::portfolio();
    let text = render_portfolio(&data, Some(Section::Certifications));

    assert!(text.starts_with("\nCertifications"));
    assert!(!text.contains("Projects"));
    assert_eq!(text.lines().count(), 2 + data.certifications.len());
  }

  #[test]
  fn test_render_groups_skills_by_category() {
    let data = defaults::portfolio();
    let text = render_portfolio(&data, Some(Section::Skills));

    let headers = text.lines().filter(|l| l.ends_with(':')).count();
    let mut categories: Vec<_> = data.skills.iter().map(|s| s.category).collect();
    categories.dedup();
    assert_eq!(headers, categories.len());
  }

  #[test]
  fn test_section_json_picks_one_list() {
    let data = defaults::portfolio();
    let value = section_json(&data, Some(Section::Projects)).unwrap();

    assert_eq!(value.as_array().unwrap().len(), data.projects.len());
  }

  #[test]
  fn test_parse_json_requires_object() {
    assert!(parse_json(r#"{"title":"x"}"#).is_ok());
    assert!(parse_json("[1,2]").is_err());
    assert!(parse_json("not json").is_err());
  }
}

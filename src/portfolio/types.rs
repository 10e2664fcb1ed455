use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A row type stored in one data-store table.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Table name in the data store
  const TABLE: &'static str;

  /// PostgREST `order` clause used when listing
  const ORDER: &'static str = "order_index.asc";

  /// Whether updates stamp `updated_at`
  const TOUCH_ON_UPDATE: bool = true;

  fn id(&self) -> &str;
}

/// Owner profile shown in the hero and about sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  pub full_name: Option<String>,
  pub email: Option<String>,
  pub bio: Option<String>,
  pub avatar_url: Option<String>,
  pub years_of_experience: Option<u32>,
  pub hero_title: Option<String>,
  pub hero_description: Option<String>,
  pub github_url: Option<String>,
  pub linkedin_url: Option<String>,
  pub twitter_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  pub title: String,
  pub description: String,
  #[serde(default)]
  pub tech_stack: Vec<String>,
  pub github_url: Option<String>,
  pub live_url: Option<String>,
  #[serde(default)]
  pub video_url: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub featured: bool,
  #[serde(default)]
  pub order_index: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
  Frontend,
  Backend,
  Tools,
}

impl std::fmt::Display for SkillCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Frontend => "frontend",
      Self::Backend => "backend",
      Self::Tools => "tools",
    };
    f.write_str(label)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  pub name: String,
  pub category: SkillCategory,
  #[serde(default)]
  pub order_index: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  pub degree: String,
  pub institution: String,
  #[serde(default)]
  pub location: String,
  /// Free-form span, e.g. "2018 - 2022"
  #[serde(default)]
  pub period: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub achievements: Vec<String>,
  #[serde(default)]
  pub order_index: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  pub name: String,
  pub year: String,
  #[serde(default)]
  pub order_index: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Uploaded CV document. At most one per user is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvFile {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id: String,
  pub filename: String,
  /// Public download URL
  pub file_path: String,
  pub file_size: u64,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uploaded_at: Option<DateTime<Utc>>,
}

/// The signed-in user as reported by the auth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
  pub id: String,
  pub email: Option<String>,
}

/// Everything the public site renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioData {
  pub profile: Profile,
  pub projects: Vec<Project>,
  pub skills: Vec<Skill>,
  pub education: Vec<Education>,
  pub certifications: Vec<Certification>,
}

impl Record for Profile {
  const TABLE: &'static str = "profiles";

  fn id(&self) -> &str {
    &self.id
  }
}

impl Record for Project {
  const TABLE: &'static str = "projects";

  fn id(&self) -> &str {
    &self.id
  }
}

impl Record for Skill {
  const TABLE: &'static str = "skills";
  const ORDER: &'static str = "category.asc,order_index.asc";
  const TOUCH_ON_UPDATE: bool = false;

  fn id(&self) -> &str {
    &self.id
  }
}

impl Record for Education {
  const TABLE: &'static str = "education";

  fn id(&self) -> &str {
    &self.id
  }
}

impl Record for Certification {
  const TABLE: &'static str = "certifications";

  fn id(&self) -> &str {
    &self.id
  }
}

impl Record for CvFile {
  const TABLE: &'static str = "cv_files";
  const ORDER: &'static str = "uploaded_at.desc";
  const TOUCH_ON_UPDATE: bool = false;

  fn id(&self) -> &str {
    &self.id
  }
}

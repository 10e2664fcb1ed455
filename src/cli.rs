//! Command-line arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Portfolio data client with in-memory and offline caching")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/folio/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Also log to stderr
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show the public portfolio
  Show {
    /// Only this section
    #[arg(short, long, value_enum)]
    section: Option<Section>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
  },

  /// Manage the offline response cache
  Offline {
    #[command(subcommand)]
    action: OfflineAction,
  },

  /// Create, update and delete portfolio records (needs FOLIO_ACCESS_TOKEN)
  Admin {
    #[command(subcommand)]
    target: AdminTarget,
  },

  /// Manage uploaded CVs (needs FOLIO_ACCESS_TOKEN)
  Cv {
    #[command(subcommand)]
    action: CvAction,
  },

  /// Fetch the portfolio once and print timing information
  Metrics,
}

#[derive(Subcommand, Debug)]
pub enum OfflineAction {
  /// Pre-populate the static partition from the manifest
  Install,
  /// Delete partitions from older versions
  Activate,
  /// List stored partitions
  Status,
  /// Fetch a URL through the offline cache
  Get {
    url: String,

    /// Write the response body to stdout
    #[arg(long)]
    body: bool,
  },
}

#[derive(Subcommand, Debug)]
pub enum AdminTarget {
  /// Edit the signed-in user's profile with a JSON patch
  Profile { patch: Option<String> },

  /// Work with one collection
  #[command(flatten)]
  Collection(CollectionCommand),
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
  Projects {
    #[command(subcommand)]
    action: RecordAction,
  },
  Skills {
    #[command(subcommand)]
    action: RecordAction,
  },
  Education {
    #[command(subcommand)]
    action: RecordAction,
  },
  Certifications {
    #[command(subcommand)]
    action: RecordAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum RecordAction {
  List,
  /// Insert a record given as JSON
  Add { json: String },
  /// Apply a JSON patch to the record with this id
  Update { id: String, json: String },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CvAction {
  List,
  /// Upload a PDF and make it the active CV
  Upload { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Section {
  Profile,
  Projects,
  Skills,
  Education,
  Certifications,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_show_with_section() {
    let args = Args::parse_from(["folio", "show", "--section", "skills", "--json"]);
    assert!(matches!(
      args.command,
      Command::Show {
        section: Some(Section::Skills),
        json: true
      }
    ));
  }

  #[test]
  fn test_admin_collection_update() {
    let args = Args::parse_from(["folio", "admin", "projects", "update", "p1", r#"{"featured":true}"#]);
    let Command::Admin {
      target: AdminTarget::Collection(CollectionCommand::Projects {
        action: RecordAction::Update { id, json },
      }),
    } = args.command
    else {
      panic!("expected admin projects update");
    };
    assert_eq!(id, "p1");
    assert_eq!(json, r#"{"featured":true}"#);
  }

  #[test]
  fn test_global_config_flag_after_subcommand() {
    let args = Args::parse_from(["folio", "offline", "status", "--config", "/tmp/f.yaml"]);
    assert_eq!(args.config, Some(PathBuf::from("/tmp/f.yaml")));
    assert!(matches!(
      args.command,
      Command::Offline {
        action: OfflineAction::Status
      }
    ));
  }

  #[test]
  fn test_unknown_collection_is_rejected() {
    assert!(Args::try_parse_from(["folio", "admin", "blogposts", "list"]).is_err());
  }

  #[test]
  fn test_cli_definition_is_valid() {
    use clap::CommandFactory;
    Args::command().debug_assert();
  }
}

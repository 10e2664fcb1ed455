pub mod cached_client;
pub mod client;
pub mod defaults;
pub mod error;
pub mod types;

pub use cached_client::{ClientOptions, PortfolioClient};
pub use client::SupabaseClient;
pub use types::{Certification, Education, PortfolioData, Profile, Project, Record, Skill};

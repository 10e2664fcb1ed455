//! Bundled content shown before data arrives or when the data store is unreachable.

use super::types::{
  Certification, Education, PortfolioData, Profile, Project, Skill, SkillCategory,
};

pub fn profile() -> Profile {
  Profile {
    full_name: Some("John Doe".to_string()),
    email: Some("john.doe@example.com".to_string()),
    bio: Some(
      "Full-stack developer who enjoys building efficient, scalable systems and \
       picking up new tools along the way."
        .to_string(),
    ),
    avatar_url: Some("/profile.jpg".to_string()),
    years_of_experience: Some(3),
    hero_title: Some("Full-Stack Developer".to_string()),
    hero_description: Some(
      "Building reliable software with modern tools and clean code".to_string(),
    ),
    github_url: Some("https://github.com/johndoe".to_string()),
    linkedin_url: Some("https://linkedin.com/in/johndoe".to_string()),
    twitter_url: Some("https://twitter.com/johndoe".to_string()),
    ..Profile::default()
  }
}

fn project(id: &str, title: &str, description: &str, stack: &[&str], slug: &str, order: i32) -> Project {
  Project {
    id: id.to_string(),
    title: title.to_string(),
    description: description.to_string(),
    tech_stack: stack.iter().map(|s| s.to_string()).collect(),
    github_url: Some(format!("https://github.com/johndoe/{}", slug)),
    live_url: Some(format!("https://{}-demo.com", slug)),
    video_url: None,
    image_url: None,
    featured: true,
    order_index: order,
    user_id: None,
    created_at: None,
    updated_at: None,
  }
}

fn skill(id: &str, name: &str, category: SkillCategory, order: i32) -> Skill {
  Skill {
    id: id.to_string(),
    name: name.to_string(),
    category,
    order_index: order,
    user_id: None,
    created_at: None,
    updated_at: None,
  }
}

fn certification(id: &str, name: &str, year: &str, order: i32) -> Certification {
  Certification {
    id: id.to_string(),
    name: name.to_string(),
    year: year.to_string(),
    order_index: order,
    user_id: None,
    created_at: None,
    updated_at: None,
  }
}

pub fn portfolio() -> PortfolioData {
  use SkillCategory::*;

  PortfolioData {
    profile: profile(),
    projects: vec![
      project(
        "default-1",
        "E-Commerce Platform",
        "Online store with accounts, product management and payments.",
        &["React", "Node.js", "PostgreSQL", "Stripe"],
        "ecommerce",
        1,
      ),
      project(
        "default-2",
        "Task Management App",
        "Collaborative task board with real-time updates and drag-and-drop.",
        &["React", "TypeScript", "Socket.io", "MongoDB"],
        "taskapp",
        2,
      ),
      project(
        "default-3",
        "Portfolio Website",
        "Responsive portfolio showcasing projects and skills.",
        &["React", "TypeScript", "Tailwind CSS"],
        "portfolio",
        3,
      ),
    ],
    skills: vec![
      skill("frontend-1", "React", Frontend, 1),
      skill("frontend-2", "TypeScript", Frontend, 2),
      skill("frontend-3", "Next.js", Frontend, 3),
      skill("frontend-4", "Tailwind CSS", Frontend, 4),
      skill("backend-1", "Node.js", Backend, 1),
      skill("backend-2", "Express.js", Backend, 2),
      skill("backend-3", "PostgreSQL", Backend, 3),
      skill("tools-1", "Git", Tools, 1),
      skill("tools-2", "Docker", Tools, 2),
      skill("tools-3", "AWS", Tools, 3),
    ],
    education: vec![Education {
      id: "default-1".to_string(),
      degree: "Bachelor of Science in Computer Science".to_string(),
      institution: "University of Technology".to_string(),
      location: "New York, NY".to_string(),
      period: "2018 - 2022".to_string(),
      description: "Software engineering, algorithms and data structures.".to_string(),
      achievements: vec![
        "Dean's List for 6 consecutive semesters".to_string(),
        "President of Computer Science Club".to_string(),
      ],
      order_index: 1,
      user_id: None,
      created_at: None,
      updated_at: None,
    }],
    certifications: vec![
      certification("cert-1", "AWS Certified Solutions Architect", "2023", 1),
      certification("cert-2", "Google Cloud Professional Developer", "2022", 2),
      certification("cert-3", "MongoDB Certified Developer", "2022", 3),
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_skills_cover_every_category() {
    let data = portfolio();
    for category in [SkillCategory::Frontend, SkillCategory::Backend, SkillCategory::Tools] {
      assert!(data.skills.iter().any(|s| s.category == category));
    }
  }

  #[test]
  fn test_default_projects_are_ordered() {
    let orders: Vec<i32> = portfolio().projects.iter().map(|p| p.order_index).collect();
    let mut sorted = orders.clone();
    sorted.sort();
    assert_eq!(orders, sorted);
  }
}

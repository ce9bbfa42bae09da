use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Python,
    #[serde(rename = "ML")]
    Ml,
}

impl Skill {
    pub const ALL: [Skill; 2] = [Skill::Python, Skill::Ml];

    pub fn label(self) -> &'static str {
        match self {
            Skill::Python => "Python",
            Skill::Ml => "ML",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Proficiency per skill as a fraction in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    #[serde(rename = "Python")]
    pub python: f64,
    #[serde(rename = "ML")]
    pub ml: f64,
}

impl Skills {
    pub fn level(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Python => self.python,
            Skill::Ml => self.ml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub roll: String,
    pub skills: Skills,
    #[serde(default)]
    pub experience: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub name: String,
    pub roll: String,
    pub score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Importance of each skill for a workspace, 1 (nice to have) to 5 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillWeights {
    #[serde(rename = "Python")]
    pub python: u8,
    #[serde(rename = "ML")]
    pub ml: u8,
}

impl SkillWeights {
    pub fn importance(&self, skill: Skill) -> u8 {
        match skill {
            Skill::Python => self.python,
            Skill::Ml => self.ml,
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.python) + u32::from(self.ml)
    }
}

impl Default for SkillWeights {
    fn default() -> Self {
        Self { python: 5, ml: 3 }
    }
}

fn default_min_experience() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub workspace_name: String,
    pub min_python_percent: f64,
    pub min_ml_percent: f64,
    #[serde(default)]
    pub skill_weights: SkillWeights,
    #[serde(default = "default_min_experience")]
    pub min_experience: u32,
}

impl MatchRequest {
    pub fn new(workspace_name: impl Into<String>, min_python_percent: f64, min_ml_percent: f64) -> Self {
        Self {
            workspace_name: workspace_name.into(),
            min_python_percent,
            min_ml_percent,
            skill_weights: SkillWeights::default(),
            min_experience: default_min_experience(),
        }
    }

    pub fn min_percent(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Python => self.min_python_percent,
            Skill::Ml => self.min_ml_percent,
        }
    }
}

/// Body shape the service uses for every logical failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    Failure(ErrorBody),
    Profile(StudentProfile),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MatchResponse {
    Failure(ErrorBody),
    Ranked(Vec<MatchCandidate>),
}

/// A student row as the service stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub id: Uuid,
    pub name: String,
    pub roll: String,
    pub skills: Skills,
    pub experience_years: u32,
}

impl StudentRecord {
    pub fn profile(&self) -> StudentProfile {
        StudentProfile {
            name: self.name.clone(),
            roll: self.roll.clone(),
            skills: self.skills,
            experience: self.experience_years,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_error_body_wins_over_profile_shape() {
        let decoded: ProfileResponse =
            serde_json::from_str(r#"{"error": "Student not found"}"#).unwrap();
        assert!(matches!(decoded, ProfileResponse::Failure(body) if body.error == "Student not found"));
    }

    #[test]
    fn profile_uses_capitalised_skill_keys() {
        let decoded: ProfileResponse = serde_json::from_str(
            r#"{"name": "Riya Sen", "roll": "21CS014", "skills": {"Python": 0.8, "ML": 0.45}}"#,
        )
        .unwrap();
        let ProfileResponse::Profile(profile) = decoded else {
            panic!("expected a profile");
        };
        assert_eq!(profile.skills.level(Skill::Python), 0.8);
        assert_eq!(profile.skills.level(Skill::Ml), 0.45);
        assert_eq!(profile.experience, 0);
    }

    #[test]
    fn match_request_fills_defaults() {
        let request: MatchRequest = serde_json::from_str(
            r#"{"workspace_name": "Vision Lab", "min_python_percent": 60, "min_ml_percent": 40}"#,
        )
        .unwrap();
        assert_eq!(request.skill_weights, SkillWeights { python: 5, ml: 3 });
        assert_eq!(request.min_experience, 1);
        assert_eq!(request.min_percent(Skill::Ml), 40.0);
    }

    #[test]
    fn empty_match_array_decodes_as_ranked() {
        let decoded: MatchResponse = serde_json::from_str("[]").unwrap();
        assert!(matches!(decoded, MatchResponse::Ranked(list) if list.is_empty()));
    }
}

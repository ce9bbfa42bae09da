use crate::models::{MatchCandidate, MatchRequest, Skill, StudentRecord};

const STRONG_LEVEL: f64 = 0.8;
const MAX_EXPERIENCE_BOOST: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("workspace name must not be blank")]
    BlankWorkspace,
    #[error("minimum {skill} percent must be between 0 and 100, got {value}")]
    PercentOutOfRange { skill: Skill, value: f64 },
    #[error("importance for {skill} must be between 1 and 5, got {value}")]
    ImportanceOutOfRange { skill: Skill, value: u8 },
}

pub fn validate_request(request: &MatchRequest) -> Result<(), RequestError> {
    if request.workspace_name.trim().is_empty() {
        return Err(RequestError::BlankWorkspace);
    }

    for skill in Skill::ALL {
        let value = request.min_percent(skill);
        if !(0.0..=100.0).contains(&value) {
            return Err(RequestError::PercentOutOfRange { skill, value });
        }

        let importance = request.skill_weights.importance(skill);
        if !(1..=5).contains(&importance) {
            return Err(RequestError::ImportanceOutOfRange {
                skill,
                value: importance,
            });
        }
    }

    Ok(())
}

/// Ranks every student that clears the workspace minimums, best first.
pub fn rank_students(request: &MatchRequest, students: &[StudentRecord]) -> Vec<MatchCandidate> {
    let mut ranked: Vec<MatchCandidate> = students
        .iter()
        .filter(|student| meets_minimums(request, student))
        .map(|student| score_student(request, student))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.roll.cmp(&b.roll))
    });
    ranked
}

pub fn meets_minimums(request: &MatchRequest, student: &StudentRecord) -> bool {
    Skill::ALL
        .iter()
        .all(|&skill| as_percent(student.skills.level(skill)) >= request.min_percent(skill))
}

// Rounded so 0.57 compares as 57 rather than 56.99999999999999.
fn as_percent(level: f64) -> f64 {
    (level * 100.0 * 1e6).round() / 1e6
}

pub fn score_student(request: &MatchRequest, student: &StudentRecord) -> MatchCandidate {
    let mut weighted = 0.0;
    let mut reasons = Vec::new();

    for skill in Skill::ALL {
        let level = student.skills.level(skill);
        weighted += level * f64::from(request.skill_weights.importance(skill));

        if level >= STRONG_LEVEL {
            reasons.push(format!("Strong mastery in {skill} matches high-priority need."));
        } else if level == 0.0 {
            reasons.push(format!("Missing {skill}, which is a required competency."));
        }
    }

    let total = f64::from(request.skill_weights.total());
    let base = if total == 0.0 { 0.0 } else { weighted / total };
    let boost = experience_boost(student.experience_years, request.min_experience);
    let score = round_tenth(base * 100.0 * boost).min(100.0);

    MatchCandidate {
        name: student.name.clone(),
        roll: student.roll.clone(),
        score,
        reasons,
    }
}

pub fn experience_boost(experience: u32, min_experience: u32) -> f64 {
    if min_experience == 0 {
        return MAX_EXPERIENCE_BOOST;
    }
    (f64::from(experience) / f64::from(min_experience)).min(MAX_EXPERIENCE_BOOST)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Skills;
    use uuid::Uuid;

    fn student(name: &str, roll: &str, python: f64, ml: f64, experience: u32) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            roll: roll.to_string(),
            skills: Skills { python, ml },
            experience_years: experience,
        }
    }

    #[test]
    fn boost_caps_and_scales() {
        assert_eq!(experience_boost(3, 2), 1.1);
        assert_eq!(experience_boost(1, 2), 0.5);
        assert_eq!(experience_boost(0, 0), 1.1);
    }

    #[test]
    fn strong_and_missing_skills_explain_the_score() {
        let request = MatchRequest::new("Data Lab", 0.0, 0.0);
        let candidate = score_student(&request, &student("Alice Gupta", "21CS001", 1.0, 0.0, 1));

        assert_eq!(
            candidate.reasons,
            vec![
                "Strong mastery in Python matches high-priority need.".to_string(),
                "Missing ML, which is a required competency.".to_string(),
            ]
        );
        // 1.0 * 5 / 8 * 100 * 1.0
        assert!((candidate.score - 62.5).abs() < 1e-9);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let request = MatchRequest::new("Data Lab", 0.0, 0.0);
        let candidate = score_student(&request, &student("Kiara Patel", "21CS003", 1.0, 1.0, 9));
        assert_eq!(candidate.score, 100.0);
    }

    #[test]
    fn ranking_filters_by_minimums_and_sorts_descending() {
        let request = MatchRequest::new("Vision Lab", 50.0, 50.0);
        let students = vec![
            student("Bob Smith", "21CS002", 0.4, 0.9, 3),
            student("Alice Gupta", "21CS001", 0.7, 0.6, 3),
            student("Kiara Patel", "21CS003", 0.9, 0.8, 3),
        ];

        let ranked = rank_students(&request, &students);
        let rolls: Vec<&str> = ranked.iter().map(|c| c.roll.as_str()).collect();
        assert_eq!(rolls, vec!["21CS003", "21CS001"]);
    }

    #[test]
    fn student_exactly_on_threshold_is_kept() {
        let request = MatchRequest::new("Lab", 57.0, 29.0);
        assert!(meets_minimums(&request, &student("Riya Sen", "21CS014", 0.57, 0.29, 1)));
        assert!(!meets_minimums(&request, &student("Riya Sen", "21CS014", 0.56, 0.29, 1)));
    }

    #[test]
    fn ties_break_on_roll() {
        let request = MatchRequest::new("Vision Lab", 0.0, 0.0);
        let students = vec![
            student("Zed", "21CS009", 0.5, 0.5, 1),
            student("Amy", "21CS004", 0.5, 0.5, 1),
        ];
        let ranked = rank_students(&request, &students);
        assert_eq!(ranked[0].roll, "21CS004");
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let mut request = MatchRequest::new("  ", 10.0, 10.0);
        assert_eq!(validate_request(&request), Err(RequestError::BlankWorkspace));

        request.workspace_name = "Robotics".to_string();
        request.min_ml_percent = 140.0;
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::PercentOutOfRange { skill: Skill::Ml, .. })
        ));

        request.min_ml_percent = 40.0;
        request.skill_weights.python = 0;
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::ImportanceOutOfRange { skill: Skill::Python, value: 0 })
        ));
    }
}

use std::fmt::Write;

use crate::client::ClientError;
use crate::effects::{RenderNotifier, RenderedCard};
use crate::models::{MatchCandidate, Skill, StudentProfile};
use crate::session::Role;

pub const LOADING_TEXT: &str = "Processing competency matrices...";

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Transport(String),
    Domain(String),
}

impl From<&ClientError> for Failure {
    fn from(err: &ClientError) -> Self {
        if err.is_transport() {
            Failure::Transport(err.to_string())
        } else {
            Failure::Domain(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StaffPhase {
    Idle,
    Loading,
    Results(Vec<MatchCandidate>),
    Empty,
    Error(Failure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    StudentProfile(StudentProfile),
    StaffForm(StaffPhase),
    TransportError(String),
    DomainError(String),
}

impl ViewState {
    pub fn from_failure(failure: Failure) -> Self {
        match failure {
            Failure::Transport(message) => ViewState::TransportError(message),
            Failure::Domain(message) => ViewState::DomainError(message),
        }
    }

    /// Cards shown in the results region for this state.
    pub fn cards(&self) -> Vec<RenderedCard> {
        match self {
            ViewState::StudentProfile(profile) => vec![RenderedCard {
                key: profile.roll.clone(),
                score: None,
            }],
            ViewState::StaffForm(StaffPhase::Results(candidates)) => candidates
                .iter()
                .map(|candidate| RenderedCard {
                    key: candidate.roll.clone(),
                    score: Some(candidate.score),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Proficiency fraction as a whole percentage, e.g. `0.8` -> `80%`.
pub fn format_percent(level: f64) -> String {
    format!("{}%", (level * 100.0).round() as i64)
}

pub fn header_for(role: Role) -> &'static str {
    match role {
        Role::Student => "Student Dashboard",
        Role::Staff => "Staff Dashboard: Candidate Matching",
    }
}

pub fn render_results(state: &ViewState) -> String {
    let mut output = String::new();

    match state {
        ViewState::Loading | ViewState::StaffForm(StaffPhase::Loading) => {
            let _ = writeln!(output, "{LOADING_TEXT}");
        }
        ViewState::StudentProfile(profile) => render_profile(&mut output, profile),
        ViewState::StaffForm(StaffPhase::Idle) => {
            let _ = writeln!(
                output,
                "Enter a workspace name and minimum Python/ML percentages, then run matching."
            );
        }
        ViewState::StaffForm(StaffPhase::Results(candidates)) => {
            for (rank, candidate) in candidates.iter().enumerate() {
                render_candidate(&mut output, rank + 1, candidate);
            }
        }
        ViewState::StaffForm(StaffPhase::Empty) => {
            let _ = writeln!(output, "No students meet this workspace's requirements.");
        }
        ViewState::StaffForm(StaffPhase::Error(Failure::Transport(message)))
        | ViewState::TransportError(message) => render_transport_error(&mut output, message),
        ViewState::StaffForm(StaffPhase::Error(Failure::Domain(message)))
        | ViewState::DomainError(message) => {
            let _ = writeln!(output, "?? Server reported: {message}");
        }
    }

    output
}

fn render_profile(output: &mut String, profile: &StudentProfile) {
    let _ = writeln!(output, "+ {} ({})", profile.name, profile.roll);
    for skill in Skill::ALL {
        let _ = writeln!(
            output,
            "  {:<8}{}",
            format!("{skill}:"),
            format_percent(profile.skills.level(skill))
        );
    }
    if profile.experience > 0 {
        let _ = writeln!(output, "  Experience: {} yr", profile.experience);
    }
}

fn render_candidate(output: &mut String, rank: usize, candidate: &MatchCandidate) {
    let _ = writeln!(
        output,
        "#{rank} {} ({})  [{}%]",
        candidate.name, candidate.roll, candidate.score
    );
    if candidate.reasons.is_empty() {
        return;
    }
    let _ = writeln!(output, "   Reasoning:");
    for reason in &candidate.reasons {
        let _ = writeln!(output, "   - {reason}");
    }
}

fn render_transport_error(output: &mut String, message: &str) {
    let _ = writeln!(output, "!! Could not reach the matching service: {message}");
    let _ = writeln!(output, "   Check the service is running, then try again.");
}

/// Blocking summary shown for `viewStudentProfile`.
pub fn profile_summary(profile: &StudentProfile) -> String {
    let skills: Vec<String> = Skill::ALL
        .iter()
        .map(|&skill| format!("{skill}: {}", format_percent(profile.skills.level(skill))))
        .collect();
    format!("Name: {}\nRoll: {}\n{}", profile.name, profile.roll, skills.join("\n"))
}

/// The single mutable screen region the dashboards draw into.
#[derive(Debug)]
pub struct Page {
    header: String,
    staff_inputs_visible: bool,
    state: ViewState,
    results: String,
    prompts: Vec<String>,
    notifier: Option<RenderNotifier>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Page {
    pub fn new(notifier: Option<RenderNotifier>) -> Self {
        Self {
            header: String::new(),
            staff_inputs_visible: false,
            state: ViewState::Loading,
            results: render_results(&ViewState::Loading),
            prompts: Vec::new(),
            notifier,
        }
    }

    pub fn set_role(&mut self, role: Role) {
        self.header = header_for(role).to_string();
        self.staff_inputs_visible = role == Role::Staff;
    }

    /// Replaces the results region with `state`.
    pub fn apply(&mut self, state: ViewState) {
        self.results = render_results(&state);

        let cards = state.cards();
        if !cards.is_empty() {
            if let Some(notifier) = &self.notifier {
                notifier.cards_rendered(cards);
            }
        }
        self.state = state;
    }

    pub fn prompt(&mut self, message: impl Into<String>) {
        self.prompts.push(message.into());
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn staff_inputs_visible(&self) -> bool {
        self.staff_inputs_visible
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn results(&self) -> &str {
        &self.results
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn to_text(&self) -> String {
        let mut output = String::new();
        for prompt in &self.prompts {
            let _ = writeln!(output, ">> {prompt}");
        }
        if !self.header.is_empty() {
            let _ = writeln!(output, "== {} ==", self.header);
        }
        if self.staff_inputs_visible {
            let _ = writeln!(output, "Filters: --workspace <name> --min-python <%> --min-ml <%>");
        }
        output.push_str(&self.results);
        output
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::client::Backend;
use crate::models::MatchRequest;
use crate::session::{Role, Session, SessionStore};
use crate::view::{profile_summary, Failure, Page, StaffPhase, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    RedirectToLogin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("Please enter {0}.")]
    MissingField(&'static str),
    #[error("{field} must be a number, got {value:?}.")]
    NotANumber { field: &'static str, value: String },
}

/// Raw staff inputs, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffForm {
    pub workspace_name: String,
    pub min_python: String,
    pub min_ml: String,
}

impl StaffForm {
    pub fn new(workspace_name: &str, min_python: &str, min_ml: &str) -> Self {
        Self {
            workspace_name: workspace_name.to_string(),
            min_python: min_python.to_string(),
            min_ml: min_ml.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.workspace_name.trim().is_empty()
            && self.min_python.trim().is_empty()
            && self.min_ml.trim().is_empty()
    }

    pub fn validate(&self) -> Result<MatchRequest, ValidationFailure> {
        let workspace = required(&self.workspace_name, "a workspace name")?;
        let min_python = number(&self.min_python, "the minimum Python percent")?;
        let min_ml = number(&self.min_ml, "the minimum ML percent")?;
        Ok(MatchRequest::new(workspace, min_python, min_ml))
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationFailure> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationFailure::MissingField(field));
    }
    Ok(value)
}

fn number(value: &str, field: &'static str) -> Result<f64, ValidationFailure> {
    let value = required(value, field)?;
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| ValidationFailure::NotANumber {
            field,
            value: value.to_string(),
        })
}

/// Reads the session once and decides which dashboard to show.
pub fn bootstrap(store: &impl SessionStore) -> anyhow::Result<Option<Session>> {
    let session = Session::load(store)?;
    match &session {
        Some(session) => info!(role = %session.role, id = %session.id, "session found"),
        None => info!("no session, redirecting to login"),
    }
    Ok(session)
}

pub fn logout(store: &impl SessionStore) -> anyhow::Result<Navigation> {
    store.clear()?;
    info!("session cleared");
    Ok(Navigation::RedirectToLogin)
}

/// Loads the signed-in student's own profile into the page.
pub async fn show_student_dashboard<B: Backend>(backend: &B, session: &Session, page: &mut Page) {
    page.set_role(Role::Student);
    page.apply(ViewState::Loading);

    let state = match backend.fetch_student_profile(&session.id).await {
        Ok(profile) => ViewState::StudentProfile(profile),
        Err(err) => {
            warn!(error = %err, id = %session.id, "profile fetch failed");
            ViewState::from_failure(Failure::from(&err))
        }
    };
    page.apply(state);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Rejected,
    Applied,
    /// A newer run was started before this one resolved; its result was dropped.
    Superseded,
}

pub struct StaffDashboard<B> {
    backend: B,
    page: Mutex<Page>,
    latest_ticket: AtomicU64,
}

impl<B: Backend> StaffDashboard<B> {
    pub fn new(backend: B, mut page: Page) -> Self {
        page.set_role(Role::Staff);
        page.apply(ViewState::StaffForm(StaffPhase::Idle));
        Self {
            backend,
            page: Mutex::new(page),
            latest_ticket: AtomicU64::new(0),
        }
    }

    fn page_mut(&self) -> MutexGuard<'_, Page> {
        // Page updates never panic midway, so a poisoned lock still holds a whole page.
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_page<T>(&self, f: impl FnOnce(&Page) -> T) -> T {
        f(&self.page_mut())
    }

    pub fn into_page(self) -> Page {
        self.page
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn run_match(&self, form: &StaffForm) -> RunOutcome {
        let request = match form.validate() {
            Ok(request) => request,
            Err(failure) => {
                debug!(%failure, "staff form rejected");
                self.page_mut().prompt(failure.to_string());
                return RunOutcome::Rejected;
            }
        };

        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.page_mut().apply(ViewState::StaffForm(StaffPhase::Loading));
        info!(ticket, workspace = %request.workspace_name, "running match");

        let result = self.backend.run_match(&request).await;

        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded match result");
            return RunOutcome::Superseded;
        }

        let phase = match result {
            Ok(candidates) if candidates.is_empty() => StaffPhase::Empty,
            Ok(candidates) => {
                info!(count = candidates.len(), "match returned candidates");
                StaffPhase::Results(candidates)
            }
            Err(err) => {
                warn!(error = %err, "match failed");
                StaffPhase::Error(Failure::from(&err))
            }
        };
        self.page_mut().apply(ViewState::StaffForm(phase));
        RunOutcome::Applied
    }

    /// Fetches one student and shows it as a blocking summary, leaving the results untouched.
    pub async fn view_student_profile(&self, roll: &str) {
        let message = match self.backend.fetch_student_profile(roll).await {
            Ok(profile) => profile_summary(&profile),
            Err(err) if err.is_transport() => format!("Could not load profile: {err}"),
            Err(err) => format!("Profile unavailable: {err}"),
        };
        self.page_mut().prompt(message);
    }
}

/// Page bootstrap: gate on the session, then show the dashboard for its role.
pub async fn open_dashboard<S, B>(
    store: &S,
    backend: B,
    form: Option<&StaffForm>,
    page: Page,
) -> anyhow::Result<(Navigation, Page)>
where
    S: SessionStore,
    B: Backend,
{
    let Some(session) = bootstrap(store)? else {
        return Ok((Navigation::RedirectToLogin, page));
    };

    match session.role {
        Role::Student => {
            if form.is_some() {
                warn!("workspace filters only apply to staff sessions, ignoring them");
            }
            let mut page = page;
            show_student_dashboard(&backend, &session, &mut page).await;
            Ok((Navigation::Stay, page))
        }
        Role::Staff => {
            let dashboard = StaffDashboard::new(backend, page);
            if let Some(form) = form {
                dashboard.run_match(form).await;
            }
            Ok((Navigation::Stay, dashboard.into_page()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use tokio::sync::oneshot;

    use crate::client::ClientError;
    use crate::models::{MatchCandidate, Skills, StudentProfile};
    use crate::session::{MemorySessionStore, ID_KEY, ROLE_KEY};

    type MatchReply = Result<Vec<MatchCandidate>, ClientError>;

    #[derive(Default)]
    struct ScriptedBackend {
        calls: AtomicUsize,
        profiles: Mutex<VecDeque<Result<StudentProfile, ClientError>>>,
        matches: Mutex<VecDeque<oneshot::Receiver<MatchReply>>>,
    }

    impl ScriptedBackend {
        fn with_profile(reply: Result<StudentProfile, ClientError>) -> Self {
            let backend = Self::default();
            backend.profiles.lock().unwrap().push_back(reply);
            backend
        }

        fn queue_match(&self) -> oneshot::Sender<MatchReply> {
            let (tx, rx) = oneshot::channel();
            self.matches.lock().unwrap().push_back(rx);
            tx
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Backend for Arc<ScriptedBackend> {
        async fn fetch_student_profile(&self, _id: &str) -> Result<StudentProfile, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.profiles.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| Err(ClientError::Domain("Student not found".into())))
        }

        async fn run_match(&self, _request: &MatchRequest) -> MatchReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.matches.lock().unwrap().pop_front();
            match rx {
                Some(rx) => rx.await.unwrap_or_else(|_| Ok(Vec::new())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn profile(python: f64) -> StudentProfile {
        StudentProfile {
            name: "Riya Sen".to_string(),
            roll: "21CS014".to_string(),
            skills: Skills { python, ml: 0.5 },
            experience: 2,
        }
    }

    fn candidate(name: &str, roll: &str, score: f64) -> MatchCandidate {
        MatchCandidate {
            name: name.to_string(),
            roll: roll.to_string(),
            score,
            reasons: Vec::new(),
        }
    }

    fn transport_error() -> ClientError {
        serde_json::from_str::<Vec<MatchCandidate>>("not json")
            .unwrap_err()
            .into()
    }

    fn staff_store() -> MemorySessionStore {
        MemorySessionStore::with_values(&[(ROLE_KEY, "staff"), (ID_KEY, "T-100")])
    }

    fn form() -> StaffForm {
        StaffForm::new("Vision Lab", "60", "40")
    }

    #[tokio::test]
    async fn missing_session_redirects_without_backend_calls() {
        let stores = [
            MemorySessionStore::default(),
            MemorySessionStore::with_values(&[(ROLE_KEY, "student")]),
            MemorySessionStore::with_values(&[(ID_KEY, "21CS014")]),
        ];
        for store in stores {
            let backend = Arc::new(ScriptedBackend::default());
            let (nav, _) = open_dashboard(&store, backend.clone(), Some(&form()), Page::default())
                .await
                .unwrap();
            assert_eq!(nav, Navigation::RedirectToLogin);
            assert_eq!(backend.calls(), 0);
        }
    }

    #[tokio::test]
    async fn student_profile_shows_scaled_percentages() {
        let store = MemorySessionStore::with_values(&[(ROLE_KEY, "student"), (ID_KEY, "21CS014")]);
        let backend = Arc::new(ScriptedBackend::with_profile(Ok(profile(0.8))));

        let (nav, page) = open_dashboard(&store, backend, None, Page::default()).await.unwrap();
        assert_eq!(nav, Navigation::Stay);
        assert!(matches!(page.state(), ViewState::StudentProfile(_)));
        assert!(page.results().contains("80%"));
        assert!(!page.staff_inputs_visible());
    }

    #[tokio::test]
    async fn student_failures_are_classified() {
        let store = MemorySessionStore::with_values(&[(ROLE_KEY, "student"), (ID_KEY, "21CS999")]);

        let backend = Arc::new(ScriptedBackend::with_profile(Err(ClientError::Domain(
            "Student not found".into(),
        ))));
        let (_, page) = open_dashboard(&store, backend, None, Page::default()).await.unwrap();
        assert_eq!(page.state(), &ViewState::DomainError("Student not found".into()));

        let backend = Arc::new(ScriptedBackend::with_profile(Err(transport_error())));
        let (_, page) = open_dashboard(&store, backend, None, Page::default()).await.unwrap();
        assert!(matches!(page.state(), ViewState::TransportError(_)));
    }

    #[tokio::test]
    async fn empty_match_reaches_empty_state() {
        let backend = Arc::new(ScriptedBackend::default());
        let tx = backend.queue_match();
        tx.send(Ok(Vec::new())).unwrap();

        let dashboard = StaffDashboard::new(backend, Page::default());
        assert_eq!(dashboard.run_match(&form()).await, RunOutcome::Applied);
        dashboard.with_page(|page| {
            assert_eq!(page.state(), &ViewState::StaffForm(StaffPhase::Empty));
        });
    }

    #[tokio::test]
    async fn transport_failure_clears_previous_candidates() {
        let backend = Arc::new(ScriptedBackend::default());
        backend
            .queue_match()
            .send(Ok(vec![candidate("Alice Gupta", "21CS001", 92.5)]))
            .unwrap();
        backend.queue_match().send(Err(transport_error())).unwrap();

        let dashboard = StaffDashboard::new(backend, Page::default());
        dashboard.run_match(&form()).await;
        dashboard.run_match(&form()).await;

        dashboard.with_page(|page| {
            assert!(matches!(
                page.state(),
                ViewState::StaffForm(StaffPhase::Error(Failure::Transport(_)))
            ));
            assert!(!page.results().contains("Alice Gupta"));
        });
    }

    #[tokio::test]
    async fn latest_run_wins_over_late_earlier_response() {
        let backend = Arc::new(ScriptedBackend::default());
        let first_tx = backend.queue_match();
        let second_tx = backend.queue_match();
        let dashboard = StaffDashboard::new(backend, Page::default());

        let first_form = StaffForm::new("Vision Lab", "60", "40");
        let second_form = StaffForm::new("Robotics", "70", "20");
        let driver = async {
            second_tx
                .send(Ok(vec![candidate("Bob Smith", "21CS002", 71.0)]))
                .unwrap();
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            first_tx
                .send(Ok(vec![candidate("Alice Gupta", "21CS001", 92.5)]))
                .unwrap();
        };

        let (first, second, ()) = tokio::join!(
            dashboard.run_match(&first_form),
            dashboard.run_match(&second_form),
            driver
        );

        assert_eq!(first, RunOutcome::Superseded);
        assert_eq!(second, RunOutcome::Applied);
        dashboard.with_page(|page| {
            assert_eq!(
                page.state(),
                &ViewState::StaffForm(StaffPhase::Results(vec![candidate(
                    "Bob Smith",
                    "21CS002",
                    71.0
                )]))
            );
            assert!(!page.results().contains("Alice Gupta"));
        });
    }

    #[tokio::test]
    async fn blank_required_field_issues_no_request() {
        let backend = Arc::new(ScriptedBackend::default());
        let dashboard = StaffDashboard::new(backend.clone(), Page::default());

        let outcome = dashboard
            .run_match(&StaffForm::new("Vision Lab", "", "40"))
            .await;

        assert_eq!(outcome, RunOutcome::Rejected);
        assert_eq!(backend.calls(), 0);
        dashboard.with_page(|page| {
            assert_eq!(page.prompts(), ["Please enter the minimum Python percent."]);
            assert_eq!(page.state(), &ViewState::StaffForm(StaffPhase::Idle));
        });
    }

    #[test]
    fn non_numeric_threshold_is_rejected() {
        let err = StaffForm::new("Vision Lab", "sixty", "40").validate().unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::NotANumber {
                field: "the minimum Python percent",
                value: "sixty".into()
            }
        );
    }

    #[tokio::test]
    async fn logout_forces_login_on_next_load() {
        let store = staff_store();
        assert_eq!(logout(&store).unwrap(), Navigation::RedirectToLogin);
        assert_eq!(logout(&store).unwrap(), Navigation::RedirectToLogin);
        assert!(store.read(ROLE_KEY).unwrap().is_none());
        assert!(store.read(ID_KEY).unwrap().is_none());

        let backend = Arc::new(ScriptedBackend::default());
        let (nav, _) = open_dashboard(&store, backend.clone(), None, Page::default())
            .await
            .unwrap();
        assert_eq!(nav, Navigation::RedirectToLogin);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn profile_link_prompts_without_touching_results() {
        let backend = Arc::new(ScriptedBackend::with_profile(Ok(profile(0.8))));
        let dashboard = StaffDashboard::new(backend, Page::default());

        dashboard.view_student_profile("21CS014").await;
        dashboard.with_page(|page| {
            assert_eq!(page.prompts().len(), 1);
            assert!(page.prompts()[0].contains("Python: 80%"));
            assert_eq!(page.state(), &ViewState::StaffForm(StaffPhase::Idle));
        });
    }
}

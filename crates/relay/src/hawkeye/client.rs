//! Session bootstrap and prompt submission.
//!
//! An [`InferenceClient`] walks `Unauthenticated → Authenticated →
//! ProjectResolved → Open`. The first failed step moves it to `Disabled`,
//! which is terminal: later steps are skipped and prompts are not sent.

use std::fmt;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::api::{AdvanceReceipt, AdvanceSessionRequest, InferenceApi, NewSessionRequest, Project};
use crate::{config::HawkeyeConfig, metrics, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    Authenticate,
    ResolveProject,
    OpenSession,
}

impl BootstrapStep {
    pub const ALL: [BootstrapStep; 3] = [
        BootstrapStep::Authenticate,
        BootstrapStep::ResolveProject,
        BootstrapStep::OpenSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapStep::Authenticate => "authenticate",
            BootstrapStep::ResolveProject => "resolve_project",
            BootstrapStep::OpenSession => "open_session",
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to push a prompt into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub access_token: String,
    pub project_uuid: String,
    pub session_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated {
        access_token: String,
    },
    ProjectResolved {
        access_token: String,
        project_uuid: String,
    },
    Open(SessionContext),
    Disabled {
        step: BootstrapStep,
        reason: String,
    },
}

impl SessionState {
    /// The step that moves this state forward, if any.
    pub fn next_step(&self) -> Option<BootstrapStep> {
        match self {
            SessionState::Unauthenticated => Some(BootstrapStep::Authenticate),
            SessionState::Authenticated { .. } => Some(BootstrapStep::ResolveProject),
            SessionState::ProjectResolved { .. } => Some(BootstrapStep::OpenSession),
            SessionState::Open(_) | SessionState::Disabled { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded(BootstrapStep),
    Failed { step: BootstrapStep, reason: String },
    Skipped(BootstrapStep),
}

impl StepOutcome {
    pub fn step(&self) -> BootstrapStep {
        match self {
            StepOutcome::Succeeded(step) | StepOutcome::Skipped(step) => *step,
            StepOutcome::Failed { step, .. } => *step,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Delivered {
        request_id: Uuid,
        receipt: AdvanceReceipt,
    },
    /// No request was made because the session never opened.
    Skipped { failed_step: Option<BootstrapStep> },
    Failed { reason: String },
}

impl PromptOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PromptOutcome::Delivered { .. })
    }
}

/// First project whose name matches exactly; names are assumed unique.
pub fn find_project(projects: &[Project], name: &str) -> Result<String> {
    projects
        .iter()
        .find(|project| project.name.as_deref() == Some(name))
        .and_then(|project| project.uuid.clone())
        .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
}

pub struct InferenceClient<A: InferenceApi> {
    api: A,
    email: String,
    password: String,
    project_name: String,
    organization: String,
    state: SessionState,
    outcomes: Vec<StepOutcome>,
}

impl<A: InferenceApi> InferenceClient<A> {
    /// Runs the full bootstrap against `api`. Never fails; inspect
    /// [`state`](Self::state) or [`outcomes`](Self::outcomes) for the result.
    pub async fn connect(api: A, config: &HawkeyeConfig) -> Self {
        let mut client = Self {
            api,
            email: config.user.clone(),
            password: config.password.clone(),
            project_name: config.project.clone(),
            organization: config.organization.clone(),
            state: SessionState::Unauthenticated,
            outcomes: Vec::with_capacity(BootstrapStep::ALL.len()),
        };
        client.bootstrap().await;
        client
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub fn session(&self) -> Option<&SessionContext> {
        match &self.state {
            SessionState::Open(context) => Some(context),
            _ => None,
        }
    }

    async fn bootstrap(&mut self) {
        for step in BootstrapStep::ALL {
            let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
            let (state, outcome) = if state.next_step() == Some(step) {
                self.transition(state, step).await
            } else {
                (state, StepOutcome::Skipped(step))
            };
            self.state = state;
            self.outcomes.push(outcome);
        }
    }

    async fn transition(&self, state: SessionState, step: BootstrapStep) -> (SessionState, StepOutcome) {
        match state {
            SessionState::Unauthenticated => match self.authenticate().await {
                Ok(access_token) => (
                    SessionState::Authenticated { access_token },
                    StepOutcome::Succeeded(BootstrapStep::Authenticate),
                ),
                Err(e) => Self::disable(BootstrapStep::Authenticate, e),
            },
            SessionState::Authenticated { access_token } => {
                match self.resolve_project(&access_token).await {
                    Ok(project_uuid) => (
                        SessionState::ProjectResolved {
                            access_token,
                            project_uuid,
                        },
                        StepOutcome::Succeeded(BootstrapStep::ResolveProject),
                    ),
                    Err(e) => Self::disable(BootstrapStep::ResolveProject, e),
                }
            }
            SessionState::ProjectResolved {
                access_token,
                project_uuid,
            } => match self.open_session(&access_token, &project_uuid).await {
                Ok(session_uuid) => (
                    SessionState::Open(SessionContext {
                        access_token,
                        project_uuid,
                        session_uuid,
                    }),
                    StepOutcome::Succeeded(BootstrapStep::OpenSession),
                ),
                Err(e) => Self::disable(BootstrapStep::OpenSession, e),
            },
            state @ (SessionState::Open(_) | SessionState::Disabled { .. }) => {
                (state, StepOutcome::Skipped(step))
            }
        }
    }

    fn disable(step: BootstrapStep, err: Error) -> (SessionState, StepOutcome) {
        match &err {
            Error::MissingField { .. } | Error::ProjectNotFound(_) => {
                warn!(step = %step, "Session bootstrap stopped: {}", err)
            }
            _ => error!(step = %step, "Session bootstrap failed: {}", err),
        }
        metrics::BOOTSTRAP_FAILURES_TOTAL
            .with_label_values(&[step.as_str()])
            .inc();

        let reason = err.to_string();
        (
            SessionState::Disabled {
                step,
                reason: reason.clone(),
            },
            StepOutcome::Failed { step, reason },
        )
    }

    async fn authenticate(&self) -> Result<String> {
        let token = self.api.login(&self.email, &self.password).await?;
        info!("Login successful, access token received");
        Ok(token)
    }

    async fn resolve_project(&self, access_token: &str) -> Result<String> {
        let projects = self.api.list_projects(access_token).await?;
        let project_uuid = find_project(&projects, &self.project_name)?;
        info!(project = %self.project_name, project_uuid = %project_uuid, "Resolved project");
        Ok(project_uuid)
    }

    async fn open_session(&self, access_token: &str, project_uuid: &str) -> Result<String> {
        let request = NewSessionRequest::new(&self.organization, project_uuid);
        let session_uuid = self.api.new_session(access_token, &request).await?;
        info!(session_uuid = %session_uuid, "Inference session opened");
        Ok(session_uuid)
    }

    /// Submits `prompt` as a single chat message. A no-op unless the
    /// bootstrap reached `Open`.
    pub async fn send_prompt(&self, prompt: &str) -> PromptOutcome {
        let context = match &self.state {
            SessionState::Open(context) => context,
            SessionState::Disabled { step, .. } => {
                warn!(step = %step, "Skipping prompt, inference session was never opened");
                return PromptOutcome::Skipped {
                    failed_step: Some(*step),
                };
            }
            _ => {
                warn!("Skipping prompt, inference session is not open");
                return PromptOutcome::Skipped { failed_step: None };
            }
        };

        let request =
            AdvanceSessionRequest::prompt(&context.session_uuid, &context.project_uuid, prompt);
        let request_id = request.request.request_id;

        match self.api.advance_session(&context.access_token, &request).await {
            Ok(receipt) => {
                info!(%request_id, "Prompt sent successfully. prompt: {}", prompt);
                metrics::PROMPTS_DELIVERED_TOTAL.inc();
                PromptOutcome::Delivered {
                    request_id,
                    receipt,
                }
            }
            Err(e) => {
                error!(%request_id, "Send prompt failed: {}", e);
                PromptOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hawkeye::api::MockInferenceApi;
    use std::sync::{Arc, Mutex};

    fn config() -> HawkeyeConfig {
        HawkeyeConfig::new("https://hawkeye.test", "ops@example.com", "secret", "production")
    }

    fn project(name: &str, uuid: &str) -> Project {
        Project {
            name: Some(name.to_string()),
            uuid: Some(uuid.to_string()),
            ..Default::default()
        }
    }

    fn status_error(endpoint: &str) -> Error {
        Error::Status {
            endpoint: endpoint.to_string(),
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: "denied".to_string(),
        }
    }

    /// A mock whose three bootstrap calls all succeed.
    fn healthy_api() -> MockInferenceApi {
        let mut api = MockInferenceApi::new();
        api.expect_login()
            .withf(|email, password| email == "ops@example.com" && password == "secret")
            .times(1)
            .returning(|_, _| Ok("token-1".to_string()));
        api.expect_list_projects()
            .withf(|token| token == "token-1")
            .times(1)
            .returning(|_| Ok(vec![project("staging", "p-stg"), project("production", "p-prod")]));
        api.expect_new_session()
            .withf(|token, request| {
                token == "token-1"
                    && request.project_uuid == "p-prod"
                    && request.organization_uuid == "ORGANIZATION_NAME_ROOT"
                    && request.filter_chain.is_none()
            })
            .times(1)
            .returning(|_, _| Ok("s-1".to_string()));
        api
    }

    #[tokio::test]
    async fn test_full_bootstrap_opens_session() {
        let client = InferenceClient::connect(healthy_api(), &config()).await;

        assert_eq!(
            client.session(),
            Some(&SessionContext {
                access_token: "token-1".to_string(),
                project_uuid: "p-prod".to_string(),
                session_uuid: "s-1".to_string(),
            })
        );
        assert_eq!(
            client.outcomes(),
            &[
                StepOutcome::Succeeded(BootstrapStep::Authenticate),
                StepOutcome::Succeeded(BootstrapStep::ResolveProject),
                StepOutcome::Succeeded(BootstrapStep::OpenSession),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_prompt_issues_one_request_with_session_ids() {
        let mut api = healthy_api();
        api.expect_advance_session()
            .withf(|token, request| {
                token == "token-1"
                    && request.action == "ACTION_NEXT"
                    && request.session_uuid == "s-1"
                    && request.project_uuid == "p-prod"
                    && request.messages.len() == 1
                    && request.prompt_text() == Some("HighCPU - CPU above 90%")
            })
            .times(1)
            .returning(|_, _| Ok(AdvanceReceipt::default()));

        let client = InferenceClient::connect(api, &config()).await;
        let outcome = client.send_prompt("HighCPU - CPU above 90%").await;

        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_failed_login_disables_client() {
        let mut api = MockInferenceApi::new();
        api.expect_login()
            .times(1)
            .returning(|_, _| Err(status_error("/api/v1/user/login")));
        api.expect_list_projects().never();
        api.expect_new_session().never();
        api.expect_advance_session().never();

        let client = InferenceClient::connect(api, &config()).await;

        assert!(matches!(
            client.state(),
            SessionState::Disabled {
                step: BootstrapStep::Authenticate,
                ..
            }
        ));
        assert_eq!(
            &client.outcomes()[1..],
            &[
                StepOutcome::Skipped(BootstrapStep::ResolveProject),
                StepOutcome::Skipped(BootstrapStep::OpenSession),
            ]
        );
        assert_eq!(
            client.send_prompt("anything").await,
            PromptOutcome::Skipped {
                failed_step: Some(BootstrapStep::Authenticate)
            }
        );
    }

    #[tokio::test]
    async fn test_missing_token_disables_client() {
        let mut api = MockInferenceApi::new();
        api.expect_login()
            .returning(|_, _| Err(Error::missing_field("/api/v1/user/login", "access_token")));
        api.expect_list_projects().never();

        let client = InferenceClient::connect(api, &config()).await;

        match &client.outcomes()[0] {
            StepOutcome::Failed { step, reason } => {
                assert_eq!(*step, BootstrapStep::Authenticate);
                assert!(reason.contains("access_token"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_project_never_opens_session() {
        let mut api = MockInferenceApi::new();
        api.expect_login()
            .returning(|_, _| Ok("token-1".to_string()));
        api.expect_list_projects()
            .returning(|_| Ok(vec![project("staging", "p-stg")]));
        api.expect_new_session().never();
        api.expect_advance_session().never();

        let client = InferenceClient::connect(api, &config()).await;

        assert_eq!(
            client.outcomes()[1],
            StepOutcome::Failed {
                step: BootstrapStep::ResolveProject,
                reason: "Project not found: production".to_string(),
            }
        );
        assert!(!client.send_prompt("anything").await.is_delivered());
    }

    #[tokio::test]
    async fn test_session_creation_failure() {
        let mut api = MockInferenceApi::new();
        api.expect_login()
            .returning(|_, _| Ok("token-1".to_string()));
        api.expect_list_projects()
            .returning(|_| Ok(vec![project("production", "p-prod")]));
        api.expect_new_session()
            .returning(|_, _| Err(Error::missing_field("/api/v1/inference/new_session", "session_uuid")));
        api.expect_advance_session().never();

        let client = InferenceClient::connect(api, &config()).await;

        assert_eq!(client.state().next_step(), None);
        assert!(client.session().is_none());
        assert_eq!(
            client.send_prompt("anything").await,
            PromptOutcome::Skipped {
                failed_step: Some(BootstrapStep::OpenSession)
            }
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_reported_not_raised() {
        let mut api = healthy_api();
        api.expect_advance_session()
            .times(1)
            .returning(|_, _| Err(status_error("/api/v1/inference/session")));

        let client = InferenceClient::connect(api, &config()).await;

        assert!(matches!(
            client.send_prompt("anything").await,
            PromptOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_each_bootstrap_generates_fresh_identifiers() {
        let seen: Arc<Mutex<Vec<(Uuid, Uuid)>>> = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let mut api = MockInferenceApi::new();
            api.expect_login()
                .returning(|_, _| Ok("token-1".to_string()));
            api.expect_list_projects()
                .returning(|_| Ok(vec![project("production", "p-prod")]));
            let recorder = seen.clone();
            api.expect_new_session().returning(move |_, request| {
                recorder
                    .lock()
                    .unwrap()
                    .push((request.request.request_id, request.gendb_spec.uuid));
                Ok("s-1".to_string())
            });

            InferenceClient::connect(api, &config()).await;
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let (first_request, first_spec) = seen[0];
        let (second_request, second_spec) = seen[1];
        assert_ne!(first_request, first_spec);
        assert_ne!(first_request, second_request);
        assert_ne!(first_spec, second_spec);
    }

    #[tokio::test]
    async fn test_each_prompt_gets_a_fresh_request_id() {
        let seen: Arc<Mutex<Vec<Uuid>>> = Arc::new(Mutex::new(Vec::new()));
        let mut api = healthy_api();
        let recorder = seen.clone();
        api.expect_advance_session()
            .times(2)
            .returning(move |_, request| {
                recorder.lock().unwrap().push(request.request.request_id);
                Ok(AdvanceReceipt::default())
            });

        let client = InferenceClient::connect(api, &config()).await;
        let first = client.send_prompt("first").await;
        let second = client.send_prompt("second").await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
        match (first, second) {
            (
                PromptOutcome::Delivered { request_id: a, .. },
                PromptOutcome::Delivered { request_id: b, .. },
            ) => assert_eq!((a, b), (seen[0], seen[1])),
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn test_find_project_first_match_wins() {
        let projects = vec![
            project("production", "first"),
            project("production", "second"),
            Project {
                name: None,
                uuid: Some("nameless".to_string()),
                ..Default::default()
            },
        ];

        assert_eq!(find_project(&projects, "production").unwrap(), "first");
        assert!(matches!(
            find_project(&projects, "missing"),
            Err(Error::ProjectNotFound(_))
        ));
    }
}

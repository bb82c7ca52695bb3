use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT},
    Client, Response,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::api::{
    AdvanceReceipt, AdvanceSessionRequest, InferenceApi, LoginRequest, LoginResponse,
    NewSessionRequest, NewSessionResponse, Project, ProjectList, SessionInspection, SessionList,
    SessionQuery, SessionSummary, LOGIN_PATH, NEW_SESSION_PATH, PROJECTS_PATH, SESSION_INSPECT_PATH,
    SESSION_LIST_PATH, SESSION_PATH,
};
use crate::{config::DeliveryMode, Error, Result};

const CLIENT_IDENTIFIER: &str = "web-app";

/// reqwest-backed [`InferenceApi`].
///
/// No request timeout is configured; each call waits for the transport to
/// give up on its own.
pub struct HttpInferenceApi {
    base_url: String,
    client: Client,
    delivery: DeliveryMode,
}

impl HttpInferenceApi {
    pub fn new(base_url: &str, delivery: DeliveryMode) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            HeaderName::from_static("x-client-identifier"),
            HeaderValue::from_static(CLIENT_IDENTIFIER),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            base_url,
            client,
            delivery,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turns a non-success status into [`Error::Status`], keeping the body
    /// for the log line.
    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            endpoint: path.to_string(),
            status,
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let response = Self::check(path, response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn drain(response: Response) -> Result<AdvanceReceipt> {
        let mut receipt = AdvanceReceipt::default();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            pending.extend_from_slice(&chunk?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                receipt.observe_line(&String::from_utf8_lossy(&line));
            }
        }
        receipt.observe_line(&String::from_utf8_lossy(&pending));

        Ok(receipt)
    }
}

#[async_trait]
impl InferenceApi for HttpInferenceApi {
    async fn login(&self, email: &str, password: &str) -> Result<String> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&body)
            .send()
            .await?;

        let login: LoginResponse = Self::read_json(LOGIN_PATH, response).await?;
        login
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::missing_field(LOGIN_PATH, "access_token"))
    }

    async fn list_projects(&self, token: &str) -> Result<Vec<Project>> {
        let response = self
            .client
            .get(self.url(PROJECTS_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        let list: ProjectList = Self::read_json(PROJECTS_PATH, response).await?;
        list.specs
            .ok_or_else(|| Error::missing_field(PROJECTS_PATH, "specs"))
    }

    async fn new_session(&self, token: &str, request: &NewSessionRequest) -> Result<String> {
        let response = self
            .client
            .post(self.url(NEW_SESSION_PATH))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let session: NewSessionResponse = Self::read_json(NEW_SESSION_PATH, response).await?;
        session
            .session_uuid
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| Error::missing_field(NEW_SESSION_PATH, "session_uuid"))
    }

    async fn advance_session(
        &self,
        token: &str,
        request: &AdvanceSessionRequest,
    ) -> Result<AdvanceReceipt> {
        let response = self
            .client
            .post(self.url(SESSION_PATH))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let response = Self::check(SESSION_PATH, response).await?;

        match self.delivery {
            DeliveryMode::Discard => {
                debug!("Closing prompt stream without reading it");
                drop(response);
                Ok(AdvanceReceipt::default())
            }
            DeliveryMode::Drain => Self::drain(response).await,
        }
    }

    async fn list_sessions(&self, token: &str, query: &SessionQuery) -> Result<Vec<SessionSummary>> {
        let response = self
            .client
            .post(self.url(SESSION_LIST_PATH))
            .bearer_auth(token)
            .json(query)
            .send()
            .await?;

        let list: SessionList = Self::read_json(SESSION_LIST_PATH, response).await?;
        Ok(list.sessions.unwrap_or_default())
    }

    async fn inspect_session(&self, token: &str, query: &SessionQuery) -> Result<SessionInspection> {
        let response = self
            .client
            .post(self.url(SESSION_INSPECT_PATH))
            .bearer_auth(token)
            .json(query)
            .send()
            .await?;

        Self::read_json(SESSION_INSPECT_PATH, response).await
    }
}

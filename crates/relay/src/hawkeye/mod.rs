//! Client for the Hawkeye conversational inference API.

pub mod api;
pub mod client;
pub mod http;

pub use api::{AdvanceReceipt, InferenceApi, Project, SessionInspection, SessionQuery, SessionSummary};
pub use client::{
    find_project, BootstrapStep, InferenceClient, PromptOutcome, SessionContext, SessionState,
    StepOutcome,
};
pub use http::HttpInferenceApi;

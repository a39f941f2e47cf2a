//! Service-hook endpoint.
//!
//! Azure DevOps POSTs a pull-request event here; the handler runs one
//! full review and answers with a status code only — the review result
//! itself lives on the pull request as threads and a status check.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Serialize;
use tracing::{error, info};

use termcop_core::ReviewError;

use crate::AppState;

#[derive(Serialize)]
pub struct CheckResponse {
    pub message: String,
}

pub fn check_pr_router() -> Router<Arc<AppState>> {
    Router::new().route("/check-pr", post(check_pr_handler))
}

pub async fn check_pr_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, Json<CheckResponse>) {
    info!("Service hook received");

    match state.orchestrator.review(&body).await {
        Ok(outcome) if outcome.passed() => (
            StatusCode::OK,
            Json(CheckResponse {
                message: "check passed".to_string(),
            }),
        ),
        Ok(outcome) => (
            StatusCode::OK,
            Json(CheckResponse {
                message: format!(
                    "found {} company specific term occurrences",
                    outcome.occurrences.len()
                ),
            }),
        ),
        Err(ReviewError::Payload(err)) => {
            error!("Rejecting service hook: {}", err);
            (
                StatusCode::BAD_REQUEST,
                Json(CheckResponse {
                    message: "request body is not a pull request event".to_string(),
                }),
            )
        }
        Err(err @ ReviewError::Configuration) => {
            error!("{}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CheckResponse {
                    message: err.to_string(),
                }),
            )
        }
        Err(ReviewError::Runtime(err)) => {
            error!("Review failed: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CheckResponse {
                    message: "review failed, check the logs".to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use termcop_core::{
        PullRequestIteration, ReviewOrchestrator, StatusState, ThreadAnchor, ThreadAnnotation,
        VcsClient,
    };

    /// A pull request with one empty iteration: reviews complete with
    /// zero occurrences and every write succeeds silently.
    struct EmptyPullRequest;

    #[async_trait]
    impl VcsClient for EmptyPullRequest {
        async fn get_iterations(
            &self,
            _project_id: &str,
            _repository_id: &str,
            _pull_request_id: u64,
        ) -> Result<Vec<PullRequestIteration>> {
            Ok(vec![PullRequestIteration { id: Some(1) }])
        }

        async fn get_changed_paths(
            &self,
            _project_id: &str,
            _repository_id: &str,
            _pull_request_id: u64,
            _current_iteration: i32,
            _iteration_to_compare: i32,
        ) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn get_file_content(
            &self,
            _repository_id: &str,
            _path: &str,
            _branch: &str,
        ) -> Result<Option<String>> {
            Ok(None)
        }

        async fn get_existing_threads(
            &self,
            _project_id: &str,
            _repository_id: &str,
            _pull_request_id: u64,
        ) -> Result<Vec<ThreadAnchor>> {
            Ok(vec![])
        }

        async fn create_thread(
            &self,
            _project_id: &str,
            _repository_id: &str,
            _pull_request_id: u64,
            _annotation: &ThreadAnnotation,
        ) -> Result<()> {
            Ok(())
        }

        async fn post_status(
            &self,
            _repository_id: &str,
            _pull_request_id: u64,
            _state: StatusState,
            _description: &str,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn app_state(terms: &[&str]) -> Arc<AppState> {
        Arc::new(AppState {
            orchestrator: ReviewOrchestrator::new(
                Arc::new(EmptyPullRequest),
                terms.iter().map(|t| t.to_string()).collect(),
                vec![],
            ),
        })
    }

    fn payload() -> String {
        serde_json::json!({
            "resource": {
                "repository": { "id": "repo-1", "project": { "id": "proj-1" } },
                "pullRequestId": 7,
                "sourceRefName": "refs/heads/main"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_completed_review_answers_ok() {
        let (status, _) = check_pr_handler(State(app_state(&["acme"])), payload()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_answers_bad_request() {
        let (status, _) = check_pr_handler(State(app_state(&["acme"])), "{".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_terms_answer_internal_server_error() {
        let (status, _) = check_pr_handler(State(app_state(&[])), payload()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

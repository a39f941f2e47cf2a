//! Abstract version-control capability consumed by the review pipeline.
//!
//! The review logic never talks to a Git host directly; it goes through
//! this trait so that the server can plug in the real Azure DevOps REST
//! client and tests can substitute an in-memory fake.

use anyhow::Result;
use async_trait::async_trait;

use crate::iterations::PullRequestIteration;

/// Aggregate pass/fail state reported to the pull request's status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Succeeded,
    Failed,
}

/// An existing inline comment thread, flattened to the anchor the
/// idempotence check compares against: a single-line file position plus
/// the texts of its comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadAnchor {
    pub file_path: String,
    pub line: u32,
    pub start: u32,
    pub end: u32,
    pub comment_texts: Vec<String>,
}

/// A new inline annotation to create on the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadAnnotation {
    pub file_path: String,
    pub line: u32,
    pub start: u32,
    pub end: u32,
    pub message: String,
}

/// Remote pull-request operations the review pipeline depends on.
///
/// Every method performs exactly one fallible remote call; the pipeline
/// never retries and treats any `Err` as a terminal runtime failure.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// List the pull request's iterations, oldest first.
    async fn get_iterations(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<PullRequestIteration>>;

    /// List the file paths altered between two iterations.
    async fn get_changed_paths(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
        current_iteration: i32,
        iteration_to_compare: i32,
    ) -> Result<Vec<String>>;

    /// Fetch a file's text content at a branch, or `None` when the item
    /// has no text content (binary or deleted).
    async fn get_file_content(
        &self,
        repository_id: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>>;

    /// List the pull request's existing inline comment threads.
    async fn get_existing_threads(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<ThreadAnchor>>;

    /// Create a new inline comment thread.
    async fn create_thread(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
        annotation: &ThreadAnnotation,
    ) -> Result<()>;

    /// Post the aggregate status check onto the pull request.
    async fn post_status(
        &self,
        repository_id: &str,
        pull_request_id: u64,
        state: StatusState,
        description: &str,
    ) -> Result<()>;
}

//! Azure DevOps Git REST client.
//!
//! Implements the review pipeline's `VcsClient` capability against
//! `https://dev.azure.com/{organization}`, authenticating with a
//! personal access token over basic auth (empty username).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use termcop_core::{PullRequestIteration, StatusState, ThreadAnchor, ThreadAnnotation, VcsClient};

const API_VERSION: &str = "7.1";
/// The pull-request statuses API is still versioned as a preview.
const STATUS_API_VERSION: &str = "7.1-preview.1";

/// Name under which the aggregate status appears in branch policies.
pub const STATUS_CONTEXT_NAME: &str = "companyspecific-status-check";
pub const STATUS_CONTEXT_GENRE: &str = "termcop";

#[derive(Clone)]
pub struct AzureDevOpsClient {
    client: Client,
    base_url: String,
    pat: String,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationChangesResponse {
    #[serde(default)]
    change_entries: Vec<ChangeEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangeEntry {
    item: Option<ChangeItem>,
}

#[derive(Debug, Deserialize)]
struct ChangeItem {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistingThread {
    thread_context: Option<ExistingThreadContext>,
    #[serde(default)]
    comments: Vec<ExistingComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistingThreadContext {
    file_path: Option<String>,
    right_file_start: Option<FilePosition>,
    right_file_end: Option<FilePosition>,
}

#[derive(Debug, Deserialize)]
struct ExistingComment {
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FilePosition {
    line: u32,
    offset: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateThreadRequest {
    status: &'static str,
    comments: Vec<NewComment>,
    thread_context: NewThreadContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewComment {
    parent_comment_id: u32,
    content: String,
    comment_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewThreadContext {
    file_path: String,
    right_file_start: FilePosition,
    right_file_end: FilePosition,
}

#[derive(Debug, Serialize)]
struct CreateStatusRequest {
    context: StatusContext,
    state: &'static str,
    description: String,
}

#[derive(Debug, Serialize)]
struct StatusContext {
    name: &'static str,
    genre: &'static str,
}

impl AzureDevOpsClient {
    pub fn new(organization: &str, pat: String) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://dev.azure.com/{}", organization),
            pat,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).basic_auth("", Some(&self.pat))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url).basic_auth("", Some(&self.pat))
    }
}

#[async_trait]
impl VcsClient for AzureDevOpsClient {
    async fn get_iterations(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<PullRequestIteration>> {
        let url = format!(
            "{}/{}/_apis/git/repositories/{}/pullRequests/{}/iterations",
            self.base_url, project_id, repository_id, pull_request_id
        );

        info!("Fetching iterations for pull request {}", pull_request_id);

        let response = self
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .context("Failed to send iterations request")?;
        let response = check_response(response, "iterations fetch").await?;

        let iterations: ValueList<PullRequestIteration> = response
            .json()
            .await
            .context("Failed to parse iterations response")?;

        info!("Found {} iterations", iterations.value.len());
        Ok(iterations.value)
    }

    async fn get_changed_paths(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
        current_iteration: i32,
        iteration_to_compare: i32,
    ) -> Result<Vec<String>> {
        let url = format!(
            "{}/{}/_apis/git/repositories/{}/pullRequests/{}/iterations/{}/changes",
            self.base_url, project_id, repository_id, pull_request_id, current_iteration
        );

        info!(
            "Fetching changes of iteration {} against {}",
            current_iteration, iteration_to_compare
        );

        let response = self
            .get(&url)
            .query(&[
                ("$compareTo", iteration_to_compare.to_string().as_str()),
                ("api-version", API_VERSION),
            ])
            .send()
            .await
            .context("Failed to send iteration changes request")?;
        let response = check_response(response, "iteration changes fetch").await?;

        let changes: IterationChangesResponse = response
            .json()
            .await
            .context("Failed to parse iteration changes response")?;

        let paths: Vec<String> = changes
            .change_entries
            .into_iter()
            .filter_map(|entry| entry.item.and_then(|item| item.path))
            .collect();

        info!("Found {} changed paths", paths.len());
        Ok(paths)
    }

    async fn get_file_content(
        &self,
        repository_id: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/_apis/git/repositories/{}/items",
            self.base_url, repository_id
        );

        info!("Fetching file content: {} at {}", path, branch);

        let response = self
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("path", path),
                ("versionDescriptor.version", branch),
                ("includeContent", "true"),
                ("api-version", API_VERSION),
            ])
            .send()
            .await
            .context("Failed to send file content request")?;

        // A path can be gone at the head revision (deleted in a later
        // iteration); the file is then skipped, not an error.
        if response.status() == StatusCode::NOT_FOUND {
            info!("No item at {} on {}", path, branch);
            return Ok(None);
        }
        let response = check_response(response, "file content fetch").await?;

        let item: ItemResponse = response
            .json()
            .await
            .context("Failed to parse file content response")?;

        Ok(item.content)
    }

    async fn get_existing_threads(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<ThreadAnchor>> {
        let url = format!(
            "{}/{}/_apis/git/repositories/{}/pullRequests/{}/threads",
            self.base_url, project_id, repository_id, pull_request_id
        );

        info!("Fetching comment threads of pull request {}", pull_request_id);

        let response = self
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .context("Failed to send threads request")?;
        let response = check_response(response, "threads fetch").await?;

        let threads: ValueList<ExistingThread> = response
            .json()
            .await
            .context("Failed to parse threads response")?;

        Ok(threads
            .value
            .into_iter()
            .filter_map(anchor_from_thread)
            .collect())
    }

    async fn create_thread(
        &self,
        project_id: &str,
        repository_id: &str,
        pull_request_id: u64,
        annotation: &ThreadAnnotation,
    ) -> Result<()> {
        let url = format!(
            "{}/{}/_apis/git/repositories/{}/pullRequests/{}/threads",
            self.base_url, project_id, repository_id, pull_request_id
        );

        info!(
            "Creating comment thread at {}:{}",
            annotation.file_path, annotation.line
        );

        let request_body = CreateThreadRequest {
            status: "active",
            comments: vec![NewComment {
                parent_comment_id: 0,
                content: annotation.message.clone(),
                comment_type: "codeChange",
            }],
            thread_context: NewThreadContext {
                file_path: annotation.file_path.clone(),
                right_file_start: FilePosition {
                    line: annotation.line,
                    offset: annotation.start,
                },
                right_file_end: FilePosition {
                    line: annotation.line,
                    offset: annotation.end,
                },
            },
        };

        let response = self
            .post(&url)
            .query(&[("api-version", API_VERSION)])
            .json(&request_body)
            .send()
            .await
            .context("Failed to send thread creation request")?;
        check_response(response, "thread creation").await?;

        Ok(())
    }

    async fn post_status(
        &self,
        repository_id: &str,
        pull_request_id: u64,
        state: StatusState,
        description: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/_apis/git/repositories/{}/pullRequests/{}/statuses",
            self.base_url, repository_id, pull_request_id
        );

        let state = match state {
            StatusState::Succeeded => "succeeded",
            StatusState::Failed => "failed",
        };

        info!(
            "Posting {} status to pull request {}",
            state, pull_request_id
        );

        let request_body = CreateStatusRequest {
            context: StatusContext {
                name: STATUS_CONTEXT_NAME,
                genre: STATUS_CONTEXT_GENRE,
            },
            state,
            description: description.to_string(),
        };

        let response = self
            .post(&url)
            .query(&[("api-version", STATUS_API_VERSION)])
            .json(&request_body)
            .send()
            .await
            .context("Failed to send status request")?;
        check_response(response, "status post").await?;

        Ok(())
    }
}

/// Flatten a thread response into the anchor the idempotence check
/// compares against. Threads without a single-line file context
/// (general discussion, multi-line suggestions) are dropped.
fn anchor_from_thread(thread: ExistingThread) -> Option<ThreadAnchor> {
    let context = thread.thread_context?;
    let file_path = context.file_path?;
    let start = context.right_file_start?;
    let end = context.right_file_end?;
    if start.line != end.line {
        return None;
    }

    Some(ThreadAnchor {
        file_path,
        line: start.line,
        start: start.offset,
        end: end.offset,
        comment_texts: thread
            .comments
            .into_iter()
            .filter_map(|comment| comment.content)
            .collect(),
    })
}

async fn check_response(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .context("Failed to read error response body")?;
    error!(
        "Azure DevOps API error during {}: {} - {}",
        operation, status, error_text
    );
    Err(anyhow!(
        "Azure DevOps API error during {}: {} - {}",
        operation,
        status,
        error_text
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_json(value: serde_json::Value) -> ExistingThread {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_anchor_from_inline_thread() {
        let thread = thread_json(serde_json::json!({
            "threadContext": {
                "filePath": "/src/main.rs",
                "rightFileStart": { "line": 3, "offset": 11 },
                "rightFileEnd": { "line": 3, "offset": 15 }
            },
            "comments": [
                { "content": "first" },
                { "content": "second" }
            ]
        }));

        let anchor = anchor_from_thread(thread).unwrap();
        assert_eq!(anchor.file_path, "/src/main.rs");
        assert_eq!(anchor.line, 3);
        assert_eq!(anchor.start, 11);
        assert_eq!(anchor.end, 15);
        assert_eq!(anchor.comment_texts, vec!["first", "second"]);
    }

    #[test]
    fn test_general_discussion_thread_has_no_anchor() {
        let thread = thread_json(serde_json::json!({
            "comments": [{ "content": "just chatting" }]
        }));

        assert!(anchor_from_thread(thread).is_none());
    }

    #[test]
    fn test_multi_line_thread_has_no_anchor() {
        let thread = thread_json(serde_json::json!({
            "threadContext": {
                "filePath": "/src/main.rs",
                "rightFileStart": { "line": 3, "offset": 1 },
                "rightFileEnd": { "line": 5, "offset": 2 }
            },
            "comments": []
        }));

        assert!(anchor_from_thread(thread).is_none());
    }

    #[test]
    fn test_deleted_comments_are_skipped() {
        let thread = thread_json(serde_json::json!({
            "threadContext": {
                "filePath": "/a.txt",
                "rightFileStart": { "line": 1, "offset": 1 },
                "rightFileEnd": { "line": 1, "offset": 5 }
            },
            "comments": [{ "content": "kept" }, {}]
        }));

        let anchor = anchor_from_thread(thread).unwrap();
        assert_eq!(anchor.comment_texts, vec!["kept"]);
    }

    #[test]
    fn test_create_thread_request_wire_shape() {
        let request = CreateThreadRequest {
            status: "active",
            comments: vec![NewComment {
                parent_comment_id: 0,
                content: "message".to_string(),
                comment_type: "codeChange",
            }],
            thread_context: NewThreadContext {
                file_path: "/a.txt".to_string(),
                right_file_start: FilePosition { line: 2, offset: 11 },
                right_file_end: FilePosition { line: 2, offset: 20 },
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["comments"][0]["parentCommentId"], 0);
        assert_eq!(json["comments"][0]["commentType"], "codeChange");
        assert_eq!(json["threadContext"]["filePath"], "/a.txt");
        assert_eq!(json["threadContext"]["rightFileStart"]["line"], 2);
        assert_eq!(json["threadContext"]["rightFileEnd"]["offset"], 20);
    }

    #[test]
    fn test_status_request_wire_shape() {
        let request = CreateStatusRequest {
            context: StatusContext {
                name: STATUS_CONTEXT_NAME,
                genre: STATUS_CONTEXT_GENRE,
            },
            state: "failed",
            description: "why".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["context"]["name"], "companyspecific-status-check");
        assert_eq!(json["context"]["genre"], "termcop");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["description"], "why");
    }
}

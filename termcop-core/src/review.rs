//! Review orchestration for one pull-request snapshot.
//!
//! One invocation drives the whole pipeline: parse the service-hook
//! payload, resolve the iteration range, scan every changed file for
//! every configured term, create inline annotations idempotently, and
//! post exactly one aggregate status.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::iterations::select_iterations_to_compare;
use crate::matcher::{find_term_occurrences, TermOccurrence};
use crate::vcs::{StatusState, ThreadAnnotation, VcsClient};

/// Status description when the check runs with an empty term list.
pub const NO_TERMS_DESCRIPTION: &str = "Failed because this check was enabled, but no company specific terms were added to the check. Please rectify this.";

/// Status description when at least one term occurrence was found.
pub const TERMS_FOUND_DESCRIPTION: &str = "Failed because one or multiple company specific terms were used. Check the comments for the specific file.";

/// Status description when the pipeline failed mid-run.
pub const INTERNAL_ERROR_DESCRIPTION: &str = "Failed because this check was enabled, but an error was thrown. Check the logs for more information.";

/// Status description when no occurrences were found.
pub const CHECK_PASSED_DESCRIPTION: &str = "Check passed successfully.";

/// The pull-request event body posted by the service hook.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestInformation {
    pub resource: Resource,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub repository: Repository,
    pub pull_request_id: u64,
    pub source_ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: String,
    pub project: Project,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
}

/// How one review invocation failed.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The trigger body was missing or did not deserialize into a
    /// pull-request event. No remote calls were made.
    #[error("pull request payload could not be parsed: {0}")]
    Payload(#[source] serde_json::Error),

    /// The check is enabled but no terms are configured. A failing
    /// status was posted before this was returned.
    #[error("check is enabled but no company specific terms are configured")]
    Configuration,

    /// A remote call or the matcher failed mid-pipeline, after a
    /// best-effort attempt to post a failing status.
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

/// Everything found across all files and terms for one PR snapshot.
#[derive(Debug, Clone, Default)]
pub struct ReviewOutcome {
    pub occurrences: Vec<TermOccurrence>,
}

impl ReviewOutcome {
    pub fn passed(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// The inline comment text for one occurrence.
pub fn annotation_message(occurrence: &TermOccurrence) -> String {
    format!(
        "The company specific term {} was found in this file for word {}. Please fix this.",
        occurrence.term_searched, occurrence.word_found
    )
}

/// Drives one review per service-hook delivery.
///
/// Holds no state between invocations; idempotence across redeliveries
/// comes entirely from the annotation check against the remote thread
/// list.
pub struct ReviewOrchestrator {
    client: Arc<dyn VcsClient>,
    terms: Vec<String>,
    accepted_terms: Vec<String>,
}

impl ReviewOrchestrator {
    pub fn new(
        client: Arc<dyn VcsClient>,
        terms: Vec<String>,
        accepted_terms: Vec<String>,
    ) -> Self {
        Self {
            client,
            terms,
            accepted_terms,
        }
    }

    /// Run the full pipeline for one service-hook body.
    pub async fn review(&self, body: &str) -> Result<ReviewOutcome, ReviewError> {
        let pr: PullRequestInformation =
            serde_json::from_str(body).map_err(ReviewError::Payload)?;
        let resource = &pr.resource;

        info!(
            "Reviewing pull request {} in repository {}",
            resource.pull_request_id, resource.repository.id
        );

        if self.terms.is_empty() {
            error!("No company specific terms configured, failing the check");
            self.client
                .post_status(
                    &resource.repository.id,
                    resource.pull_request_id,
                    StatusState::Failed,
                    NO_TERMS_DESCRIPTION,
                )
                .await?;
            return Err(ReviewError::Configuration);
        }

        match self.validate_pull_request(&pr).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!("Review pipeline failed: {:#}", err);
                // Best-effort failing status. If this post fails too, the
                // secondary failure is the one surfaced to the caller.
                self.client
                    .post_status(
                        &resource.repository.id,
                        resource.pull_request_id,
                        StatusState::Failed,
                        INTERNAL_ERROR_DESCRIPTION,
                    )
                    .await?;
                Err(ReviewError::Runtime(err))
            }
        }
    }

    /// The remote half of the pipeline: everything after payload
    /// parsing and configuration validation.
    async fn validate_pull_request(&self, pr: &PullRequestInformation) -> Result<ReviewOutcome> {
        let resource = &pr.resource;
        let repository_id = &resource.repository.id;
        let project_id = &resource.repository.project.id;

        let iterations = self
            .client
            .get_iterations(project_id, repository_id, resource.pull_request_id)
            .await?;
        let range = select_iterations_to_compare(&iterations)?;

        info!(
            "Comparing iteration {} against iteration {}",
            range.current_iteration, range.iteration_to_compare
        );

        let changed = self
            .client
            .get_changed_paths(
                project_id,
                repository_id,
                resource.pull_request_id,
                range.current_iteration,
                range.iteration_to_compare,
            )
            .await?;
        let paths = distinct_paths(changed);

        let branch = resource
            .source_ref_name
            .strip_prefix("refs/heads/")
            .unwrap_or(&resource.source_ref_name);

        let mut outcome = ReviewOutcome::default();
        for path in &paths {
            let Some(content) = self
                .client
                .get_file_content(repository_id, path, branch)
                .await?
            else {
                info!("Skipping {}: no text content on {}", path, branch);
                continue;
            };

            for term in &self.terms {
                let found = find_term_occurrences(&content, term, path, &self.accepted_terms)?;
                outcome.occurrences.extend(found);
            }
        }

        for occurrence in &outcome.occurrences {
            self.ensure_annotation(pr, occurrence).await?;
        }

        if outcome.passed() {
            self.client
                .post_status(
                    repository_id,
                    resource.pull_request_id,
                    StatusState::Succeeded,
                    CHECK_PASSED_DESCRIPTION,
                )
                .await?;
        } else {
            info!(
                "Found {} company specific term occurrences",
                outcome.occurrences.len()
            );
            self.client
                .post_status(
                    repository_id,
                    resource.pull_request_id,
                    StatusState::Failed,
                    TERMS_FOUND_DESCRIPTION,
                )
                .await?;
        }

        Ok(outcome)
    }

    /// Create the inline annotation for one occurrence unless an
    /// identical one already exists.
    ///
    /// The thread list is fetched fresh on every attempt; a thread
    /// counts as identical when its anchor and one of its comment texts
    /// both match.
    async fn ensure_annotation(
        &self,
        pr: &PullRequestInformation,
        occurrence: &TermOccurrence,
    ) -> Result<()> {
        let resource = &pr.resource;
        let message = annotation_message(occurrence);

        let threads = self
            .client
            .get_existing_threads(
                &resource.repository.project.id,
                &resource.repository.id,
                resource.pull_request_id,
            )
            .await?;

        let already_posted = threads.iter().any(|thread| {
            thread.file_path == occurrence.file_path
                && thread.line == occurrence.line_number
                && thread.start == occurrence.start
                && thread.end == occurrence.end
                && thread.comment_texts.iter().any(|text| text == &message)
        });
        if already_posted {
            info!(
                "Annotation already exists at {}:{}, skipping",
                occurrence.file_path, occurrence.line_number
            );
            return Ok(());
        }

        let annotation = ThreadAnnotation {
            file_path: occurrence.file_path.clone(),
            line: occurrence.line_number,
            start: occurrence.start,
            end: occurrence.end,
            message,
        };
        self.client
            .create_thread(
                &resource.repository.project.id,
                &resource.repository.id,
                resource.pull_request_id,
                &annotation,
            )
            .await
    }
}

/// Deduplicate paths while keeping first-seen order.
fn distinct_paths(paths: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

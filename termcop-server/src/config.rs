use anyhow::{Context, Result};
use std::env;

#[derive(Clone)]
pub struct Config {
    pub organization: String,
    pub pat: String,
    /// Terms that fail the check when found in changed files.
    pub company_specific_terms: Vec<String>,
    /// Whole words exempted from being flagged.
    pub accepted_terms: Vec<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let organization = env::var("AZDO_ORGANIZATION")
            .context("AZDO_ORGANIZATION environment variable is required")?;

        let pat = env::var("AZDO_PAT").context("AZDO_PAT environment variable is required")?;

        let company_specific_terms = parse_term_list(
            &env::var("COMPANY_SPECIFIC_TERMS")
                .context("COMPANY_SPECIFIC_TERMS environment variable is required")?,
        );

        let accepted_terms = parse_term_list(&env::var("ACCEPTED_TERMS").unwrap_or_default());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            organization,
            pat,
            company_specific_terms,
            accepted_terms,
            port,
        })
    }
}

/// Split a comma-separated configuration value into terms.
///
/// Entries are trimmed and blanks dropped, so ` , acme, ` yields just
/// `["acme"]`.
pub fn parse_term_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

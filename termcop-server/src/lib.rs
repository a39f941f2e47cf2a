pub mod azdo;
pub mod config;
pub mod webhook;

use termcop_core::ReviewOrchestrator;

pub struct AppState {
    pub orchestrator: ReviewOrchestrator,
}

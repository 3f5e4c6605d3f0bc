pub mod config;
pub mod disclaimer;
pub mod download;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod server;
pub mod service;
pub mod session;
pub mod topic;
pub mod transport;
pub mod video;

pub use crate::config::Config;
pub use crate::error::{CompanionError, Result};
pub use crate::orchestrator::{FailureKind, Outcome, ResponseOrchestrator};
pub use crate::service::CompanionService;

//! Status source and captcha capabilities.
//!
//! The manager only sees these traits; the CEAC scrape itself lives in
//! [`ceac`] and the captcha solvers in [`captcha`].

pub mod captcha;
pub mod ceac;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The identity of one visa application, as the remote tracker wants it.
#[derive(Debug, Clone)]
pub struct CaseIdentity {
    pub location: String,
    pub number: String,
    pub passport_number: String,
    pub surname: String,
}

/// Outcome of one remote status check. Failure is in-band: `success = false`
/// with `error` set and no status fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub status: Option<String>,
    pub last_updated: Option<String>,
    pub case_created: Option<String>,
    pub visa_type: Option<String>,
    pub description: Option<String>,
    pub application_number: String,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failure(application_number: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            last_updated: None,
            case_created: None,
            visa_type: None,
            description: None,
            application_number: application_number.to_string(),
            error: Some(error.into()),
        }
    }
}

/// One captcha-solving capability. The core never inspects captcha content;
/// it just moves bytes to a solver and text back.
#[async_trait::async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

/// A remote status tracker, reduced to a single query capability.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn query(&self, identity: &CaseIdentity, solver: &dyn CaptchaSolver) -> QueryResult;
}

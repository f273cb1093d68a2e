//! Captcha solvers: a remote HTTP service and an interactive manual fallback.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use super::CaptchaSolver;

/// Posts the captcha image to an external solver service and reads the
/// recognized text back as the response body.
pub struct RemoteCaptchaSolver {
    client: Client,
    endpoint: String,
}

impl RemoteCaptchaSolver {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CaptchaSolver for RemoteCaptchaSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(image.to_vec())
            .send()
            .await
            .context("captcha solver request failed")?;

        if !resp.status().is_success() {
            bail!("captcha solver returned {}", resp.status());
        }
        let text = resp.text().await.context("captcha solver response unreadable")?;
        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("captcha solver returned an empty answer");
        }
        Ok(text)
    }
}

/// Saves the captcha image next to the process and prompts the operator to
/// type it in. Blocking stdin is acceptable here: the run is single-shot and
/// already waiting on a human.
pub struct ManualCaptchaSolver;

#[async_trait::async_trait]
impl CaptchaSolver for ManualCaptchaSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        let path = std::env::current_dir()?.join("captcha.jpg");
        std::fs::write(&path, image)
            .with_context(|| format!("writing {}", path.display()))?;

        println!("\nCaptcha image saved to: {}", path.display());
        print!("Enter captcha: ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("reading captcha answer")?;
        Ok(answer.trim().to_string())
    }
}

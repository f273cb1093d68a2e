//! CEAC status tracker source.
//!
//! The tracker is a classic ASP.NET form: the page carries hidden view-state
//! fields and a captcha image, and the lookup is a POST of those fields plus
//! the case identity. All failures are reported in-band through
//! [`QueryResult::failure`]; the manager never sees a transport error.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use tracing::debug;

use super::{CaptchaSolver, CaseIdentity, QueryResult, StatusSource};

pub const STATUS_URL: &str = "https://ceac.state.gov/CEACStatTracker/Status.aspx?App=NIV";

pub struct CeacStatusSource {
    client: Client,
    status_url: String,
}

impl Default for CeacStatusSource {
    fn default() -> Self {
        Self::new(STATUS_URL)
    }
}

impl CeacStatusSource {
    pub fn new(status_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .cookie_store(true)
                .user_agent("Mozilla/5.0 (X11; Linux x86_64) visawatch/0.1")
                .build()
                .expect("Failed to build HTTP client"),
            status_url: status_url.to_string(),
        }
    }

    async fn query_inner(
        &self,
        identity: &CaseIdentity,
        solver: &dyn CaptchaSolver,
    ) -> Result<QueryResult> {
        // 1. Fetch the form page for view state and the captcha image URL.
        let page = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .context("fetching status page")?
            .error_for_status()
            .context("status page request rejected")?
            .text()
            .await
            .context("reading status page")?;

        let viewstate = extract_input_value(&page, "__VIEWSTATE")
            .context("page missing __VIEWSTATE")?;
        let viewstate_generator = extract_input_value(&page, "__VIEWSTATEGENERATOR")
            .context("page missing __VIEWSTATEGENERATOR")?;
        let event_validation = extract_input_value(&page, "__EVENTVALIDATION")
            .context("page missing __EVENTVALIDATION")?;
        let captcha_path =
            extract_captcha_src(&page).context("page missing captcha image")?;

        // 2. Fetch and solve the captcha. The src comes out of the page
        // entity-encoded.
        let captcha_url = join_url(&self.status_url, &captcha_path.replace("&amp;", "&"));
        debug!(url = %captcha_url, "Fetching captcha image");
        let image = self
            .client
            .get(&captcha_url)
            .send()
            .await
            .context("fetching captcha image")?
            .error_for_status()
            .context("captcha image request rejected")?
            .bytes()
            .await
            .context("reading captcha image")?;
        let captcha_text = solver.solve(&image).await.context("solving captcha")?;

        // 3. Post the lookup form.
        let form = [
            ("__VIEWSTATE", viewstate.as_str()),
            ("__VIEWSTATEGENERATOR", viewstate_generator.as_str()),
            ("__EVENTVALIDATION", event_validation.as_str()),
            ("ctl00$ContentPlaceHolder1$Visa_Application_Type", "NIV"),
            ("ctl00$ContentPlaceHolder1$Location_Dropdown", identity.location.as_str()),
            ("ctl00$ContentPlaceHolder1$Visa_Case_Number", identity.number.as_str()),
            ("ctl00$ContentPlaceHolder1$Passport_Number", identity.passport_number.as_str()),
            ("ctl00$ContentPlaceHolder1$Surname", identity.surname.as_str()),
            ("ctl00$ContentPlaceHolder1$Captcha", captcha_text.as_str()),
            ("ctl00$ContentPlaceHolder1$btnSubmit", "Submit"),
        ];
        let result_page = self
            .client
            .post(&self.status_url)
            .form(&form)
            .send()
            .await
            .context("submitting status lookup")?
            .error_for_status()
            .context("status lookup rejected")?
            .text()
            .await
            .context("reading lookup result")?;

        // 4. Scrape the result spans.
        let status = extract_span_text(&result_page, "ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblStatus");
        let Some(status) = status else {
            if result_page.contains("Invalid Captcha") {
                bail!("tracker rejected the captcha answer");
            }
            bail!("no status found in tracker response (case not found?)");
        };

        Ok(QueryResult {
            success: true,
            status: Some(status),
            last_updated: extract_span_text(
                &result_page,
                "ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblStatusDate",
            ),
            case_created: extract_span_text(
                &result_page,
                "ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblSubmitDate",
            ),
            visa_type: extract_span_text(
                &result_page,
                "ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblCaseType",
            ),
            description: extract_span_text(
                &result_page,
                "ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblMessage",
            ),
            application_number: identity.number.clone(),
            error: None,
        })
    }
}

#[async_trait::async_trait]
impl StatusSource for CeacStatusSource {
    async fn query(&self, identity: &CaseIdentity, solver: &dyn CaptchaSolver) -> QueryResult {
        match self.query_inner(identity, solver).await {
            Ok(result) => result,
            Err(e) => QueryResult::failure(&identity.number, format!("{e:#}")),
        }
    }
}

/// Value of `<input ... id="NAME" ... value="...">`.
fn extract_input_value(html: &str, name: &str) -> Option<String> {
    let marker = format!("id=\"{name}\"");
    let at = html.find(&marker)?;
    let tag_end = html[at..].find('>')? + at;
    let tag = &html[at..tag_end];
    extract_attr(tag, "value")
}

/// `src` of the captcha `<img>`, identified by the BotDetect naming scheme.
fn extract_captcha_src(html: &str) -> Option<String> {
    let at = html.find("CaptchaImage")?;
    let tag_start = html[..at].rfind("<img")?;
    let tag_end = html[tag_start..].find('>')? + tag_start;
    extract_attr(&html[tag_start..tag_end], "src")
}

/// Inner text of `<span id="NAME">...</span>`, trimmed; `None` when absent
/// or empty.
fn extract_span_text(html: &str, id: &str) -> Option<String> {
    let marker = format!("id=\"{id}\"");
    let at = html.find(&marker)?;
    let open_end = html[at..].find('>')? + at + 1;
    let close = html[open_end..].find("</span>")? + open_end;
    let text = html[open_end..close].trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let marker = format!("{attr}=\"");
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

/// Resolve a relative `src` against the page URL's origin and directory.
fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if let Some(rest) = base.strip_prefix("https://").or_else(|| base.strip_prefix("http://")) {
        let scheme_len = base.len() - rest.len();
        if path.starts_with('/') {
            let host_end = rest.find('/').map(|i| i + scheme_len).unwrap_or(base.len());
            return format!("{}{}", &base[..host_end], path);
        }
    }
    match base.rfind('/') {
        Some(i) if i > "https://".len() => format!("{}/{}", &base[..i], path),
        _ => format!("{base}/{path}"),
    }
}

//! Portal login and page fetching.
//!
//! A `Session` owns the HTTP client and its cookie jar. It is created once per
//! run and handed to whatever needs to talk to the portal.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::Config;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USERNAME_FIELD: &str = "username";
const PASSWORD_FIELD: &str = "password";

pub struct Session {
    client: reqwest::Client,
    forms: FormReader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

impl Session {
    /// `verbose` turns on reqwest's connection tracing, which shows the raw
    /// traffic at trace level.
    pub fn new(verbose: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .connection_verbose(verbose)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            forms: FormReader::new(),
        })
    }

    async fn get_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Fill in and submit the first form on the login page.
    pub async fn login(&self, config: &Config) -> Result<()> {
        let page = self.get_html(&config.login_url).await?;
        let form = self
            .forms
            .login_form(&page, &config.login_url, &config.username, &config.password)?;
        debug!(action = %form.action, fields = form.fields.len(), "submitting login form");

        let response = self
            .client
            .post(form.action.clone())
            .form(&form.fields)
            .send()
            .await
            .with_context(|| format!("POST {} failed", form.action))?;

        let status = response.status();
        if !status.is_success() {
            bail!("login rejected: HTTP {} for {}", status, form.action);
        }

        info!(user = %config.username, "logged in");
        Ok(())
    }

    pub async fn fetch_grades_page(&self, config: &Config) -> Result<String> {
        let url = config.grades_url()?;
        let page = self.get_html(&url).await?;
        debug!(%url, bytes = page.len(), "fetched grades page");
        Ok(page)
    }
}

pub struct FormReader {
    form: Selector,
    input: Selector,
}

impl Default for FormReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FormReader {
    pub fn new() -> Self {
        Self {
            form: Selector::parse("form").expect("static selector"),
            input: Selector::parse("input[name]").expect("static selector"),
        }
    }

    /// Read the first `<form>` of a page: where it posts to, and its named
    /// inputs with the login fields filled in.
    pub fn login_form(
        &self,
        page: &str,
        page_url: &Url,
        username: &str,
        password: &str,
    ) -> Result<LoginForm> {
        let html = Html::parse_document(page);
        let form = html
            .select(&self.form)
            .next()
            .context("login page has no form")?;

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page_url
                .join(action)
                .with_context(|| format!("bad form action {action:?}"))?,
            _ => page_url.clone(),
        };

        let mut fields: Vec<(String, String)> = Vec::new();
        for input in form.select(&self.input) {
            let el = input.value();
            let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
            let skip = match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => true,
                "checkbox" | "radio" => el.attr("checked").is_none(),
                _ => false,
            };
            if skip {
                continue;
            }
            if let Some(name) = el.attr("name") {
                fields.push((name.to_string(), el.attr("value").unwrap_or("").to_string()));
            }
        }

        for (name, value) in [(USERNAME_FIELD, username), (PASSWORD_FIELD, password)] {
            match fields.iter_mut().find(|(field, _)| field == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => fields.push((name.to_string(), value.to_string())),
            }
        }

        Ok(LoginForm { action, fields })
    }
}

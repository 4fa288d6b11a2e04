//! Remote account generation.
//!
//! The service answers `GET /v1/generate` with free-form text that contains
//! at least one account. [`extract_account`] digs the first usable
//! `username` / token pair out of it.

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::interchange::{parse_line, Entry, SEPARATOR};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;

const USER_AGENT: &str = concat!("cachelogin/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Three `ey`-prefixed base64url segments.
static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(ey[A-Za-z0-9\-_]+\.ey[A-Za-z0-9\-_]+\.ey[A-Za-z0-9\-_]+)").expect("Invalid regex")
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("Invalid regex")
});

/// A name followed by a separator and, somewhere later, a token label.
static LABELED_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-zA-Z0-9_]+)[:\s]+.*?(?:mctoken|token|accesstoken)").expect("Invalid regex")
});

/// Client for the account generation service.
pub struct GeneratorClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeneratorClient {
    /// Create a client. Fails when no API key is configured.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::invalid_input("API key not set. Set one with `cachelogin config set-api-key`"))?
            .to_string();

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Generator(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Request `amount` accounts of `kind` and return the raw response text.
    pub fn generate(&self, kind: &str, amount: u32, precheck: &str) -> Result<String> {
        let url = format!("{}/v1/generate", self.base_url);
        tracing::debug!(url = %url, kind, amount, precheck, "requesting accounts");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("type", kind),
                ("amount", amount.to_string().as_str()),
                ("precheck", precheck),
            ])
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| Error::Generator(e.to_string()))?;

        let status = response.status();
        let body = response.text().map_err(|e| Error::Generator(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Generator(error_message(status, &body)));
        }

        let body = body.trim();
        if body.is_empty() {
            return Err(Error::Generator("empty response from API".to_string()));
        }
        Ok(body.to_string())
    }
}

/// Error text for a failed response: the JSON `detail` or `error` field,
/// falling back to the HTTP status.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "error"]
                .iter()
                .find_map(|field| json.get(field)?.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// Find the first account in a generation response.
///
/// For each line holding a token, the username is the local part of an
/// e-mail address on that line, or a name labeled before the token. A
/// literal `username----token` line also counts when its token looks valid.
pub fn parse_account(raw: &str) -> Option<Entry> {
    for line in raw.split(['\r', '\n']).filter(|l| !l.is_empty()) {
        if let Some(token) = TOKEN_REGEX.captures(line).and_then(|c| c.get(1)) {
            let token = token.as_str();

            if let Some(email) = EMAIL_REGEX.captures(line).and_then(|c| c.get(1)) {
                let username = email.as_str().split('@').next().unwrap_or_default();
                return Some(Entry::new(username, token));
            }

            if let Some(name) = LABELED_NAME_REGEX.captures(line).and_then(|c| c.get(1)) {
                return Some(Entry::new(name.as_str(), token));
            }
        }

        if line.contains(SEPARATOR) {
            if let Some(entry) = parse_line(line) {
                if entry.token.starts_with("ey") && entry.token.split('.').count() == 3 {
                    return Some(entry);
                }
            }
        }
    }

    None
}

/// [`parse_account`], falling back to the first `username----token` line.
pub fn extract_account(raw: &str) -> Option<Entry> {
    parse_account(raw).or_else(|| {
        raw.split(['\r', '\n'])
            .find(|line| line.contains(SEPARATOR))
            .and_then(parse_line)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "eyAbc.eyDef-_1.eyGhi";

    #[test]
    fn test_parse_email_line() {
        let raw = format!("login: bob.smith@mail.example.org pass: hunter2 token: {}", TOKEN);
        assert_eq!(parse_account(&raw), Some(Entry::new("bob.smith", TOKEN)));
    }

    #[test]
    fn test_parse_labeled_name() {
        let raw = format!("header line\nplayer_01: secret Token {}\n", TOKEN);
        assert_eq!(parse_account(&raw), Some(Entry::new("player_01", TOKEN)));

        let raw = format!("gamer99 x ACCESSTOKEN={}", TOKEN);
        assert_eq!(parse_account(&raw), Some(Entry::new("gamer99", TOKEN)));
    }

    #[test]
    fn test_parse_separator_line() {
        let raw = format!("# result\r\n  carol----{}  \r\n", TOKEN);
        assert_eq!(parse_account(&raw), Some(Entry::new("carol", TOKEN)));
    }

    #[test]
    fn test_parse_rejects_bad_separator_token() {
        assert_eq!(parse_account("dave----not-a-token"), None);
        assert_eq!(parse_account("nothing useful"), None);
    }

    #[test]
    fn test_extract_falls_back_to_any_separator_line() {
        assert_eq!(
            extract_account("noise\ndave----opaque\n"),
            Some(Entry::new("dave", "opaque"))
        );
        assert_eq!(extract_account("noise only"), None);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(TOKEN_REGEX.is_match(TOKEN));
        assert!(EMAIL_REGEX.is_match("a.b@example.org"));
        assert!(LABELED_NAME_REGEX.is_match("name: x token"));
    }

    #[test]
    fn test_error_message() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(error_message(status, r#"{"detail":"bad key"}"#), "bad key");
        assert_eq!(error_message(status, r#"{"error":"quota"}"#), "quota");
        assert_eq!(error_message(status, "<html>"), "HTTP 401 Unauthorized");
        assert_eq!(error_message(status, r#"{"detail":5}"#), "HTTP 401 Unauthorized");
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = GeneratorConfig::default();
        assert!(matches!(GeneratorClient::new(&config), Err(Error::InvalidInput(_))));

        let config = GeneratorConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(GeneratorClient::new(&config), Err(Error::InvalidInput(_))));
    }
}

//! Public community profile lookups.
//!
//! Two pages are read per account: the owned-games listing decides whether
//! the account owns Counter-Strike (app 730), and the profile page yields the
//! avatar URL. Both are scraped; there is no API key involved.

use crate::config::ProfileConfig;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use std::time::Duration;

/// Browser-like agent; the community site serves reduced pages otherwise.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const GAMES_TIMEOUT: Duration = Duration::from_secs(10);
const PROFILE_TIMEOUT: Duration = Duration::from_secs(5);

/// Application id of Counter-Strike 2.
const CS2_APP_ID: &str = "730";

static CDN_AVATAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https://avatars\.steamstatic\.com/[^"\s]+\.jpg"#).expect("Invalid regex")
});

static HEADER_AVATAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)profile_header_avatar[^>]+src="([^"]+)""#).expect("Invalid regex")
});

static PLAYER_AVATAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)playerAvatar[^>]+src="([^"]+)""#).expect("Invalid regex")
});

/// What the community site says about one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Owns app 730.
    pub is_prime: bool,
    /// Avatar image URL, if the page showed one.
    pub avatar_url: Option<String>,
}

/// Client for the community profile pages.
pub struct ProfileClient {
    client: Client,
    base_url: String,
}

impl ProfileClient {
    /// Create a client for the configured community site.
    pub fn new(config: &ProfileConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Profile(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch both pages for `steam_id`.
    pub fn lookup(&self, steam_id: &str) -> Result<Profile> {
        let steam_id = steam_id.trim();
        if steam_id.is_empty() || !steam_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_input(format!("not a profile id: {:?}", steam_id)));
        }

        let profile_url = format!("{}/profiles/{}", self.base_url, steam_id);
        let games = self.fetch(
            &format!("{}/games/?tab=all&xml=1", profile_url),
            GAMES_TIMEOUT,
        )?;
        let page = self.fetch(&profile_url, PROFILE_TIMEOUT)?;

        let profile = Profile {
            is_prime: owns_cs2(&games),
            avatar_url: avatar_url(&page),
        };
        tracing::debug!(steam_id, is_prime = profile.is_prime, "profile looked up");
        Ok(profile)
    }

    fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| Error::Profile(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Profile(format!("HTTP {} from {}", status, url)));
        }
        response.text().map_err(|e| Error::Profile(e.to_string()))
    }
}

/// Whether an owned-games page lists Counter-Strike.
///
/// The XML listing uses `<appID>730</appID>`; the HTML fallbacks carry the id
/// in attributes or next to the game title.
pub fn owns_cs2(page: &str) -> bool {
    let tagged = [
        format!("appID>{}<", CS2_APP_ID),
        format!("\"{}\"", CS2_APP_ID),
        format!("appid=\"{}\"", CS2_APP_ID),
        format!("appid={}", CS2_APP_ID),
    ];
    if tagged.iter().any(|marker| page.contains(marker.as_str())) {
        return true;
    }
    page.contains(CS2_APP_ID) && (page.contains("Counter-Strike") || page.contains("CS2"))
}

/// Avatar URL from a profile page.
///
/// A CDN `.jpg` link anywhere on the page wins; otherwise the `src` of the
/// header or player avatar image, when it is absolute.
pub fn avatar_url(page: &str) -> Option<String> {
    if let Some(found) = CDN_AVATAR_REGEX.find(page) {
        return Some(found.as_str().to_string());
    }

    [&*HEADER_AVATAR_REGEX, &*PLAYER_AVATAR_REGEX]
        .into_iter()
        .filter_map(|re| re.captures(page)?.get(1))
        .map(|m| m.as_str())
        .find(|src| src.starts_with("http"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<gamesList>
	<steamID64>76561198000000001</steamID64>
	<games>
		<game>
			<appID>730</appID>
			<name><![CDATA[Counter-Strike 2]]></name>
		</game>
		<game>
			<appID>570</appID>
			<name><![CDATA[Dota 2]]></name>
		</game>
	</games>
</gamesList>"#;

    const PROFILE_HTML: &str = r#"<html><body>
<div class="playerAvatar profile_header_size online">
	<div class="playerAvatarAutoSizeInner">
		<img src="https://avatars.steamstatic.com/0123456789abcdef_full.jpg">
	</div>
</div>
</body></html>"#;

    #[test]
    fn test_owns_cs2_from_games_xml() {
        assert!(owns_cs2(GAMES_XML));
    }

    #[test]
    fn test_owns_cs2_html_variants() {
        assert!(owns_cs2(r#"<a data-appid="730">"#));
        assert!(owns_cs2("https://store.example/app?appid=730"));
        assert!(owns_cs2("CS2 playtime 730 hours"));
    }

    #[test]
    fn test_does_not_own_cs2() {
        let page = GAMES_XML
            .replace("<appID>730</appID>", "<appID>440</appID>")
            .replace("Counter-Strike 2", "Team Fortress 2");
        assert!(!owns_cs2(&page));
        assert!(!owns_cs2("<gamesList><error>This profile is private.</error></gamesList>"));
        // The id alone, with no title, is not enough
        assert!(!owns_cs2("member since 1730"));
    }

    #[test]
    fn test_avatar_from_cdn_link() {
        assert_eq!(
            avatar_url(PROFILE_HTML).as_deref(),
            Some("https://avatars.steamstatic.com/0123456789abcdef_full.jpg")
        );
    }

    #[test]
    fn test_avatar_from_image_src() {
        let page = r#"<img class="profile_header_avatar" src="https://cdn.example/a.png">"#;
        assert_eq!(avatar_url(page).as_deref(), Some("https://cdn.example/a.png"));

        let page = r#"<img class="playerAvatar medium" src="https://cdn.example/b.png">"#;
        assert_eq!(avatar_url(page).as_deref(), Some("https://cdn.example/b.png"));
    }

    #[test]
    fn test_avatar_relative_src_ignored() {
        let page = r#"<img class="playerAvatar" src="/images/default.png">"#;
        assert_eq!(avatar_url(page), None);
        assert_eq!(avatar_url("<html></html>"), None);
    }

    #[test]
    fn test_lookup_rejects_bad_id() {
        let client = ProfileClient::new(&ProfileConfig::default()).unwrap();
        assert!(matches!(client.lookup(""), Err(Error::InvalidInput(_))));
        assert!(matches!(client.lookup("76561198x"), Err(Error::InvalidInput(_))));
    }
}

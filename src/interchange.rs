//! Plain-text account lists: one `username----token` per line.

use crate::accounts::AccountStore;
use crate::error::{Error, Result};
use crate::token;

/// Field separator within a line.
pub const SEPARATOR: &str = "----";

/// One account line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Account name.
    pub username: String,
    /// Bearer token.
    pub token: String,
}

impl Entry {
    /// Create an entry.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.username, SEPARATOR, self.token)
    }
}

/// Parse a single line, if it holds a username and a token.
pub fn parse_line(line: &str) -> Option<Entry> {
    let mut parts = line.split(SEPARATOR);
    let username = parts.next()?.trim();
    let token = parts.next()?.trim();
    if username.is_empty() || token.is_empty() {
        return None;
    }
    Some(Entry::new(username, token))
}

/// Parse every usable line of `text`.
///
/// `\r\n`, `\r` and `\n` all end a line. Lines without a separator or with
/// a blank side are skipped; fields past the second are ignored.
pub fn parse(text: &str) -> Vec<Entry> {
    text.split(['\r', '\n']).filter_map(parse_line).collect()
}

/// Render entries, one per line.
pub fn format(entries: &[Entry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

/// Outcome of [`import_into`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Accounts saved.
    pub added: usize,
    /// Lines naming an account that was already saved.
    pub duplicates: usize,
    /// Lines whose token or fields were unusable.
    pub rejected: usize,
}

/// Save every valid account in `text` to `store`.
///
/// Each token must decode to a subject id, which is saved as the account's
/// id. Storage failures abort the import; bad lines are only counted.
pub fn import_into(store: &AccountStore, text: &str) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in parse(text) {
        let steam_id = match token::decode_subject(&entry.token) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(username = %entry.username, error = %e, "skipping line with invalid token");
                summary.rejected += 1;
                continue;
            }
        };

        match store.add_account(&entry.username, &entry.token, &steam_id) {
            Ok(true) => summary.added += 1,
            Ok(false) => summary.duplicates += 1,
            Err(Error::InvalidInput(reason)) => {
                tracing::debug!(username = %entry.username, reason = %reason, "skipping line");
                summary.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        added = summary.added,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "import finished"
    );
    Ok(summary)
}

/// Render every saved account.
pub fn export_from(store: &AccountStore) -> Result<String> {
    let entries: Vec<Entry> = store
        .list_accounts()?
        .into_iter()
        .map(|account| Entry::new(account.username, account.token))
        .collect();
    Ok(format(&entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::make_token;

    #[test]
    fn test_parse_mixed_line_endings() {
        let text = "alice----t1\r\nbob----t2\rcarol----t3\n\n";
        assert_eq!(
            parse(text),
            vec![
                Entry::new("alice", "t1"),
                Entry::new("bob", "t2"),
                Entry::new("carol", "t3")
            ]
        );
    }

    #[test]
    fn test_parse_trims_and_skips() {
        let text = "  alice  ----  t1  \nno separator here\n----t2\nbob----\ncarol----t3----extra";
        assert_eq!(parse(text), vec![Entry::new("alice", "t1"), Entry::new("carol", "t3")]);
    }

    #[test]
    fn test_format() {
        let entries = vec![Entry::new("alice", "t1"), Entry::new("bob", "t2")];
        let text = format(&entries);
        assert_eq!(text, "alice----t1\nbob----t2\n");
        assert_eq!(parse(&text), entries);
    }

    #[test]
    fn test_import_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(&dir.path().join("accounts.redb")).unwrap();
        store.add_account("dave", &make_token(r#"{"sub":"4"}"#), "4").unwrap();

        let alice = make_token(r#"{"sub":"1"}"#);
        let bob = make_token(r#"{"sub":"2"}"#);
        let text = format!(
            "alice----{alice}\nbob----{bob}\ncarol----abc.def\ndave----{dave}\n",
            dave = make_token(r#"{"sub":"4"}"#)
        );

        let summary = import_into(&store, &text).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                added: 2,
                duplicates: 1,
                rejected: 1
            }
        );
        assert_eq!(store.get("bob").unwrap().unwrap().steam_id, "2");

        let exported = parse(&export_from(&store).unwrap());
        let names: Vec<&str> = exported.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "dave"]);
        assert_eq!(exported[0].token, alice);
    }
}

//! Text hygiene for the Wikimedia boundary: outbound search terms and
//! inbound extracts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExternalError;

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[|\]\]|\{\{|\}\}").expect("static regex"));
static DANGEROUS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>"']"#).expect("static regex"));
static TEMPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{[^}]+\}\}").expect("static regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?:[^|\]]+\|)?([^\]]+)\]\]").expect("static regex"));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"));

fn collapse_whitespace(text: &str) -> String { text.split_whitespace().collect::<Vec<_>>().join(" ") }

/// Prepares a free-text query for use as an API search term: strips wiki
/// markup brackets and `< > " '`, collapses whitespace and cuts to
/// `max_len` characters at the last word boundary.
pub fn sanitize_query(query: &str, max_len: usize) -> String {
    let stripped = MARKUP.replace_all(query, "");
    let stripped = DANGEROUS.replace_all(&stripped, "");
    let collapsed = collapse_whitespace(&stripped);
    if collapsed.chars().count() <= max_len {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_len).collect();
    match cut.rsplit_once(' ') {
        Some((head, _)) => head.trim_end().to_string(),
        None => cut,
    }
}

/// Plain text from a wikitext-ish extract: templates removed, links
/// replaced by their label, HTML comments dropped.
pub fn clean_wikitext(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = TEMPLATE.replace_all(text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = COMMENT.replace_all(&text, "");
    collapse_whitespace(&text)
}

/// Cuts an extract to at most `max_len` characters, ending on the last full
/// sentence inside the limit, and terminates it with a period.
pub fn truncate_extract(extract: &str, max_len: usize) -> String {
    if extract.chars().count() <= max_len {
        return extract.to_string();
    }
    let cut: String = extract.chars().take(max_len).collect();
    match cut.rfind('.') {
        Some(i) => format!("{}.", &cut[..i]),
        None => format!("{cut}."),
    }
}

/// The agent string must identify the project and include a contact email.
pub fn validate_user_agent(user_agent: &str) -> Result<(), ExternalError> {
    let user_agent = user_agent.trim();
    if user_agent.len() < 20 || !user_agent.contains('@') {
        return Err(ExternalError::InvalidUserAgent(user_agent.to_string()));
    }
    Ok(())
}

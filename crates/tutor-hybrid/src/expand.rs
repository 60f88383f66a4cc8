use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use tutor_core::traits::TextGenerator;

/// Generated paraphrases shorter than this are dropped.
pub const MIN_VARIANT_CHARS: usize = 10;

static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s*").expect("static regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-•*]\s*").expect("static regex"));
static FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:please|could you|can you|would you|tell me)\b").expect("static regex"));

pub fn paraphrase_prompt(query: &str, count: usize) -> String {
    format!(
        "Given this question, generate {count} alternative ways to ask it.\n\
         Focus on different phrasings, synonyms, and perspectives while keeping the core meaning.\n\n\
         Original question: {query}\n\n\
         Generate ONLY the alternative questions, one per line. Do not number them or add explanations."
    )
}

/// One paraphrase per line, ordinal and bullet prefixes stripped.
pub fn parse_paraphrases(response: &str, count: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = ORDINAL.replace(line, "");
            BULLET.replace(&line, "").trim().to_string()
        })
        .filter(|line| line.chars().count() >= MIN_VARIANT_CHARS)
        .take(count)
        .collect()
}

fn strip_prefix_ci<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    let lower = text.to_lowercase();
    prefixes
        .iter()
        .find(|p| lower.starts_with(*p))
        .and_then(|p| text.get(p.len()..))
}

fn topic(rest: &str) -> String { rest.trim_matches(|c: char| c == '?' || c.is_whitespace()).to_lowercase() }

/// Deterministic rewrites used when no generator is available.
pub fn heuristic_variants(query: &str, count: usize) -> Vec<String> {
    let query = query.trim();
    let without_question = query.trim_end_matches('?').trim();
    let mut variants = Vec::new();

    if let Some(rest) = strip_prefix_ci(query, &["what is", "what are", "what's"]) {
        let topic = topic(rest);
        if !topic.is_empty() {
            variants.push(format!("Explain {topic}"));
            variants.push(format!("{topic} definition and explanation"));
        }
    } else if let Some(rest) = strip_prefix_ci(query, &["how does", "how do", "how to"]) {
        let topic = topic(rest);
        let topic = topic
            .strip_suffix(" works")
            .or_else(|| topic.strip_suffix(" work"))
            .unwrap_or(&topic)
            .trim()
            .to_string();
        if !topic.is_empty() {
            variants.push(format!("{topic} mechanism and process"));
            variants.push(format!("Understanding {topic}"));
        }
    } else if let Some(rest) = strip_prefix_ci(query, &["why"]) {
        let topic = topic(rest);
        if !topic.is_empty() {
            variants.push(format!("Reasons for {topic}"));
            variants.push(format!("{topic} explanation and causes"));
        }
    }

    if variants.len() < count {
        variants.push(format!("Key information about {without_question}"));
    }
    if variants.len() < count {
        let simplified = FILLER.replace_all(without_question, "");
        let simplified = simplified.split_whitespace().collect::<Vec<_>>().join(" ");
        if !simplified.is_empty() && simplified != query {
            variants.push(simplified);
        }
    }
    variants.truncate(count);
    variants
}

/// Produces paraphrased variants of a query. The original is always the
/// first variant.
#[derive(Clone, Default)]
pub struct QueryExpander {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self { Self { generator: Some(generator) } }

    /// Heuristic rewrites only.
    pub fn heuristic() -> Self { Self { generator: None } }

    /// At most `n` variants, de-duplicated case-insensitively in order.
    /// Generator failures (or replies with no usable line) fall back to the
    /// heuristic rewrites.
    #[instrument(skip(self))]
    pub async fn expand(&self, query: &str, n: usize) -> Vec<String> {
        let n = n.max(1);
        if query.trim().is_empty() || n == 1 {
            return vec![query.to_string()];
        }
        let wanted = n - 1;

        let generated = match &self.generator {
            Some(generator) => match generator.generate(&paraphrase_prompt(query, wanted)).await {
                Ok(reply) => {
                    let lines = parse_paraphrases(&reply, wanted);
                    if lines.is_empty() {
                        warn!("generator returned no usable paraphrases, using heuristics");
                    }
                    lines
                }
                Err(e) => {
                    warn!(error = %e, "query generation failed, falling back to heuristics");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let extra = if generated.is_empty() { heuristic_variants(query, wanted) } else { generated };

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(n);
        for candidate in std::iter::once(query.to_string()).chain(extra) {
            let key = candidate.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            out.push(candidate.trim().to_string());
            if out.len() == n {
                break;
            }
        }
        debug!(variants = out.len(), "query expanded");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ordinals_bullets_and_short_lines() {
        let reply = "1. How do plants make food from light?\n2) What does photosynthesis do?\n- Too short\n• Explain the light reactions\n\n";
        assert_eq!(
            parse_paraphrases(reply, 5),
            vec![
                "How do plants make food from light?",
                "What does photosynthesis do?",
                "Explain the light reactions",
            ]
        );
        assert_eq!(parse_paraphrases("short\nok", 5), Vec::<String>::new());
        assert_eq!(parse_paraphrases(reply, 1).len(), 1);
    }

    #[test]
    fn what_is_rewrites() {
        assert_eq!(
            heuristic_variants("What is photosynthesis?", 2),
            vec!["Explain photosynthesis", "photosynthesis definition and explanation"]
        );
    }

    #[test]
    fn how_does_rewrites_drop_trailing_work() {
        assert_eq!(
            heuristic_variants("How does a transistor work?", 2),
            vec!["a transistor mechanism and process", "Understanding a transistor"]
        );
    }

    #[test]
    fn why_rewrites() {
        assert_eq!(heuristic_variants("Why is the sky blue?", 1), vec!["Reasons for is the sky blue"]);
    }

    #[test]
    fn generic_fallback_and_filler_removal() {
        assert_eq!(
            heuristic_variants("Please tell me the causes of WW1", 2),
            vec!["Key information about Please tell me the causes of WW1", "the causes of WW1"]
        );
        // Nothing to simplify: only the generic rewrite
        assert_eq!(heuristic_variants("calculate 2 + 2", 2), vec!["Key information about calculate 2 + 2"]);
    }

    #[test]
    fn prompt_mentions_count_and_query() {
        let prompt = paraphrase_prompt("What is DNA?", 2);
        assert!(prompt.contains("generate 2 alternative"));
        assert!(prompt.contains("Original question: What is DNA?"));
    }
}

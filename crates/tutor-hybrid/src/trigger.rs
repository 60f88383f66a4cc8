/// Openers that mark a definitional question worth external augmentation.
pub const TRIGGER_PHRASES: &[&str] = &["what is", "who is", "define", "explain", "describe", "tell me about"];

/// Cheap topicality check: the query opens with a trigger phrase, or holds
/// at least two capitalized words longer than one letter (a likely named
/// entity; "I" does not count).
pub fn should_augment(query: &str) -> bool {
    let lower = query.trim_start().to_lowercase();
    if TRIGGER_PHRASES.iter().any(|t| lower.starts_with(t)) {
        return true;
    }
    let capitalized = query
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && w.chars().next().is_some_and(char::is_uppercase))
        .count();
    capitalized >= 2
}

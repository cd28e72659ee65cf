/// Heuristic classifier for FTL-style localization keys.
///
/// Prototype fields sometimes hold a reference to another localization
/// resource (`loadout-group-weapon`) instead of human-readable text; those
/// references must never be sent for translation. A symbolic key here is a
/// hyphenated chain of at least three purely alphabetic words with no
/// spaces. Requiring three segments keeps compound human tokens like
/// "AK-47" or "O-Mat" in the translatable set.
///
/// This is a heuristic; occasional misclassification is a known limitation.
pub fn is_symbolic_key(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.contains(' ') {
        return false;
    }
    if !text.contains('-') {
        return false;
    }
    let segments: Vec<&str> = text.split('-').collect();
    if segments.len() < 3 {
        return false;
    }
    // Empty segments (consecutive hyphens) are tolerated; any digit or
    // punctuation in a segment disqualifies the text.
    segments
        .iter()
        .all(|seg| seg.chars().all(|c| c.is_alphabetic()))
}

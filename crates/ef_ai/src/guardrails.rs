use ef_core::normalize::collapse_whitespace;

/// Administrative-content check: case-insensitive substring match of the prompt
/// against the configured denylist. Returns the matching entry.
pub fn administrative_match<'a>(prompt: &str, denylist: &'a [String]) -> Option<&'a str> {
    let haystack = collapse_whitespace(prompt).to_lowercase();
    denylist
        .iter()
        .map(|k| k.as_str())
        .find(|k| {
            let needle = collapse_whitespace(k).to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
}

pub fn is_administrative(prompt: &str, denylist: &[String]) -> bool {
    administrative_match(prompt, denylist).is_some()
}

//! Text normalization shared by chunking, parsing and deduplication.

pub fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for prompt deduplication: case-folded, whitespace-collapsed.
pub fn prompt_key(prompt: &str) -> String {
    collapse_whitespace(prompt).to_lowercase()
}

/// Strip list numbering the model tends to prepend: `1.`, `2)`, `Q3:`, `Question 4 -`.
pub fn strip_numbering(s: &str) -> &str {
    let t = s.trim_start();
    let rest = if let Some(r) = strip_prefix_ci(t, "question") {
        r.trim_start()
    } else if let Some(r) = strip_prefix_ci(t, "q") {
        if r.starts_with(|c: char| c.is_ascii_digit()) {
            r
        } else {
            return t.trim();
        }
    } else {
        t
    };

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return t.trim();
    }
    let after = rest[digits..].trim_start();
    match after.chars().next() {
        Some('.') | Some(')') | Some(':') | Some('-') => after[1..].trim(),
        _ => t.trim(),
    }
}

/// Strip an option label such as `A)`, `b.`, `(C)`, `D:` from the front of an option.
pub fn strip_option_label(s: &str) -> &str {
    let t = s.trim();
    let mut chars = t.char_indices();
    let (open, first) = match chars.next() {
        Some((_, '(')) => (true, chars.next()),
        other => (false, other),
    };
    let Some((_, letter)) = first else {
        return t;
    };
    if !matches!(letter.to_ascii_uppercase(), 'A'..='D') {
        return t;
    }
    let Some((idx, sep)) = chars.next() else {
        return t;
    };
    let ok = if open {
        sep == ')'
    } else {
        matches!(sep, ')' | '.' | ':')
    };
    if !ok {
        return t;
    }
    let rest = &t[idx + sep.len_utf8()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        rest.trim()
    } else {
        t
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

//! Small string helpers shared by the scanner, hasher and renderers.

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Lowercase, dash-separated form of `text` safe for file names and ids.
///
/// Spaces, underscores and commas become dashes, other punctuation is
/// dropped, and dash runs collapse.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            ' ' | '_' | ',' | '-' => '-',
            c if c.is_ascii_alphanumeric() => c,
            _ => continue,
        };
        if mapped == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(mapped);
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Split a comma-separated attribute value into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

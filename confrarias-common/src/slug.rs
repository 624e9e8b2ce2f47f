//! Slug derivation for discovery URLs
//!
//! Stored links depend on the exact transformation, so it must not change:
//! lower-case, collapse each whitespace run into one `-`, then drop every
//! character that is neither a word character (Unicode letter, digit, `_`)
//! nor `-`. Hyphens are not collapsed after stripping, so `"a : b"` becomes
//! `"a--b"`.

/// Derive a slug from a title
///
/// # Examples
///
/// ```
/// use confrarias_common::slug::derive_slug;
///
/// assert_eq!(derive_slug("Confraria do Queijo!"), "confraria-do-queijo");
/// assert_eq!(derive_slug("São Jorge: Queijo Forte"), "são-jorge-queijo-forte");
/// ```
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut hyphenated = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                hyphenated.push('-');
            }
            in_whitespace = true;
        } else {
            hyphenated.push(c);
            in_whitespace = false;
        }
    }

    hyphenated
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Slug candidate for the `attempt`-th collision (1 = the base slug)
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

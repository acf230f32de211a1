//! Identifier Normalizer (§4.6, C7): resolves case/style variants of an
//! identifier against a known set of live names.

use crate::error::Error;

fn canonical(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn camel_to_snake(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev: Option<char> = None;
    for ch in value.chars() {
        if ch.is_ascii_uppercase() {
            if let Some(p) = prev {
                if p.is_ascii_lowercase() || p.is_ascii_digit() {
                    out.push('_');
                }
            }
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// Resolves `requested` to one of `known` using, in order: exact match,
/// case-insensitive match, canonical (punctuation-stripped, lowercased)
/// match, and a camelCase-to-snake_case rewrite retried case-insensitively.
pub fn resolve(requested: &str, known: &[String]) -> Result<String, Error> {
    if let Some(exact) = known.iter().find(|n| n.as_str() == requested) {
        return Ok(exact.clone());
    }
    if let Some(found) = known
        .iter()
        .find(|n| n.eq_ignore_ascii_case(requested))
    {
        return Ok(found.clone());
    }
    let requested_canon = canonical(requested);
    if let Some(found) = known.iter().find(|n| canonical(n) == requested_canon) {
        return Ok(found.clone());
    }
    let snake = camel_to_snake(requested);
    if let Some(found) = known.iter().find(|n| n.eq_ignore_ascii_case(&snake)) {
        return Ok(found.clone());
    }

    let mut candidates: Vec<String> = known.to_vec();
    candidates.sort();
    Err(Error::IdentifierNotFound {
        requested: requested.to_string(),
        candidates,
    })
}

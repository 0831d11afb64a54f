//! Positional label scanning over reconstructed lines
//!
//! Two strategies live here:
//! - `resolve_labels`: given the labels expected on a line, resolve each
//!   label's value from its occurrence position. This handles compound
//!   lines carrying several labels with no delimiter between value and the
//!   next label, including multi-word labels the generic extractor cannot
//!   see.
//! - `extract_key_value_pairs`: the fallback for free-form sections where
//!   no label list is declared; any colon-terminated run is a key.

/// Resolve each label of `labels` to its value by relative position.
///
/// Labels are located by first occurrence; found labels are ordered by
/// occurrence offset, and each value is the text between the end of one
/// label and the start of the next (or the end of the line). An empty
/// trimmed value is reported as `None`, not as an empty string.
///
/// Because values derive from occurrence positions, the result does not
/// depend on the declaration order of `labels`.
pub fn resolve_labels(line: &str, labels: &[String]) -> Vec<(String, Option<String>)> {
    let mut found: Vec<(usize, &String)> = labels
        .iter()
        .filter_map(|label| line.find(label.as_str()).map(|at| (at, label)))
        .collect();
    found.sort_by_key(|(at, _)| *at);

    let mut resolved = Vec::with_capacity(found.len());
    for (i, (at, label)) in found.iter().enumerate() {
        let value_start = at + label.len();
        let value_end = match found.get(i + 1) {
            Some((next_at, _)) => *next_at,
            None => line.len(),
        };
        let value = if value_start < value_end {
            let trimmed = line[value_start..value_end].trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        } else {
            None
        };
        resolved.push(((*label).clone(), value));
    }
    resolved
}

/// Extract `key: value` pairs without a declared key list.
///
/// A key is a lazy, non-space-starting run of characters ending in `:`;
/// its value runs until the next whitespace-preceded token containing an
/// interior colon, or to the end of the line. Keys and values are trimmed.
/// Duplicate keys keep their first position and their last value.
pub fn extract_key_value_pairs(line: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut pos = 0usize;

    while pos < line.len() {
        let rest = &line[pos..];
        let key_start = match rest.find(|c: char| !c.is_whitespace()) {
            Some(i) => pos + i,
            None => break,
        };
        // The colon must come after at least one key character.
        let first_len = match line[key_start..].chars().next() {
            Some(c) => c.len_utf8(),
            None => break,
        };
        let colon = match line[key_start + first_len..].find(':') {
            Some(i) => key_start + first_len + i,
            None => break,
        };
        let key = line[key_start..colon].trim().to_string();

        // Value starts after the colon, skipping leading whitespace.
        let after = &line[colon + 1..];
        let value_start = colon + 1 + (after.len() - after.trim_start().len());
        let value_end = next_key_boundary(line, value_start);
        let value = line[value_start..value_end].trim().to_string();

        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => pairs.push((key, value)),
        }
        // value_end >= value_start > colon >= pos, so the scan always advances.
        pos = value_end;
    }

    pairs
}

/// Find where the current value ends: the earliest whitespace position from
/// `from` onward whose following token carries a colon after its first
/// character. Returns the end of the line when no such boundary exists.
fn next_key_boundary(line: &str, from: usize) -> usize {
    let region = &line[from..];
    for (i, c) in region.char_indices() {
        if !c.is_whitespace() {
            continue;
        }
        let tail = &region[i..];
        let token_start = match tail.find(|ch: char| !ch.is_whitespace()) {
            Some(j) => i + j,
            None => break,
        };
        let token_end = region[token_start..]
            .find(char::is_whitespace)
            .map(|k| token_start + k)
            .unwrap_or(region.len());
        let token = &region[token_start..token_end];
        let first_len = match token.chars().next() {
            Some(ch) => ch.len_utf8(),
            None => continue,
        };
        if token.len() > first_len && token[first_len..].contains(':') {
            return from + i;
        }
    }
    line.len()
}

//! Reading-order line reconstruction from raw word bounding boxes
//!
//! Words arrive with top-origin coordinates (y0 grows downward). Clustering
//! is purely vertical: words whose y0 falls within a fixed tolerance of the
//! cluster's reference y belong to the same visual line.

use crate::ExtractError;
use serde::Serialize;

/// A word with its bounding box, as supplied by a tokenizer adapter.
///
/// Coordinates are top-origin layout units: y0 increases down the page, so
/// ascending y0 matches visual reading order.
#[derive(Debug, Clone, Serialize)]
pub struct Word {
    pub text: String,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// A reconstructed line: the x0/y0 of its leftmost word and the
/// x0-ascending, space-joined text of its words.
#[derive(Debug, Clone)]
pub struct Line {
    pub text: String,
    pub x0: f32,
    pub y0: f32,
}

/// Configuration for line reconstruction.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Vertical tolerance for grouping words into the same line
    pub y_tolerance: f32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self { y_tolerance: 3.0 }
    }
}

/// Group one page's words into reading-order lines.
///
/// Words are sorted by (y0, x0); a word joins the current cluster while
/// `|word.y0 - current_y| <= y_tolerance`, where `current_y` is fixed at
/// the first word of the cluster. The reference is intentionally not a
/// running average: under small cumulative drift this can merge or split
/// lines depending on word arrival order, and downstream layouts were
/// tuned against exactly that behavior.
///
/// Fails with `EmptyDocument` when the page has no words.
pub fn reconstruct_lines(words: &[Word], config: &LineConfig) -> Result<Vec<Line>, ExtractError> {
    if words.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }

    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| {
        a.y0.partial_cmp(&b.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x0.partial_cmp(&b.x0).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut cluster: Vec<&Word> = Vec::new();
    let mut current_y = 0.0f32;

    for word in sorted {
        if cluster.is_empty() {
            current_y = word.y0;
            cluster.push(word);
        } else if (word.y0 - current_y).abs() <= config.y_tolerance {
            cluster.push(word);
        } else {
            lines.push(flush_cluster(&mut cluster));
            current_y = word.y0;
            cluster.push(word);
        }
    }

    if !cluster.is_empty() {
        lines.push(flush_cluster(&mut cluster));
    }

    Ok(lines)
}

/// Drain the cluster into a `Line`, re-sorting its words left to right.
fn flush_cluster(cluster: &mut Vec<&Word>) -> Line {
    cluster.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap_or(std::cmp::Ordering::Equal));
    let text = cluster
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let leftmost = cluster[0];
    let line = Line {
        text,
        x0: leftmost.x0,
        y0: leftmost.y0,
    };
    log::debug!("line [{:.2}, {:.2}]: {}", line.x0, line.y0, line.text);
    cluster.clear();
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f32, y0: f32) -> Word {
        Word {
            text: text.to_string(),
            x0,
            y0,
            x1: x0 + text.len() as f32 * 6.0,
            y1: y0 + 12.0,
        }
    }

    #[test]
    fn empty_page_is_an_error() {
        let err = reconstruct_lines(&[], &LineConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument));
    }

    #[test]
    fn words_on_one_line_join_left_to_right() {
        let words = vec![
            word("mundo", 80.0, 100.0),
            word("Ola", 10.0, 100.5),
            word("lindo", 150.0, 99.8),
        ];
        let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Ola mundo lindo");
        assert_eq!(lines[0].x0, 10.0);
    }

    #[test]
    fn vertical_gap_starts_a_new_line() {
        let words = vec![
            word("primeira", 10.0, 100.0),
            word("segunda", 10.0, 110.0),
            word("terceira", 10.0, 120.0),
        ];
        let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["primeira", "segunda", "terceira"]);
    }

    #[test]
    fn tolerance_is_configurable() {
        let words = vec![word("a", 10.0, 100.0), word("b", 30.0, 106.0)];
        let tight = reconstruct_lines(&words, &LineConfig { y_tolerance: 3.0 }).unwrap();
        assert_eq!(tight.len(), 2);
        let loose = reconstruct_lines(&words, &LineConfig { y_tolerance: 8.0 }).unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].text, "a b");
    }

    #[test]
    fn every_word_lands_in_exactly_one_line() {
        let words = vec![
            word("w1", 10.0, 100.0),
            word("w2", 60.0, 101.0),
            word("w3", 10.0, 115.0),
            word("w4", 90.0, 114.5),
            word("w5", 10.0, 130.0),
        ];
        let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
        let mut joined: Vec<String> = lines
            .iter()
            .flat_map(|l| l.text.split(' ').map(str::to_string))
            .collect();
        joined.sort();
        let mut expected: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
        expected.sort();
        assert_eq!(joined, expected);
    }

    #[test]
    fn cluster_reference_is_fixed_at_the_first_word() {
        // 100.0, 102.5, 105.0: the third word is within tolerance of the
        // second but not of the first. The reference stays at 100.0, so the
        // third word starts a new line. A running average would have kept
        // the chain together; that is not the contract.
        let words = vec![
            word("a", 10.0, 100.0),
            word("b", 40.0, 102.5),
            word("c", 70.0, 105.0),
        ];
        let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "a b");
        assert_eq!(lines[1].text, "c");
    }

    #[test]
    fn line_coordinates_come_from_the_leftmost_word() {
        let words = vec![word("right", 200.0, 50.0), word("left", 20.0, 51.0)];
        let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].x0, 20.0);
        assert_eq!(lines[0].y0, 51.0);
    }
}

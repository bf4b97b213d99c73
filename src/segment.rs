use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

// ── TextTiling ───────────────────────────────────────────────────────────
//
// Hearst-style topic segmentation:
//   1. words → pseudo-sentences of `block_size` words
//   2. gap score = cosine similarity of the `block_window` pseudo-sentences
//      on either side of each gap
//   3. smooth, compute depth scores, pick deep local maxima
//   4. snap each boundary to the nearest paragraph break and cut there

static RE_PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n\s*").unwrap());

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)*").unwrap());

/// Depths below this are float noise on a plateau, not valleys.
const MIN_DEPTH: f64 = 1e-6;

/// Function words that carry no topical signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does", "down",
    "for", "from", "had", "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "me", "more", "my", "no", "nor", "not", "now", "of", "off",
    "on", "once", "only", "or", "other", "our", "out", "over", "said", "she", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "up", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// One run of `block_size` content words.
struct PseudoSentence {
    /// Byte offset of the first word
    start: usize,
    counts: HashMap<String, usize>,
}

/// Split `text` into scenes. Deterministic for a given input and parameters.
///
/// Short inputs, or inputs with no paragraph breaks, come back as a
/// single scene. Blank input yields nothing.
pub fn split_into_scenes(text: &str, block_size: usize, block_window: usize) -> Vec<String> {
    let block_size = block_size.max(1);
    let block_window = block_window.max(1);

    let breaks = paragraph_breaks(text);
    let sentences = pseudo_sentences(text, block_size);

    let cuts = if breaks.is_empty() || sentences.len() < 2 {
        tracing::debug!(
            paragraphs = breaks.len() + 1,
            pseudo_sentences = sentences.len(),
            "text too short to tile, keeping as one scene"
        );
        Vec::new()
    } else {
        let scores = smooth(&gap_scores(&sentences, block_window));
        let depths = depth_scores(&scores);
        let gaps = boundary_gaps(&depths);
        let mut cuts: Vec<usize> = gaps
            .into_iter()
            .map(|g| nearest(&breaks, sentences[g + 1].start))
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        cuts
    };

    let mut scenes = Vec::with_capacity(cuts.len() + 1);
    let mut from = 0;
    for cut in cuts.into_iter().chain(std::iter::once(text.len())) {
        let piece = text[from..cut].trim();
        if !piece.is_empty() {
            scenes.push(piece.to_string());
        }
        from = cut;
    }
    scenes
}

/// Byte offsets where a paragraph begins after a blank line.
fn paragraph_breaks(text: &str) -> Vec<usize> {
    RE_PARAGRAPH_BREAK
        .find_iter(text)
        .map(|m| m.end())
        .filter(|&pos| pos < text.len())
        .collect()
}

fn pseudo_sentences(text: &str, block_size: usize) -> Vec<PseudoSentence> {
    let mut out: Vec<PseudoSentence> = Vec::new();
    let mut current: Option<PseudoSentence> = None;
    let mut words_in_current = 0;

    for m in RE_WORD.find_iter(text) {
        let word = m.as_str().to_lowercase();
        if STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        let seq = current.get_or_insert_with(|| PseudoSentence {
            start: m.start(),
            counts: HashMap::new(),
        });
        *seq.counts.entry(word).or_insert(0) += 1;
        words_in_current += 1;

        if words_in_current == block_size {
            out.extend(current.take());
            words_in_current = 0;
        }
    }
    out.extend(current);
    out
}

/// Lexical similarity across each gap between consecutive pseudo-sentences.
fn gap_scores(sentences: &[PseudoSentence], block_window: usize) -> Vec<f64> {
    let n = sentences.len();
    (0..n - 1)
        .map(|gap| {
            let window = block_window.min(gap + 1).min(n - gap - 1);
            let left = merge_counts(&sentences[gap + 1 - window..=gap]);
            let right = merge_counts(&sentences[gap + 1..=gap + window]);
            cosine(&left, &right)
        })
        .collect()
}

fn merge_counts(sentences: &[PseudoSentence]) -> HashMap<&str, usize> {
    let mut merged = HashMap::new();
    for s in sentences {
        for (word, count) in &s.counts {
            *merged.entry(word.as_str()).or_insert(0) += count;
        }
    }
    merged
}

fn cosine(a: &HashMap<&str, usize>, b: &HashMap<&str, usize>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(w, &x)| b.get(w).map(|&y| (x * y) as f64))
        .sum();
    let norm = |v: &HashMap<&str, usize>| v.values().map(|&x| (x * x) as f64).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Width-3 moving average; edges average over what exists.
fn smooth(scores: &[f64]) -> Vec<f64> {
    (0..scores.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(scores.len() - 1);
            let window = &scores[lo..=hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

fn depth_scores(scores: &[f64]) -> Vec<f64> {
    (0..scores.len())
        .map(|i| {
            let mut left = scores[i];
            for j in (0..i).rev() {
                if scores[j] > left {
                    left = scores[j];
                } else {
                    break;
                }
            }
            let mut right = scores[i];
            for &s in &scores[i + 1..] {
                if s > right {
                    right = s;
                } else {
                    break;
                }
            }
            (left - scores[i]) + (right - scores[i])
        })
        .collect()
}

/// Gaps deep enough to count as topic shifts.
fn boundary_gaps(depths: &[f64]) -> Vec<usize> {
    let n = depths.len() as f64;
    let mean = depths.iter().sum::<f64>() / n;
    let var = depths.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let cutoff = mean - var.sqrt() / 2.0;

    (0..depths.len())
        .filter(|&i| {
            let d = depths[i];
            let left_ok = i == 0 || d >= depths[i - 1];
            let right_ok = i + 1 == depths.len() || d > depths[i + 1];
            d > cutoff.max(MIN_DEPTH) && left_ok && right_ok
        })
        .collect()
}

fn nearest(breaks: &[usize], pos: usize) -> usize {
    breaks
        .iter()
        .copied()
        .min_by_key(|&b| b.abs_diff(pos))
        .unwrap_or(pos)
}

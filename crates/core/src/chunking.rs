use crate::models::IngestionOptions;
use regex::Regex;
use std::sync::OnceLock;

/// Generic separators tried after any content-derived markers.
/// Content-specific markers always take priority over these.
pub const BASE_MARKERS: [&str; 6] = ["\n\n", "\n==", "\n##", "\n# ", "---", "\n\n---"];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub min_chars: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.max_chunk_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

/// The boundary heuristic that produced a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMarker {
    /// A literal separator, either detected in the content or generic.
    Pattern(String),
    /// No marker produced at least two valid fragments; chunks were cut
    /// by accumulating whitespace-delimited tokens up to the size limit.
    SizeBased,
    /// The field was stored as a single object without splitting.
    None,
    /// Blank or whitespace-only input.
    Empty,
}

impl SplitMarker {
    /// Stable string form stored in the `chunk_marker` property.
    pub fn label(&self) -> &str {
        match self {
            SplitMarker::Pattern(marker) => marker,
            SplitMarker::SizeBased => "size_based",
            SplitMarker::None => "none",
            SplitMarker::Empty => "empty",
        }
    }
}

fn separator_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:={3,}|-{3,})").expect("static regex"))
}

fn is_upper_heading(line: &str) -> bool {
    let has_alpha = line.chars().any(|c| c.is_alphabetic());
    has_alpha
        && !line.chars().any(|c| c.is_lowercase())
        && line.split_whitespace().count() <= 6
}

/// Scan text line-by-line for structural header markers: markdown `#` runs,
/// `===`/`---` underline runs, short all-caps lines, and lines ending with
/// a colon. Markers are returned in order of first appearance.
pub fn detect_markers(text: &str) -> Vec<String> {
    let mut markers = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        let marker = if stripped.starts_with('#') {
            let level = stripped.chars().take_while(|c| *c == '#').count();
            format!("\n{} ", "#".repeat(level))
        } else if separator_run_re().is_match(stripped) {
            format!("\n{}", &stripped[..3])
        } else if is_upper_heading(stripped) || stripped.ends_with(':') {
            format!("\n{stripped}")
        } else {
            continue;
        };

        if !markers.contains(&marker) {
            markers.push(marker);
        }
    }

    markers
}

/// Split `text` into bounded chunks, preferring natural header boundaries.
///
/// Every candidate marker (content-derived first, then [`BASE_MARKERS`]) is
/// tried as a literal split; fragments shorter than `min_chars` are dropped,
/// and the marker yielding the most valid fragments wins, requiring at
/// least two. If no marker qualifies the text is cut by size instead.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> (Vec<String>, SplitMarker) {
    if text.trim().is_empty() {
        return (Vec::new(), SplitMarker::Empty);
    }

    let mut candidates = detect_markers(text);
    candidates.extend(BASE_MARKERS.iter().map(|marker| (*marker).to_string()));

    let mut best: Vec<String> = Vec::new();
    let mut best_marker: Option<String> = None;

    for marker in &candidates {
        let valid: Vec<String> = text
            .split(marker.as_str())
            .map(str::trim)
            .filter(|fragment| fragment.len() >= config.min_chars)
            .map(ToString::to_string)
            .collect();

        if valid.len() > best.len() && valid.len() > 1 {
            best = valid;
            best_marker = Some(marker.clone());
        }
    }

    match best_marker {
        Some(marker) => (best, SplitMarker::Pattern(marker)),
        None => (
            size_based_chunks(text, config.max_chars),
            SplitMarker::SizeBased,
        ),
    }
}

/// Accumulate whitespace-delimited tokens up to `max_chars` per chunk.
/// A single token longer than the limit forms an oversized chunk on its own.
pub fn size_based_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

const HEADER_HINTS: [&str; 5] = ["\n#", "\n##", "\n===", "\n---", ":"];

/// A field qualifies for chunking when it exceeds the maximum size, or
/// exceeds the minimum size and shows a recognizable header pattern.
/// Short plain fields are never chunked.
pub fn should_chunk_field(value: &str, config: ChunkingConfig) -> bool {
    if value.len() > config.max_chars {
        return true;
    }

    if value.len() > config.min_chars {
        return HEADER_HINTS.iter().any(|hint| value.contains(hint));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 2_000,
            min_chars: 50,
        }
    }

    #[test]
    fn blank_input_yields_no_chunks() {
        let (chunks, marker) = chunk_text("   \n\t  ", config());
        assert!(chunks.is_empty());
        assert_eq!(marker, SplitMarker::Empty);
    }

    #[test]
    fn short_input_yields_single_chunk_of_trimmed_text() {
        let (chunks, marker) = chunk_text("  a short note  ", config());
        assert_eq!(chunks, vec!["a short note".to_string()]);
        assert_eq!(marker, SplitMarker::SizeBased);
    }

    #[test]
    fn markdown_headers_win_over_generic_separators() {
        let section = "lorem ipsum dolor sit amet, consectetur adipiscing elit sed do";
        let text = format!("## Intro\n{section}\n## Methods\n{section}\n## Results\n{section}");

        let (chunks, marker) = chunk_text(&text, config());

        assert_eq!(marker, SplitMarker::Pattern("\n## ".to_string()));
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("## Intro") || chunks[0].starts_with("Intro"));
    }

    #[test]
    fn upper_case_headings_are_detected() {
        let markers = detect_markers("SAFETY NOTES\nbody text\nAppendix section:\nmore");
        assert!(markers.contains(&"\nSAFETY NOTES".to_string()));
        assert!(markers.contains(&"\nAppendix section:".to_string()));
    }

    #[test]
    fn separator_runs_are_detected_by_first_three_chars() {
        let markers = detect_markers("Title\n=====\nbody\n-----\nmore");
        assert!(markers.contains(&"\n===".to_string()));
        assert!(markers.contains(&"\n---".to_string()));
    }

    #[test]
    fn size_fallback_bounds_every_chunk() {
        let text = "word ".repeat(1_000);
        let (chunks, marker) = chunk_text(&text, config());

        assert_eq!(marker, SplitMarker::SizeBased);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 2_000));
    }

    #[test]
    fn oversized_single_token_becomes_its_own_chunk() {
        let giant = "x".repeat(3_000);
        let chunks = size_based_chunks(&format!("small {giant} tail"), 2_000);

        assert_eq!(chunks, vec!["small".to_string(), giant, "tail".to_string()]);
    }

    #[test]
    fn chunks_are_deterministic_for_identical_input() {
        let text = format!("# A\n{}\n# B\n{}", "a".repeat(80), "b".repeat(80));
        let first = chunk_text(&text, config());
        let second = chunk_text(&text, config());
        assert_eq!(first, second);
    }

    #[test]
    fn field_eligibility_requires_size_or_header_pattern() {
        let cfg = config();
        assert!(should_chunk_field(&"x".repeat(2_001), cfg));
        assert!(should_chunk_field(
            &format!("intro text\n## section\n{}", "y".repeat(60)),
            cfg
        ));
        // Long enough but plain prose without header hints.
        assert!(!should_chunk_field(&"z".repeat(100), cfg));
        // Short fields are never chunked even with a header pattern.
        assert!(!should_chunk_field("## tiny", cfg));
    }
}

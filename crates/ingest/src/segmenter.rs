use unicode_segmentation::UnicodeSegmentation;

use crate::segment::Segment;

pub struct SegmenterConfig {
    /// Target segment size in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one segment into the next.
    pub chunk_overlap: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

/// Splits book text into overlapping segments in reading order.
///
/// Boundaries are preferred at paragraph breaks, then sentence breaks, with a
/// hard character cut as the last resort. Deterministic for identical input,
/// which keeps re-indexing idempotent.
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn segment(&self, text: &str, book_title: &str, book_author: &str) -> Vec<Segment> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Segment::new(chunk, book_title, book_author, i))
            .collect()
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if para.len() <= self.config.chunk_size {
                self.push_piece(&mut buffer, &mut chunks, para, "\n\n");
                continue;
            }

            // Paragraph alone exceeds the budget: fall back to sentences,
            // then to hard cuts for any single oversized sentence.
            for sentence in para.unicode_sentences() {
                if sentence.len() <= self.config.chunk_size {
                    self.push_piece(&mut buffer, &mut chunks, sentence.trim_end(), " ");
                } else {
                    for slice in hard_cut(sentence, self.config.chunk_size) {
                        self.push_piece(&mut buffer, &mut chunks, slice, " ");
                    }
                }
            }
        }

        if !buffer.trim().is_empty() {
            chunks.push(buffer);
        }

        chunks
    }

    /// Append `piece` to the buffer, flushing a finished chunk first when the
    /// piece would not fit. The flushed chunk's tail seeds the next buffer as
    /// overlap.
    fn push_piece(&self, buffer: &mut String, chunks: &mut Vec<String>, piece: &str, sep: &str) {
        if !buffer.is_empty() && buffer.len() + sep.len() + piece.len() > self.config.chunk_size {
            let overlap = tail_chars(buffer, self.config.chunk_overlap).to_string();
            chunks.push(std::mem::replace(buffer, overlap));
        }

        if !buffer.is_empty() {
            buffer.push_str(sep);
        }
        buffer.push_str(piece);
    }
}

/// Split `s` into consecutive slices of at most `size` characters, cutting on
/// char boundaries.
fn hard_cut(s: &str, size: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut begin = 0usize;
    let mut chars_in = 0usize;

    for (idx, _) in s.char_indices() {
        if chars_in == size {
            parts.push(&s[begin..idx]);
            begin = idx;
            chars_in = 0;
        }
        chars_in += 1;
    }

    if begin < s.len() {
        parts.push(&s[begin..]);
    }

    parts
}

/// The last `n` characters of `s` (all of it when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Paragraphs with no leading/trailing whitespace, so the splitter's
    // paragraph trimming is the identity on them.
    fn paragraphs(count: usize, len: usize) -> String {
        (0..count)
            .map(|i| format!("{i:03} {}", "lorem ipsum ".repeat(len / 12).trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_short_text_is_one_segment() {
        let segmenter = Segmenter::new(SegmenterConfig::default());
        let segments = segmenter.segment("A quiet opening line.", "Test Book", "Nobody");

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].seq_id, 0);
        assert_eq!(segments[0].segment_id, "test_book_chunk_0000");
    }

    #[test]
    fn test_empty_text_yields_no_segments() {
        let segmenter = Segmenter::new(SegmenterConfig::default());
        assert!(segmenter.segment("", "Test Book", "Nobody").is_empty());
        assert!(segmenter.segment("\n\n  \n\n", "Test Book", "Nobody").is_empty());
    }

    #[test]
    fn test_sequence_ids_are_contiguous_from_zero() {
        let segmenter = Segmenter::new(SegmenterConfig::default());
        let segments = segmenter.segment(&paragraphs(40, 400), "Test Book", "Nobody");

        assert!(segments.len() > 1);
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.seq_id, i);
        }
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let segmenter = Segmenter::new(SegmenterConfig::default());
        let text = paragraphs(30, 500);

        let first: Vec<String> = segmenter
            .segment(&text, "Test Book", "Nobody")
            .into_iter()
            .map(|s| s.text)
            .collect();
        let second: Vec<String> = segmenter
            .segment(&text, "Test Book", "Nobody")
            .into_iter()
            .map(|s| s.text)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_consecutive_segments_share_overlap() {
        let config = SegmenterConfig::default();
        let overlap = config.chunk_overlap;
        let segmenter = Segmenter::new(config);
        let segments = segmenter.segment(&paragraphs(40, 400), "Test Book", "Nobody");

        assert!(segments.len() > 2);
        for pair in segments.windows(2) {
            let carried = tail_chars(&pair[0].text, overlap);
            assert!(
                pair[1].text.starts_with(carried),
                "segment {} does not begin with the tail of segment {}",
                pair[1].seq_id,
                pair[0].seq_id
            );
        }
    }

    #[test]
    fn test_dropping_overlap_reconstructs_text() {
        let config = SegmenterConfig::default();
        let overlap = config.chunk_overlap;
        let segmenter = Segmenter::new(config);

        let text = paragraphs(40, 400);
        let segments = segmenter.segment(&text, "Test Book", "Nobody");

        let mut rebuilt = segments[0].text.clone();
        for pair in segments.windows(2) {
            let carried = tail_chars(&pair[0].text, overlap);
            rebuilt.push_str(&pair[1].text[carried.len()..]);
        }

        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_oversized_paragraph_is_hard_cut() {
        let segmenter = Segmenter::new(SegmenterConfig {
            chunk_size: 100,
            chunk_overlap: 10,
        });
        // One unbroken 350-char "sentence", no whitespace to split on.
        let text = "x".repeat(350);
        let segments = segmenter.segment(&text, "Test Book", "Nobody");

        assert!(segments.len() >= 3);
        for seg in &segments {
            assert!(seg.text.len() <= 100 + 10 + 1);
        }
    }

    #[test]
    fn test_hard_cut_respects_char_boundaries() {
        let s = "héllo wörld".repeat(20);
        for part in hard_cut(&s, 7) {
            assert!(part.chars().count() <= 7);
        }
        assert_eq!(hard_cut(&s, 7).concat(), s);
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 5), "ab");
        assert_eq!(tail_chars("abc", 0), "");
    }
}

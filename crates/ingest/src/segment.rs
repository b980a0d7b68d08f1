use serde::{Deserialize, Serialize};

/// A contiguous slice of book text, the unit of retrieval.
///
/// Identity is `(book_title, seq_id)`; the id string is derived from both so
/// re-segmenting the same book yields the same ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: String,
    pub text: String,
    pub book_title: String,
    pub book_author: String,
    pub seq_id: usize,
    pub source: String,
}

impl Segment {
    pub fn new(text: String, book_title: &str, book_author: &str, seq_id: usize) -> Self {
        let segment_id = format!("{}_chunk_{:04}", slugify(book_title), seq_id);
        let source = format!("{} by {} - Chunk {}", book_title, book_author, seq_id + 1);

        Self {
            segment_id,
            text,
            book_title: book_title.to_string(),
            book_author: book_author.to_string(),
            seq_id,
            source,
        }
    }
}

/// Lowercased, underscore-joined book title, used as the id prefix.
pub fn slugify(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_format() {
        let seg = Segment::new("text".to_string(), "The Great Gatsby", "F. Scott Fitzgerald", 7);
        assert_eq!(seg.segment_id, "the_great_gatsby_chunk_0007");
        assert_eq!(seg.source, "The Great Gatsby by F. Scott Fitzgerald - Chunk 8");
        assert_eq!(seg.seq_id, 7);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Harry Potter"), "harry_potter");
        assert_eq!(slugify("Dune"), "dune");
    }
}

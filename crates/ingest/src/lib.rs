pub mod reader;
pub mod segment;
pub mod segmenter;

pub use reader::{FileReader, PlainTextExtractor, TextExtractor};
pub use segment::{Segment, slugify};
pub use segmenter::{Segmenter, SegmenterConfig};

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Boundary for upstream text extraction (PDF and friends). The segmenter
/// only ever sees raw text; anything that can produce it plugs in here.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl Future<Output = Result<String>> + Send;
}

/// Plain-text extractor for `.txt` and `.md` sources.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        FileReader::read_file(path).await
    }
}

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }
}

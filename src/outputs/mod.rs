//! Output sinks for extracted articles.
//!
//! A sink receives two writes per article: the raw text and the metadata
//! record. The only sink shipped is [`files::FileSink`]:
//!
//! ```text
//! output_dir/
//! ├── 1_raw.txt
//! ├── 1_meta.json
//! ├── 3_raw.txt
//! └── 3_meta.json
//! ```

use crate::models::Article;
use thiserror::Error;

pub mod files;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for extracted articles.
///
/// Writes are issued one at a time by the pipeline.
pub trait ArticleSink {
    /// Make the destination exist and be empty before the first write.
    async fn prepare(&mut self) -> Result<(), SinkError>;

    async fn write_raw(&mut self, article: &Article) -> Result<(), SinkError>;

    async fn write_meta(&mut self, article: &Article) -> Result<(), SinkError>;
}

/// Sink that keeps everything in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    pub prepared: bool,
    pub raw: Vec<(usize, String)>,
    pub meta: Vec<crate::models::ArticleMeta>,
    pub fail_on: Option<usize>,
}

#[cfg(test)]
impl ArticleSink for MemorySink {
    async fn prepare(&mut self) -> Result<(), SinkError> {
        self.prepared = true;
        Ok(())
    }

    async fn write_raw(&mut self, article: &Article) -> Result<(), SinkError> {
        if self.fail_on == Some(article.id()) {
            return Err(SinkError::Io(std::io::Error::other("disk full")));
        }
        self.raw.push((article.id(), article.text().to_string()));
        Ok(())
    }

    async fn write_meta(&mut self, article: &Article) -> Result<(), SinkError> {
        self.meta.push(article.meta());
        Ok(())
    }
}

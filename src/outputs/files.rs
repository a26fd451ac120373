//! File-system sink.
//!
//! Each article becomes two files named after its id: `{id}_raw.txt` with the
//! body text and `{id}_meta.json` with the pretty-printed [`ArticleMeta`].
//!
//! [`ArticleMeta`]: crate::models::ArticleMeta

use super::{ArticleSink, SinkError};
use crate::models::Article;
use crate::utils::prepare_environment;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn raw_path(&self, id: usize) -> PathBuf {
        self.dir.join(format!("{id}_raw.txt"))
    }

    fn meta_path(&self, id: usize) -> PathBuf {
        self.dir.join(format!("{id}_meta.json"))
    }
}

impl ArticleSink for FileSink {
    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display()))]
    async fn prepare(&mut self) -> Result<(), SinkError> {
        prepare_environment(&self.dir).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(id = article.id()))]
    async fn write_raw(&mut self, article: &Article) -> Result<(), SinkError> {
        let path = self.raw_path(article.id());
        fs::write(&path, article.text()).await?;
        debug!(path = %path.display(), bytes = article.text().len(), "Wrote raw text");
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(id = article.id()))]
    async fn write_meta(&mut self, article: &Article) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(&article.meta())?;
        let path = self.meta_path(article.id());
        fs::write(&path, json).await?;
        info!(path = %path.display(), "Wrote article metadata");
        Ok(())
    }
}

//! Local log file tailing: `log <path>`

use super::{FetchResult, SourceAdapter, StatusItem};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const SOURCE_TYPE: &str = "log";

pub struct LogFileSource {
    path: PathBuf,
    /// Byte offset already consumed; `None` until the first fetch
    offset: Option<u64>,
}

impl LogFileSource {
    pub fn new(params: &[String]) -> AppResult<Self> {
        let source = Self {
            path: params.first().map(PathBuf::from).unwrap_or_default(),
            offset: None,
        };
        source.validate_parameters()?;
        Ok(source)
    }

    fn title(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[async_trait]
impl SourceAdapter for LogFileSource {
    fn type_label(&self) -> &str {
        "Log"
    }

    fn validate_parameters(&self) -> AppResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AppError::invalid_parameters(SOURCE_TYPE, "Log file path is required"));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Log: {}", self.path.display())
    }

    async fn fetch_once(&mut self) -> FetchResult {
        let mut file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        let start = match self.offset {
            None => {
                self.offset = Some(len);
                return Ok(Vec::new());
            }
            // Truncated or rotated
            Some(offset) if offset > len => 0,
            Some(offset) => offset,
        };

        file.seek(SeekFrom::Start(start)).await?;
        let mut buf = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut buf).await?;

        // Only complete lines are consumed; a trailing partial line waits
        // for the next fetch.
        let consumed = buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        let title = self.title();
        let mut items = Vec::new();
        let mut line_start = 0;
        for line in buf[..consumed].split_inclusive(|b| *b == b'\n') {
            let text = String::from_utf8_lossy(line);
            let text = text.trim_end();
            if !text.is_empty() {
                let id = format!("{}:{}", self.path.display(), start + line_start as u64);
                items.push(StatusItem::new(id, title.clone(), text));
            }
            line_start += line.len();
        }

        self.offset = Some(start + consumed as u64);
        Ok(items)
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::RemoteFetcher;
use crate::ocr::OcrService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ocr: OcrService,
    /// Downloads `file_url` images.
    pub fetcher: RemoteFetcher,
}

impl AppState {
    pub fn new(config: Config, ocr: OcrService) -> Result<Self> {
        let fetcher = RemoteFetcher::new(&config.fetch)?;
        Ok(Self {
            config: Arc::new(config),
            ocr,
            fetcher,
        })
    }
}

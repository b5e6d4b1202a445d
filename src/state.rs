use crate::kpi::ReportConfig;
use crate::models::Dataset;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub quotes_path: PathBuf,
    pub jobs_path: PathBuf,
    pub config: ReportConfig,
    pub data: Arc<Mutex<Dataset>>,
}

impl AppState {
    pub fn new(
        quotes_path: PathBuf,
        jobs_path: PathBuf,
        config: ReportConfig,
        data: Dataset,
    ) -> Self {
        Self {
            quotes_path,
            jobs_path,
            config,
            data: Arc::new(Mutex::new(data)),
        }
    }
}

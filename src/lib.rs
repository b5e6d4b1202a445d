pub mod app;
pub mod calendar;
pub mod errors;
pub mod handlers;
pub mod kpi;
pub mod models;
pub mod state;
pub mod storage;

pub use app::router;
pub use kpi::{ReportConfig, build_report};
pub use state::AppState;
pub use storage::{load_dataset, resolve_jobs_path, resolve_quotes_path};

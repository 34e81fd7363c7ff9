pub mod adapters;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod domain;
pub mod utils;

pub use crate::adapters::{http::SortingApiClient, storage::LocalStorage};
pub use crate::config::AppConfig;
pub use crate::core::{checker::ProgressChecker, collector::Collector, recorder::ProgressRecorder};
pub use crate::dashboard::DashboardState;
pub use crate::utils::error::{MonitorError, Result};

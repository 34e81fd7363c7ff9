pub mod baseline;
pub mod checker;
pub mod collector;
pub mod parser;
pub mod recorder;
pub mod schedule;

pub use crate::domain::model::{CollectionReport, FetchOutcome, ProgressStatus, RankOutcome};
pub use crate::domain::ports::{ConfigProvider, ProgressSource, Storage};
pub use crate::utils::error::Result;

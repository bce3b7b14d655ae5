//! Evaluation metrics, run aggregation and the results table.

pub mod evaluation;
pub mod results;
pub mod summary;

pub use evaluation::{auc_performance, AucPerformance};
pub use results::{append_result, read_results, ResultRecord};
pub use summary::RunningStatistic;

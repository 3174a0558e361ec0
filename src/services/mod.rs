pub mod summary_parser;

pub use summary_parser::{ResultSummaryParser, SummaryOutcome};

pub mod chart;
pub mod dashboard;
pub mod ingest;
pub mod portfolio;
pub mod setup;
pub mod ui;

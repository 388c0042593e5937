//! Command line front end

pub mod fetch;
pub mod ingest;
pub mod setup;
pub mod ui;

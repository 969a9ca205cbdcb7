//! Command implementations

pub mod archive;
pub mod config;
pub mod doctor;
pub mod episode;
pub mod ledger;
pub mod rewrite;
pub mod run;
pub mod sources;
pub mod template;

pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod rules;
pub mod storage;
pub mod table;
pub mod telemetry;
pub mod template;
pub mod user;
pub mod validation;
pub mod workflows;

pub mod advisories;
pub mod classify;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod registry;
pub mod storage;

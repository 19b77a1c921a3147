pub mod fetcher;
pub mod parser;
pub mod sanitizer;
pub mod types;

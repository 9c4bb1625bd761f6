// Command handlers module
pub mod config;
pub mod parse;
pub mod queries;
pub mod run;
pub mod version;

// Re-exports for cleaner imports
pub use version::execute as version;

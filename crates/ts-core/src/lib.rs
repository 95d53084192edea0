pub mod changes;
pub mod config;
pub mod credentials;
pub mod file_watcher;
pub mod paths;

pub mod approval;
pub mod cli;
pub mod collect;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod session;

pub use cli::Cli;

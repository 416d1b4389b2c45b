// mdrender library exports

pub mod cli;
pub mod config;

pub use cli::Invocation;
pub use config::Config;

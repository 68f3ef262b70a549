//! CLI command implementations

mod init;
mod run;
mod status;

pub use init::init_config;
pub use run::run_corpus;
pub use status::show_status;

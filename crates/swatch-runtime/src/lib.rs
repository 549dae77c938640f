//! Orchestration for the design-system console: snapshot/audit service,
//! smoke QA engine, safety boot, and the stores behind them.

mod backend;
pub mod boot;
mod console;
mod db;
pub mod resolver;
pub mod smoke;
pub mod snapshot;

pub use backend::Backend;
pub use boot::{BootReport, BootState, SafetyBoot};
pub use console::{Console, ConsoleBoot, ConsoleQa};
pub use db::DbHandle;
pub use resolver::FsModuleResolver;
pub use smoke::SmokeQa;
pub use snapshot::SnapshotService;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("remote store error: {0}")]
    Remote(String),
}

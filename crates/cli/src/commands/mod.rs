//! Subcommands of the `binopt` binary.

pub mod force_expire;
pub mod migrate;
pub mod record;
pub mod run;
pub mod show;
pub mod tick;

pub use force_expire::{run_force_expire, ForceExpireArgs};
pub use migrate::run_migrate;
pub use record::{run_record, RecordArgs};
pub use run::run_daemon;
pub use show::{run_show, ShowArgs};
pub use tick::{run_resolve, run_scan};

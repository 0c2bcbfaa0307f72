//! Sandbox artifacts: launch arguments and unit files for stage1.

pub mod app_unit;
pub mod args;
pub mod env_file;
pub mod protect;
pub mod quote;
pub mod reaper;
pub mod unit;

pub use app_unit::{AppUnitConfig, app_unit, write_app_unit};
pub use args::{NspawnArgs, app_to_nspawn_args, machine_name, pod_to_nspawn_args};
pub use env_file::{DEFAULT_ENV, render_env, write_env_file};
pub use protect::protect_system_files;
pub use quote::{exec_escape, quote_exec};
pub use reaper::{reaper_unit, write_app_reaper};
pub use unit::{UnitFile, UnitOption};

//! Filesystem helpers shared by the preparation steps.

pub mod fs;

pub use fs::{create_dir_and_shift, is_device_node, is_executable, shift_files, write_and_shift};

//! Mount and path resolution inside app rootfs trees.

pub mod device;
pub mod exec_path;
pub mod symlink;
pub mod volume;

pub use device::{DeviceAllow, generate_device_allows};
pub use exec_path::{app_search_paths, find_bin_path, lookup_path_inside_app};
pub use symlink::{MAX_SYMLINK_STEPS, evaluate_symlinks_inside_app, resolve_on_host};
pub use volume::{
    AppMount, BindMount, generate_mounts, is_mount_read_only, prepare_mountpoints,
    resolve_bind_mounts, volume_source,
};

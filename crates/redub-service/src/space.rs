//! Free disk space probe for creation backpressure.

use std::path::Path;

use sysinfo::Disks;

/// Available bytes on the disk holding `path`, best-matched by mount
/// point. `None` when the platform reports no matching disk.
pub fn available_bytes(path: &Path) -> Option<u64> {
    let probe = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| probe.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

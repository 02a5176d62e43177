//! Linux RSS via `/proc/self/statm` (second field, in pages).

use std::fs;

pub fn current_rss_kb() -> Option<u64> {
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * page_size()? / 1024)
}

fn page_size() -> Option<u64> {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 { None } else { Some(size as u64) }
}

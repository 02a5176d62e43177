//! Other Unix targets: `getrusage` only exposes the high-water mark, so the
//! peak doubles as the current reading.

pub fn current_rss_kb() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let max_rss = unsafe { usage.assume_init() }.ru_maxrss as u64;
    // Darwin reports bytes; the BSDs report KiB.
    if cfg!(target_vendor = "apple") {
        Some(max_rss / 1024)
    } else {
        Some(max_rss)
    }
}

//! No resident-set counter on this target; memory metrics read as zero.

pub fn current_rss_kb() -> Option<u64> {
    None
}

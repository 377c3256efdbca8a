//
// Human readable quota report.
//
use std::fmt::Write;
use std::path::Path;

use fs_quota::{blocks_to_kb, QuotaLimits};

const EXCEEDED: &str = "** EXCEEDED **";

/// Format a quota record the way `setquota` prints it without options.
/// Block values are shown in kilobytes.
pub fn format(mount_point: &Path, q: &QuotaLimits) -> String {
    let mark = |expired| if expired { EXCEEDED } else { "" };
    let mut s = String::new();
    let _ = writeln!(s, " Filesystem: {}", mount_point.display());
    let line = format!(
        "Blocks (KB): usage={:<8} [soft={:<6} hard={}] {}",
        blocks_to_kb(q.block_usage),
        blocks_to_kb(q.block_soft_limit),
        blocks_to_kb(q.block_hard_limit),
        mark(q.block_grace_expired()),
    );
    let _ = writeln!(s, "{}", line.trim_end());
    let line = format!(
        "      Files: usage={:<8} [soft={:<6} hard={}] {}",
        q.file_usage,
        q.file_soft_limit,
        q.file_hard_limit,
        mark(q.file_grace_expired()),
    );
    let _ = writeln!(s, "{}", line.trim_end());
    s
}

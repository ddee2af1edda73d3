//! Process working-set sampling used by the sandbox's memory ceiling (spec
//! §4.5: "Enforces a memory ceiling... by sampling the process working
//! set"). The sandbox runs contract code in-process (spec §9's embedded-
//! interpreter option), so the only working set available to sample is the
//! whole process's.

/// Current resident set size in bytes, or `None` if it cannot be
/// determined on this platform.
#[cfg(target_os = "linux")]
pub fn current_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
pub fn current_rss_bytes() -> Option<u64> {
    None
}

/// Points for a clear, using the level before any level-up it causes
pub fn points(lines: u32, combo: u32, level: u32) -> u64 {
    100 * lines as u64 + 50 * combo as u64 + 10 * level as u64
}

/// Combo after a clear at `now_ms`
///
/// Grows while clears follow each other within `window_ms`, restarts at 1
/// otherwise. A lock without a clear resets it to 0 (handled by the engine).
pub fn next_combo(combo: u32, last_clear_ms: Option<u64>, now_ms: u64, window_ms: u64) -> u32 {
    match last_clear_ms {
        Some(last) if now_ms.saturating_sub(last) < window_ms => combo + 1,
        _ => 1,
    }
}

pub fn level_for(total_lines: u32) -> u32 {
    total_lines / 10 + 1
}

/// Scale a drop interval, never going below `min_ms`
pub fn scale_interval(interval_ms: u64, factor: f64, min_ms: u64) -> u64 {
    ((interval_ms as f64 * factor).round() as u64).max(min_ms)
}

use std::collections::VecDeque;

/// Garbage rows sent to the opponent for one line clear
///
/// Base by cleared lines: 1 -> 0, 2 -> 1, 3 -> 2, 4 or more -> 4. A running
/// combo adds `min(combo - 1, 3)` on top.
pub fn garbage_for(lines: u32, combo: u32) -> u32 {
    let base = match lines {
        0 | 1 => 0,
        2 => 1,
        3 => 2,
        _ => 4,
    };
    let bonus = if combo > 1 { (combo - 1).min(3) } else { 0 };
    base + bonus
}

/// Garbage rows owed to a player, applied after a fixed delay
#[derive(Debug, Clone)]
pub struct GarbageQueue {
    delay_ms: u64,
    batches: VecDeque<(u64, u32)>,
}

impl GarbageQueue {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            batches: VecDeque::new(),
        }
    }

    /// Schedule `rows` for `now_ms + delay`
    pub fn schedule(&mut self, now_ms: u64, rows: u32) {
        if rows > 0 {
            self.batches.push_back((now_ms + self.delay_ms, rows));
        }
    }

    /// When the next batch becomes due
    pub fn next_due(&self) -> Option<u64> {
        self.batches.front().map(|(due, _)| *due)
    }

    /// Remove and sum every batch due at `now_ms`
    pub fn take_due(&mut self, now_ms: u64) -> u32 {
        let mut rows = 0u32;
        while let Some(&(due, batch)) = self.batches.front() {
            if due > now_ms {
                break;
            }
            rows = rows.saturating_add(batch);
            self.batches.pop_front();
        }
        rows
    }

    /// Rows received but not applied yet
    pub fn pending(&self) -> u32 {
        self.batches
            .iter()
            .fold(0u32, |sum, (_, rows)| sum.saturating_add(*rows))
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_table_at_combo_one() {
        let sent: Vec<u32> = (0..=5).map(|lines| garbage_for(lines, 1)).collect();
        assert_eq!(sent, vec![0, 0, 1, 2, 4, 4]);
    }

    #[test]
    fn test_combo_bonus() {
        assert_eq!(garbage_for(1, 3), 2);
        assert_eq!(garbage_for(2, 3), 3);
        assert_eq!(garbage_for(4, 2), 5);
        // Bonus is capped at three rows
        assert_eq!(garbage_for(4, 10), 7);
        assert_eq!(garbage_for(2, 0), 1);
    }

    #[test]
    fn test_queue_applies_after_delay() {
        let mut queue = GarbageQueue::new(2000);
        queue.schedule(100, 2);
        queue.schedule(500, 3);
        queue.schedule(600, 0);
        assert_eq!(queue.pending(), 5);
        assert_eq!(queue.next_due(), Some(2100));

        assert_eq!(queue.take_due(2099), 0);
        assert_eq!(queue.take_due(2100), 2);
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.take_due(10_000), 3);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.next_due(), None);
    }
}

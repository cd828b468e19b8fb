//! Configuration for snapshot synchronization

use std::time::Duration;

use zenoh::key_expr::KeyExpr;

/// Timing and addressing parameters shared by both players of a match
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Outbound throttle window: at most one snapshot per window
    pub throttle_window_ms: u64,

    /// Delay between receiving an attack and applying its garbage rows
    pub attack_delay_ms: u64,

    /// How long a finished player waits for the opponent's final score
    /// before deciding the winner
    pub final_report_wait_ms: u64,

    /// Timeout for one session step in milliseconds
    /// step() returns when either something visible happened or this timeout elapses
    pub step_timeout_ms: u64,

    /// Maximum number of waiting rooms returned by a listing
    pub room_list_limit: usize,

    /// Key expression prefix for all duel traffic
    pub keyexpr_prefix: KeyExpr<'static>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            throttle_window_ms: 100,
            attack_delay_ms: 2000,
            final_report_wait_ms: 1000,
            step_timeout_ms: 1000,
            room_list_limit: 10,
            keyexpr_prefix: KeyExpr::new("zenoh/duel").expect("valid default prefix"),
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outbound throttle window in milliseconds
    pub fn with_throttle_window_ms(mut self, window_ms: u64) -> Self {
        self.throttle_window_ms = window_ms;
        self
    }

    /// Set the attack presentation delay in milliseconds
    pub fn with_attack_delay_ms(mut self, delay_ms: u64) -> Self {
        self.attack_delay_ms = delay_ms;
        self
    }

    /// Set the final score wait in milliseconds
    pub fn with_final_report_wait_ms(mut self, wait_ms: u64) -> Self {
        self.final_report_wait_ms = wait_ms;
        self
    }

    /// Set the step timeout in milliseconds
    pub fn with_step_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.step_timeout_ms = timeout_ms;
        self
    }

    /// Set the waiting-room listing limit
    pub fn with_room_list_limit(mut self, limit: usize) -> Self {
        self.room_list_limit = limit;
        self
    }

    /// Set the key expression prefix
    pub fn with_keyexpr_prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.keyexpr_prefix = prefix;
        self
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    pub fn attack_delay(&self) -> Duration {
        Duration::from_millis(self.attack_delay_ms)
    }

    pub fn final_report_wait(&self) -> Duration {
        Duration::from_millis(self.final_report_wait_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

use std::{net::Ipv4Addr, time::Instant};

pub fn ip_to_string(addr: [u8; 4]) -> String {
    Ipv4Addr::from(addr).to_string()
}

pub fn endpoint_to_string(addr: [u8; 4], port: u16) -> String {
    format!("{}:{}", ip_to_string(addr), port)
}

/// Source of monotonic timestamps in nanoseconds.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// Nanoseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

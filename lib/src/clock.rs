//! Monotonic wall-clock helpers layered on the platform timer service.
//!
//! Every accessor returns `0` before platform services are registered
//! during early boot.

use crate::kernel_services::platform;

/// System uptime in milliseconds since the timer was armed.
#[inline]
pub fn uptime_ms() -> u64 {
    platform::get_time_ms()
}

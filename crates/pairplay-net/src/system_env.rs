//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` is the production implementation of the Environment trait using
//! real system time and the OS RNG.
//!
//! # Capabilities
//!
//! - Real system time (`std::time::Instant`) that advances naturally
//! - OS RNG (getrandom). Truly random, not reproducible
//! - Tokio async sleep for actual wall-clock delays

use std::time::Duration;

use pairplay_core::Environment;

/// Production environment using system time and OS randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without it the node cannot pick an identifier
/// that is unique on the LAN.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn identifiers_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }

    #[tokio::test]
    async fn sleep_waits() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(50)).await;

        assert!(env.now() - start >= Duration::from_millis(50));
    }
}

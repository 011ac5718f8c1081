//! Shared test utilities
//!
//! - `TestDatabase`: PostgreSQL container with the workspace migrations applied
//!   (feature: "postgres")
//! - `TestRedis`: Redis container for the Streams broker (feature: "redis")
//! - `TestDataBuilder`: deterministic names, addresses and stream keys
//!
//! Container-backed tests need Docker and are marked `#[ignore]`; run them
//! with `cargo test -- --ignored`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Deterministic test data keyed by a seed.
///
/// Seeding from the test name keeps values stable between runs while keeping
/// tests that share a container from colliding on unique columns or stream keys.
#[derive(Debug, Clone, Copy)]
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let a = TestDataBuilder::from_test_name("test_create_user");
    /// let b = TestDataBuilder::from_test_name("test_create_user");
    /// assert_eq!(a.email("ann"), b.email("ann"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Display name, e.g. `ann-7`
    pub fn name(&self, who: &str) -> String {
        format!("{who}-{}", self.seed)
    }

    /// Unique address, e.g. `ann-7@example.com`
    pub fn email(&self, who: &str) -> String {
        format!("{who}-{}@example.com", self.seed)
    }

    /// Stream key private to this test, e.g. `user-events-7`
    pub fn stream(&self, base: &str) -> String {
        format!("{base}-{}", self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_follow_seed() {
        let builder = TestDataBuilder::new(7);
        assert_eq!(builder.name("ann"), "ann-7");
        assert_eq!(builder.email("ann"), "ann-7@example.com");
        assert_eq!(builder.stream("user-events"), "user-events-7");
    }

    #[test]
    fn test_different_tests_do_not_collide() {
        let a = TestDataBuilder::from_test_name("test1");
        let b = TestDataBuilder::from_test_name("test2");

        assert_ne!(a.email("x"), b.email("x"));
        assert_ne!(a.stream("s"), b.stream("s"));
    }
}

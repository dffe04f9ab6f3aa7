//! Absolute deadlines with wall-clock comparison.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Absolute deadline attached to every expirable object.
///
/// Serialized as milliseconds since the Unix epoch so clients and the
/// server agree on the instant rather than on a relative duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expiry(SystemTime);

impl Expiry {
    /// Deadline a duration from now.
    pub fn after(ttl: Duration) -> Self {
        Self(SystemTime::now() + ttl)
    }

    /// Deadline at an absolute instant.
    pub fn at(deadline: SystemTime) -> Self {
        Self(deadline)
    }

    /// The absolute deadline.
    pub fn deadline(&self) -> SystemTime {
        self.0
    }

    /// Time remaining until the deadline; zero once passed.
    pub fn ttl(&self) -> Duration {
        self.0
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.ttl() == Duration::ZERO
    }

    /// The later of two deadlines.
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let millis = self
            .0
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        serializer.serialize_u64(millis)
    }
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Self(UNIX_EPOCH + Duration::from_millis(millis)))
    }
}

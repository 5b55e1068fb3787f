use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

id_type!(
    /// Identity of one live transport connection. Never reused once the
    /// connection goes away.
    ConnectionId
);
id_type!(SessionId);
id_type!(MessageId);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Clock: Send {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Source of fresh session and message identifiers.
pub trait IdSource: Send {
    fn next_id(&mut self) -> Uuid;
}

pub struct UuidV7;

impl IdSource for UuidV7 {
    fn next_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use super::{Clock, IdSource};

    #[derive(Clone)]
    pub(crate) struct ManualClock(Arc<Mutex<OffsetDateTime>>);

    impl ManualClock {
        pub(crate) fn at(unix_seconds: i64) -> Self {
            let start = OffsetDateTime::from_unix_timestamp(unix_seconds).unwrap();
            Self(Arc::new(Mutex::new(start)))
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    pub(crate) struct Sequential(u128);

    impl IdSource for Sequential {
        fn next_id(&mut self) -> Uuid {
            self.0 += 1;
            Uuid::from_u128(self.0)
        }
    }
}

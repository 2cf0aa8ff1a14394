//! Bound on the number of live sessions.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::debug;

use crate::config::LimitPolicy;
use crate::error::{OrmError, Result};

#[derive(Debug)]
struct Slots {
    in_use: Mutex<usize>,
    released: Condvar,
    max: usize,
}

/// Counts live sessions against a maximum.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    slots: Option<Arc<Slots>>,
    policy: LimitPolicy,
}

impl ConnectionLimiter {
    /// A limiter allowing `max` sessions, or any number when `None`.
    #[must_use]
    pub fn new(max: Option<usize>, policy: LimitPolicy) -> Self {
        Self {
            slots: max.map(|max| {
                Arc::new(Slots {
                    in_use: Mutex::new(0),
                    released: Condvar::new(),
                    max,
                })
            }),
            policy,
        }
    }

    /// Takes a slot, waiting or failing per the policy when none is free.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::ConnectionLimit`] under [`LimitPolicy::Fail`].
    pub fn acquire(&self) -> Result<Permit> {
        let Some(slots) = &self.slots else {
            return Ok(Permit { slots: None });
        };
        let mut in_use = slots.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= slots.max {
            if self.policy == LimitPolicy::Fail {
                return Err(OrmError::ConnectionLimit);
            }
            debug!(max = slots.max, "Waiting for a free session");
            in_use = slots
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        Ok(Permit {
            slots: Some(Arc::clone(slots)),
        })
    }

    /// Sessions currently holding a slot. Always zero when unbounded.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots
            .as_ref()
            .map_or(0, |s| *s.in_use.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A held slot, released on drop.
#[derive(Debug)]
pub struct Permit {
    slots: Option<Arc<Slots>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.take() {
            let mut in_use = slots.in_use.lock().unwrap_or_else(PoisonError::into_inner);
            *in_use = in_use.saturating_sub(1);
            slots.released.notify_one();
        }
    }
}

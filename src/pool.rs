use std::sync::Mutex;

use crate::connection::Connection;

/// The surface a connection pool exposes to its connections.
///
/// The pool's own sizing and eviction policy is its business; the client core
/// only ever asks it for a replacement after a transport failure and reports
/// call activity so the pool can keep aggregate statistics.
pub trait Pool: Send + Sync {
    /// Hands out a live replacement connection, if the pool has one.
    fn acquire(&self) -> Option<Connection>;

    /// Records one call issued by a connection owned by this pool.
    fn record_call(&self);
}

/// Shared call counter for pool implementations, updated under a mutex so
/// concurrent connections never lose increments.
#[derive(Debug, Default)]
pub struct CallCounter {
    calls: Mutex<u64>,
}

impl CallCounter {
    pub fn new() -> Self {
        CallCounter::default()
    }

    pub fn increment(&self) {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
    }

    pub fn get(&self) -> u64 {
        *self.calls.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_increments_across_threads() {
        let counter = Arc::new(CallCounter::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 8000);
    }
}

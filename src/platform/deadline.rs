// Request timeouts for platform continuations
// The SDK has no timeout of its own: a request that never answers would stall its chain forever.
// A guarded continuation is answered exactly once, by the platform or by the sweep, whichever comes first.

use log::{debug, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::{Completion, PlatformError};

trait Expiring {
    fn settled(&self) -> bool;
    fn expire(self: Box<Self>);
}

struct Guarded<T> {
    slot: Rc<RefCell<Option<Completion<T>>>>,
    timeout: Duration,
}

impl<T> Expiring for Guarded<T> {
    fn settled(&self) -> bool {
        self.slot.borrow().is_none()
    }

    fn expire(self: Box<Self>) {
        let pending = self.slot.borrow_mut().take();
        if let Some(done) = pending {
            done(Err(PlatformError::TimedOut(self.timeout)));
        }
    }
}

struct Pending {
    due: Instant,
    guard: Box<dyn Expiring>,
}

/// Tracks in-flight requests and fails the ones the platform never answers
pub struct Deadlines {
    timeout: Duration,
    pending: RefCell<Vec<Pending>>,
}

impl Deadlines {
    pub fn new(timeout: Duration) -> Self {
        Deadlines {
            timeout,
            pending: RefCell::new(Vec::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wrap a continuation so it receives `TimedOut` if no answer arrives in time.
    /// A real answer arriving after the timeout is discarded.
    pub fn guard<T: 'static>(&self, done: Completion<T>) -> Completion<T> {
        let slot = Rc::new(RefCell::new(Some(done)));
        self.pending.borrow_mut().push(Pending {
            due: Instant::now() + self.timeout,
            guard: Box::new(Guarded {
                slot: Rc::clone(&slot),
                timeout: self.timeout,
            }),
        });

        Box::new(move |result| {
            let pending = slot.borrow_mut().take();
            match pending {
                Some(done) => done(result),
                None => debug!("Discarding platform answer that arrived after its deadline"),
            }
        })
    }

    /// Number of requests still waiting for an answer
    pub fn in_flight(&self) -> usize {
        self.pending
            .borrow()
            .iter()
            .filter(|p| !p.guard.settled())
            .count()
    }

    /// Fail every request whose deadline is at or before `now`. Returns how many expired.
    pub fn expire(&self, now: Instant) -> usize {
        let due: Vec<Pending> = {
            let mut pending = self.pending.borrow_mut();
            pending.retain(|p| !p.guard.settled());
            let (due, waiting): (Vec<Pending>, Vec<Pending>) =
                pending.drain(..).partition(|p| p.due <= now);
            *pending = waiting;
            due
        };

        let expired = due.len();
        for p in due {
            warn!("Platform request timed out after {:?}", self.timeout);
            p.guard.expire();
        }
        expired
    }
}

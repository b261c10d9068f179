//! Bounded queues and the shutdown-token protocol shared by every worker.
//!
//! Workers never poll. Every blocking receive or send is a fair `select!`
//! against the shutdown queue, so a worker parked on an empty input queue or
//! a full output queue still exits when the coordinator broadcasts shutdown.

use crossbeam_channel::{bounded, select, Receiver, Sender};

/// One unit of "stop now". Each worker consumes at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownToken;

/// What a worker got when it waited for input.
#[derive(Debug, PartialEq, Eq)]
pub enum Next<T> {
    /// A job from the stage's input queue
    Job(T),
    /// Every sender for the input queue is gone and it is drained
    Closed,
    /// A shutdown token; the worker must exit
    Shutdown,
}

/// The worker was told to shut down while waiting to hand off an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

/// Where an item went when the receiver is allowed to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The receiver took it (or it is buffered)
    Delivered,
    /// The receiver was dropped; the item was discarded
    Orphaned,
}

/// Create a bounded queue. Senders block when `capacity` items are queued.
pub fn bounded_queue<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    bounded(capacity)
}

/// Sending half of the shutdown queue, owned by the coordinator.
#[derive(Debug)]
pub struct ShutdownBroadcaster {
    tx: Sender<ShutdownToken>,
    slots: usize,
}

/// Receiving half of the shutdown queue, cloned into every worker.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: Receiver<ShutdownToken>,
}

/// Create a shutdown queue with one slot per worker.
pub fn shutdown_channel(slots: usize) -> (ShutdownBroadcaster, ShutdownListener) {
    let (tx, rx) = bounded(slots.max(1));
    (ShutdownBroadcaster { tx, slots }, ShutdownListener { rx })
}

impl ShutdownBroadcaster {
    /// Queue one token per worker slot.
    ///
    /// The queue is sized to `slots`, so this never blocks. Returns the
    /// number of tokens actually queued.
    pub fn broadcast(&self) -> usize {
        (0..self.slots)
            .filter(|_| self.tx.try_send(ShutdownToken).is_ok())
            .count()
    }

    pub fn slots(&self) -> usize {
        self.slots
    }
}

impl ShutdownListener {
    /// Wait for whichever is ready first: a job on `jobs` or a shutdown token.
    pub fn next<T>(&self, jobs: &Receiver<T>) -> Next<T> {
        select! {
            recv(jobs) -> msg => match msg {
                Ok(job) => Next::Job(job),
                Err(_) => Next::Closed,
            },
            recv(self.rx) -> _ => Next::Shutdown,
        }
    }

    /// Like [`next`](Self::next), but a closed input just means there is
    /// nothing left to do until the shutdown token arrives.
    pub fn next_or_idle<T>(&self, jobs: &Receiver<T>) -> Option<T> {
        match self.next(jobs) {
            Next::Job(job) => Some(job),
            Next::Closed => {
                self.wait();
                None
            }
            Next::Shutdown => None,
        }
    }

    /// Hand `item` to `queue`, blocking while it is full.
    ///
    /// Gives up if a shutdown token arrives first or the receiving side is
    /// gone; either way the worker should stop.
    pub fn send<T>(&self, queue: &Sender<T>, item: T) -> Result<(), Stopped> {
        select! {
            send(queue, item) -> res => res.map_err(|_| Stopped),
            recv(self.rx) -> _ => Err(Stopped),
        }
    }

    /// Like [`send`](Self::send), but a dropped receiver is reported as
    /// [`Delivery::Orphaned`] instead of stopping the worker.
    pub fn deliver<T>(&self, queue: &Sender<T>, item: T) -> Result<Delivery, Stopped> {
        select! {
            send(queue, item) -> res => Ok(match res {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Orphaned,
            }),
            recv(self.rx) -> _ => Err(Stopped),
        }
    }

    /// Block until a shutdown token arrives (or the coordinator is gone).
    pub fn wait(&self) {
        let _ = self.rx.recv();
    }
}

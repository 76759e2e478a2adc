//! Bounded work queue
//!
//! Batched MPMC queue between the pair-enumerating driver and the
//! contracting workers: `send` blocks while the channel is full (natural
//! backpressure on the single producer), `receive_some` drains up to a
//! batch of items, and `close` makes emptiness final. Receivers observe
//! the close only after everything sent before it has been delivered.

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Mutex;

pub struct WorkQueue<T> {
    tx: Mutex<Option<Sender<T>>>,
    rx: Receiver<T>,
}

impl<T: Clone> WorkQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        WorkQueue {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Push a batch, blocking while the queue is full.
    pub fn send(&self, batch: &[T]) -> Result<()> {
        let tx = match &*self.tx.lock().expect("queue lock poisoned") {
            Some(tx) => tx.clone(),
            None => bail!("send on closed work queue"),
        };
        for item in batch {
            if tx.send(item.clone()).is_err() {
                bail!("work queue receivers are gone");
            }
        }
        Ok(())
    }

    /// Drain up to `max` items into `dst`, blocking for the first one.
    /// Returns 0 only when the queue is empty and closed.
    pub fn receive_some(&self, dst: &mut Vec<T>, max: usize) -> usize {
        match self.rx.recv() {
            Err(_) => 0,
            Ok(item) => {
                dst.push(item);
                let mut received = 1;
                while received < max {
                    match self.rx.try_recv() {
                        Ok(item) => {
                            dst.push(item);
                            received += 1;
                        }
                        Err(_) => break,
                    }
                }
                received
            }
        }
    }

    /// Idempotent; pending items remain receivable.
    pub fn close(&self) {
        self.tx.lock().expect("queue lock poisoned").take();
    }
}

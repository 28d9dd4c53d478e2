//! Write serialization queue
//!
//! Every mutation of a store instance passes through one FIFO pipeline.
//! A caller takes a ticket in call order and runs its write step only when
//! that ticket is being served, so writes persist in the order they were
//! issued.
//!
//! The ticket is an RAII guard: when it drops, the next ticket is served.
//! A write step that returns an error or panics therefore never wedges the
//! queue; its caller sees the failure and the next mutation proceeds.
//!
//! Closing stops new tickets from being issued, then waits for the tickets
//! already handed out to drain.

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// The queue is closing or closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("write queue is closed")]
pub struct QueueClosed;

#[derive(Debug, Default)]
struct QueueState {
    next_ticket: u64,
    now_serving: u64,
    closing: bool,
    closed: bool,
}

/// FIFO write pipeline for one store instance
#[derive(Debug, Default)]
pub struct WriteQueue {
    state: Mutex<QueueState>,
    turn: Condvar,
}

/// Exclusive right to write, held for the duration of one mutation
#[derive(Debug)]
pub struct WriteTicket<'a> {
    queue: &'a WriteQueue,
    number: u64,
}

impl WriteTicket<'_> {
    /// Position of this ticket in the queue's history
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl WriteQueue {
    /// Create an empty, open queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a ticket and block until it is served
    pub fn enter(&self) -> Result<WriteTicket<'_>, QueueClosed> {
        let mut state = self.state.lock();
        if state.closing || state.closed {
            return Err(QueueClosed);
        }
        let number = state.next_ticket;
        state.next_ticket += 1;
        while state.now_serving != number {
            self.turn.wait(&mut state);
        }
        Ok(WriteTicket {
            queue: self,
            number,
        })
    }

    /// Reject new tickets, then wait for outstanding ones to finish
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closing = true;
        while state.now_serving != state.next_ticket {
            self.turn.wait(&mut state);
        }
        state.closed = true;
    }

    /// Tickets issued but not yet finished
    pub fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.next_ticket - state.now_serving
    }

    /// True once [`close`](Self::close) has drained the queue
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock();
        state.now_serving += 1;
        self.queue.turn.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_tickets_are_sequential() {
        let queue = WriteQueue::new();
        let a = queue.enter().unwrap().number();
        let b = queue.enter().unwrap().number();
        assert_eq!((a, b), (0, 1));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_failed_step_does_not_wedge_queue() {
        let queue = WriteQueue::new();
        let result: Result<(), &str> = (|| {
            let _ticket = queue.enter().unwrap();
            Err("disk full")
        })();
        assert!(result.is_err());

        // Next mutation proceeds immediately
        assert!(queue.enter().is_ok());
    }

    #[test]
    fn test_panicking_step_does_not_wedge_queue() {
        let queue = Arc::new(WriteQueue::new());
        let q = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            let _ticket = q.enter().unwrap();
            panic!("boom");
        });
        assert!(handle.join().is_err());
        assert!(queue.enter().is_ok());
    }

    #[test]
    fn test_steps_run_in_ticket_order() {
        let queue = Arc::new(WriteQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        // Hold the first ticket while others line up behind it
        let first = queue.enter().unwrap();
        let mut handles = Vec::new();
        for i in 0..4 {
            let q = Arc::clone(&queue);
            let l = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                let ticket = q.enter().unwrap();
                l.lock().push((i, ticket.number()));
            }));
            // Let each thread take its ticket before starting the next
            while queue.pending() < i as u64 + 2 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        drop(first);
        for h in handles {
            h.join().unwrap();
        }

        let log = log.lock();
        let order: Vec<_> = log.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_close_rejects_new_tickets() {
        let queue = WriteQueue::new();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.enter().unwrap_err(), QueueClosed);
    }

    #[test]
    fn test_close_drains_outstanding_tickets() {
        let queue = Arc::new(WriteQueue::new());
        let ticket = queue.enter().unwrap();

        let q = Arc::clone(&queue);
        let closer = thread::spawn(move || q.close());

        thread::sleep(Duration::from_millis(20));
        assert!(!queue.is_closed());
        drop(ticket);

        closer.join().unwrap();
        assert!(queue.is_closed());
    }
}

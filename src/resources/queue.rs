use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// FIFO shared between any number of producers and consumers.
///
/// `pop` parks the caller on a condition variable while the queue is empty
/// and only returns `None` once the queue is closed and fully drained.
#[derive(Debug)]
pub struct RequestQueue<T> {
    state: Mutex<QueueState<T>>,
    cvar: Condvar,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Hands the item back if the queue has been closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(item);
        }

        state.items.push_back(item);
        drop(state);

        self.cvar.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.cvar.wait(&mut state);
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cvar.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::RequestQueue;

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<RequestQueue<u32>>();

    #[test]
    fn pops_in_fifo_order() {
        let queue = RequestQueue::new();
        for i in 0..3 {
            queue.push(i).unwrap();
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(RequestQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(9).unwrap();

        assert_eq!(consumer.join().unwrap(), Some(9));
    }

    #[test]
    fn close_drains_then_releases_consumers() {
        let queue = Arc::new(RequestQueue::new());
        queue.push(1).unwrap();
        queue.close();

        assert_eq!(queue.push(2), Err(2));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);

        let idle = Arc::new(RequestQueue::<u8>::new());
        let consumer = {
            let idle = Arc::clone(&idle);
            thread::spawn(move || idle.pop())
        };
        thread::sleep(Duration::from_millis(10));
        idle.close();
        assert_eq!(consumer.join().unwrap(), None);
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 输入队列 (Ingestion queue)
//!
//! Bounded FIFO between the camera callback thread and the processing loop.
//! When full the oldest event is dropped and counted; the processing loop
//! reports the count on the status channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::types::Event;

struct QueueState {
    events: VecDeque<Event>,
    dropped: u64,
}

pub struct EventQueue {
    state: Mutex<QueueState>,
    data_ready: Condvar,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                dropped: 0,
            }),
            data_ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: Event) {
        {
            let mut state = self.state.lock();
            Self::push_locked(&mut state, self.capacity, event);
        }
        self.data_ready.notify_one();
    }

    /// 一次加锁投递整个事件包
    pub fn push_batch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            for event in events {
                Self::push_locked(&mut state, self.capacity, *event);
            }
        }
        self.data_ready.notify_one();
    }

    fn push_locked(state: &mut QueueState, capacity: usize, event: Event) {
        if state.events.len() >= capacity {
            state.events.pop_front();
            state.dropped += 1;
        }
        state.events.push_back(event);
    }

    /// Blocks until events are queued, `timeout` elapses or `running` is
    /// cleared, then takes everything queued in arrival order.
    pub fn wait_drain(&self, timeout: Duration, running: &AtomicBool) -> VecDeque<Event> {
        let mut state = self.state.lock();
        if state.events.is_empty() && running.load(Ordering::Acquire) {
            let _ = self.data_ready.wait_for(&mut state, timeout);
        }
        std::mem::take(&mut state.events)
    }

    /// Wakes a blocked `wait_drain`. Takes the lock first so a waiter that
    /// already checked the running flag cannot miss the notification.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.data_ready.notify_all();
    }

    /// 返回并清零丢弃计数
    pub fn take_dropped(&self) -> u64 {
        std::mem::take(&mut self.state.lock().dropped)
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

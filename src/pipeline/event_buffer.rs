// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 滑动时间窗事件缓冲区
//! Sliding-window event buffer
//!
//! Events are kept sorted by timestamp. The window is anchored at the
//! largest timestamp ever pushed, so a late (out-of-order) event can never
//! pull the window backwards, and an event older than the window start is
//! rejected instead of being re-admitted.
//!
//! The processing loop may also advance the window start from its own clock
//! (`evict_before`), so the window keeps sliding while no events arrive.

use std::collections::VecDeque;

use crate::input::Event;

#[derive(Clone, Debug)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    time_window_us: u64,
    max_timestamp_us: Option<u64>,
    /// 外部时钟推进的窗口下界
    floor_us: u64,
    rejected: u64,
}

impl EventBuffer {
    pub fn new(time_window_us: u64) -> Self {
        Self {
            events: VecDeque::new(),
            time_window_us,
            max_timestamp_us: None,
            floor_us: 0,
            rejected: 0,
        }
    }

    /// 加入一个事件并淘汰窗口外的旧事件. 返回事件是否被保留
    pub fn push(&mut self, event: Event) -> bool {
        let max_ts = self
            .max_timestamp_us
            .map_or(event.timestamp_us, |m| m.max(event.timestamp_us));
        self.max_timestamp_us = Some(max_ts);
        let window_start = max_ts.saturating_sub(self.time_window_us).max(self.floor_us);

        if event.timestamp_us < window_start {
            self.rejected += 1;
            return false;
        }

        match self.events.back() {
            Some(last) if last.timestamp_us > event.timestamp_us => {
                // 乱序: 插到相同时间戳事件之后, 保持到达顺序
                let at = self
                    .events
                    .partition_point(|e| e.timestamp_us <= event.timestamp_us);
                self.events.insert(at, event);
            }
            _ => self.events.push_back(event),
        }

        self.evict_older_than(window_start);
        true
    }

    /// 丢弃早于 `start_us` 的事件, 之后也不再接收它们. 返回丢弃数
    pub fn evict_before(&mut self, start_us: u64) -> usize {
        self.floor_us = self.floor_us.max(start_us);
        self.evict_older_than(self.floor_us)
    }

    fn evict_older_than(&mut self, start_us: u64) -> usize {
        let before = self.events.len();
        while self
            .events
            .front()
            .is_some_and(|e| e.timestamp_us < start_us)
        {
            self.events.pop_front();
        }
        before - self.events.len()
    }

    pub fn extend<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        for event in events {
            self.push(event);
        }
    }

    /// 当前窗口内事件的拷贝
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn time_window_us(&self) -> u64 {
        self.time_window_us
    }

    pub fn max_timestamp_us(&self) -> Option<u64> {
        self.max_timestamp_us
    }

    pub fn window_start_us(&self) -> Option<u64> {
        self.max_timestamp_us
            .map(|m| m.saturating_sub(self.time_window_us).max(self.floor_us))
    }

    /// 因早于窗口而被拒绝的事件数
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.max_timestamp_us = None;
        self.floor_us = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ev(ts: u64) -> Event {
        Event::new(ts, 0, 0, true)
    }

    fn assert_windowed(buffer: &EventBuffer) {
        let start = buffer.window_start_us().unwrap_or(0);
        assert!(buffer.iter().all(|e| e.timestamp_us >= start));
        let ts: Vec<u64> = buffer.iter().map(|e| e.timestamp_us).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_evicts_old_events() {
        let mut buffer = EventBuffer::new(100);
        buffer.extend([ev(0), ev(50), ev(100), ev(150)]);
        // 窗口 [50, 150]
        let ts: Vec<u64> = buffer.iter().map(|e| e.timestamp_us).collect();
        assert_eq!(ts, vec![50, 100, 150]);
    }

    #[test]
    fn test_out_of_order_inside_window_is_interleaved() {
        let mut buffer = EventBuffer::new(100);
        buffer.extend([ev(100), ev(120), ev(110)]);
        let ts: Vec<u64> = buffer.iter().map(|e| e.timestamp_us).collect();
        assert_eq!(ts, vec![100, 110, 120]);
        assert_eq!(buffer.max_timestamp_us(), Some(120));
    }

    #[test]
    fn test_late_event_rejected_and_window_not_pulled_back() {
        let mut buffer = EventBuffer::new(100);
        buffer.extend([ev(500), ev(600)]);
        assert!(!buffer.push(ev(450)));
        assert_eq!(buffer.rejected(), 1);
        assert_eq!(buffer.max_timestamp_us(), Some(600));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.window_start_us(), Some(500));
    }

    #[test]
    fn test_evicted_event_never_readmitted() {
        let mut buffer = EventBuffer::new(10);
        buffer.push(ev(0));
        buffer.push(ev(100));
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.push(ev(0)));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_window_invariant_under_jitter() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut buffer = EventBuffer::new(1_000);
        let mut t: u64 = 0;
        for _ in 0..5_000 {
            t += rng.gen_range(0..20);
            let jitter = rng.gen_range(0..1_500);
            buffer.push(ev(t.saturating_sub(jitter)));
            assert_windowed(&buffer);
        }
        assert!(buffer.rejected() > 0);
    }

    #[test]
    fn test_clock_eviction_empties_idle_window() {
        let mut buffer = EventBuffer::new(1_000);
        buffer.extend([ev(100), ev(600), ev(900)]);

        // 没有新事件, 时钟走到 1_700: 窗口 [700, 1_700]
        assert_eq!(buffer.evict_before(700), 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.window_start_us(), Some(700));

        assert_eq!(buffer.evict_before(2_000), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.max_timestamp_us(), Some(900));

        // 时钟之前的迟到事件同样被拒绝
        assert!(!buffer.push(ev(1_500)));
        assert!(buffer.push(ev(2_100)));
        assert_eq!(buffer.evict_before(500), 0);
        assert_eq!(buffer.window_start_us(), Some(2_000));
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut buffer = EventBuffer::new(100);
        buffer.push(Event::new(10, 1, 0, true));
        buffer.push(Event::new(20, 2, 0, true));
        buffer.push(Event::new(10, 3, 0, true));
        let xs: Vec<u16> = buffer.iter().map(|e| e.x).collect();
        assert_eq!(xs, vec![1, 3, 2]);
    }
}

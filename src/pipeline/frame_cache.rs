// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 最新强度帧缓存
//! Latest intensity frame plus frame rate, written by the camera's frame
//! callback and read by any number of consumers.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::input::Frame;

#[derive(Default)]
struct FrameSlot {
    frame: Option<Frame>,
    fps: f32,
    received_at: Option<Instant>,
}

pub struct FrameCache {
    slot: Mutex<FrameSlot>,
    stale_after: Duration,
}

impl FrameCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            slot: Mutex::new(FrameSlot::default()),
            stale_after,
        }
    }

    pub fn publish(&self, frame: Frame) {
        self.publish_at(frame, Instant::now());
    }

    /// FPS 由相邻两帧的传感器时间戳计算; 时间戳不前进时保留上一次的值
    pub fn publish_at(&self, frame: Frame, received_at: Instant) {
        let mut slot = self.slot.lock();
        if let Some(previous) = &slot.frame {
            let delta_us = frame.timestamp_us.saturating_sub(previous.timestamp_us);
            if delta_us > 0 {
                slot.fps = (1e6 / delta_us as f64) as f32;
            }
        }
        slot.frame = Some(frame);
        slot.received_at = Some(received_at);
    }

    pub fn latest(&self) -> Option<Frame> {
        self.slot.lock().frame.clone()
    }

    pub fn fps(&self) -> f32 {
        self.fps_at(Instant::now())
    }

    /// 超过 `stale_after` 没有新帧时返回 0
    pub fn fps_at(&self, now: Instant) -> f32 {
        let slot = self.slot.lock();
        match slot.received_at {
            Some(at) if now.saturating_duration_since(at) <= self.stale_after => slot.fps,
            _ => 0.0,
        }
    }
}

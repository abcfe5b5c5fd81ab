// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 统计 (Statistics)
//! Processing rate bookkeeping and the snapshot published to readers

use std::time::Instant;

use crate::detection::TrackedObject;

/// 一个处理周期结束时的完整统计, 整体替换, 不做合并
#[derive(Clone, Debug, Default)]
pub struct StatsSnapshot {
    pub processing_fps: f32,
    pub frame_fps: f32,
    pub objects: Vec<TrackedObject>,
    pub cycle_count: u64,
    /// 周期时刻 (传感器时间轴, 微秒)
    pub timestamp_us: u64,
    pub buffered_events: usize,
    pub dropped_events: u64,
}

/// 处理帧率统计
#[derive(Debug, Default)]
pub struct StatsAggregator {
    last_cycle: Option<Instant>,
    cycle_count: u64,
    processing_fps: f32,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个周期, 返回 1 / 周期间隔. 第一个周期或间隔为0时返回 0
    pub fn record_cycle(&mut self, now: Instant) -> f32 {
        self.cycle_count += 1;
        self.processing_fps = match self.last_cycle {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64();
                if elapsed > 0.0 {
                    (1.0 / elapsed) as f32
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_cycle = Some(now);
        self.processing_fps
    }

    pub fn processing_fps(&self) -> f32 {
        self.processing_fps
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }
}

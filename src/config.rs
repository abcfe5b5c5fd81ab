// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 处理器配置 - 通过JSON文件调整参数
//! Processor configuration, read once at construction

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// 检测参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sensor_width: u16,  // 传感器宽度(像素)
    pub sensor_height: u16, // 传感器高度(像素)
    pub bin_size: u16,      // 密度图每格边长(像素)
    pub min_density: u32,   // 每格最少事件数
    pub min_area: u32,      // 候选区域最小面积(像素)
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensor_width: 346,
            sensor_height: 260,
            bin_size: 1,
            min_density: 1,
            min_area: 4,
        }
    }
}

/// 跟踪参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub match_iou_threshold: f32,    // ROI与候选框的最小IOU
    pub max_match_distance: f32,     // 预测中心与候选中心的最大距离(像素)
    pub staleness_threshold_us: u64, // 未匹配超过该时长即删除
    pub velocity_history_len: usize, // 速度平滑窗口长度
    pub roi_margin: f32,             // ROI相对bbox的外扩(像素)
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_iou_threshold: 0.1,
            max_match_distance: 20.0,
            staleness_threshold_us: 200_000,
            velocity_history_len: 10,
            roi_margin: 2.0,
        }
    }
}

/// 输入队列参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_queue_len: usize,   // 超出后丢弃最旧事件
    pub wait_timeout_ms: u64,   // 处理线程等待数据的超时
    pub notify_capacity: usize, // 每个状态订阅者的通道容量
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_len: 1_000_000,
            wait_timeout_ms: 10,
            notify_capacity: 256,
        }
    }
}

/// 处理器配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Sliding window length in microseconds.
    pub time_window_us: u64,
    /// Detection/tracking/statistics cadence in microseconds.
    pub update_stats_interval_us: u64,
    /// Frame FPS reads as zero once no frame arrived for this long.
    pub stale_after_us: u64,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub queue: QueueConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            time_window_us: 100_000,
            update_stats_interval_us: 33_000,
            stale_after_us: 1_000_000,
            detector: DetectorConfig::default(),
            tracker: TrackerConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidConfig(msg.into())
}

impl ProcessorConfig {
    /// 校验配置, 非法值直接报错而不是静默修正
    pub fn validate(&self) -> Result<()> {
        if self.time_window_us == 0 {
            return Err(invalid("time_window_us must be positive"));
        }
        if self.update_stats_interval_us == 0 {
            return Err(invalid("update_stats_interval_us must be positive"));
        }
        if self.stale_after_us == 0 {
            return Err(invalid("stale_after_us must be positive"));
        }

        let d = &self.detector;
        if d.sensor_width == 0 || d.sensor_height == 0 {
            return Err(invalid("sensor dimensions must be non-zero"));
        }
        if d.bin_size == 0 {
            return Err(invalid("detector.bin_size must be positive"));
        }
        if d.min_density == 0 {
            return Err(invalid("detector.min_density must be positive"));
        }

        let t = &self.tracker;
        if !t.match_iou_threshold.is_finite() || !(0.0..=1.0).contains(&t.match_iou_threshold) {
            return Err(invalid("tracker.match_iou_threshold must be within [0, 1]"));
        }
        if !t.max_match_distance.is_finite() || t.max_match_distance < 0.0 {
            return Err(invalid("tracker.max_match_distance must be non-negative"));
        }
        if !t.roi_margin.is_finite() || t.roi_margin < 0.0 {
            return Err(invalid("tracker.roi_margin must be non-negative"));
        }
        if t.staleness_threshold_us == 0 {
            return Err(invalid("tracker.staleness_threshold_us must be positive"));
        }
        if t.velocity_history_len == 0 {
            return Err(invalid("tracker.velocity_history_len must be positive"));
        }

        let q = &self.queue;
        if q.max_queue_len == 0 {
            return Err(invalid("queue.max_queue_len must be positive"));
        }
        if q.wait_timeout_ms == 0 {
            return Err(invalid("queue.wait_timeout_ms must be positive"));
        }
        if q.notify_capacity == 0 {
            return Err(invalid("queue.notify_capacity must be positive"));
        }

        Ok(())
    }

    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("配置文件 {} 不存在, 创建默认配置", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        info!("配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Err(e) = fs::write(path.as_ref(), json) {
            warn!("保存配置失败: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// 当前配置摘要
    pub fn summary(&self) -> String {
        format!(
            "window={}us interval={}us sensor={}x{} bin={} min_density={} min_area={} \
             iou>={:.2} dist<={:.1}px stale>{}us history={}",
            self.time_window_us,
            self.update_stats_interval_us,
            self.detector.sensor_width,
            self.detector.sensor_height,
            self.detector.bin_size,
            self.detector.min_density,
            self.detector.min_area,
            self.tracker.match_iou_threshold,
            self.tracker.max_match_distance,
            self.tracker.staleness_threshold_us,
            self.tracker.velocity_history_len,
        )
    }
}

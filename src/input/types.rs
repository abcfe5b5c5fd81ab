// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 事件相机数据结构
//! Data produced by the event camera

use std::sync::Arc;

use image::GrayImage;

/// 单个像素的亮度变化事件 (DVS event)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Event {
    pub timestamp_us: u64,
    pub x: u16,
    pub y: u16,
    /// true = ON (亮度增加), false = OFF
    pub polarity: bool,
}

impl Event {
    pub fn new(timestamp_us: u64, x: u16, y: u16, polarity: bool) -> Self {
        Self {
            timestamp_us,
            x,
            y,
            polarity,
        }
    }
}

/// 强度帧 (APS frame)
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: Arc<GrayImage>, // 使用Arc共享数据,避免复制
    pub timestamp_us: u64,
}

impl Frame {
    pub fn new(image: GrayImage, timestamp_us: u64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp_us,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 相机回调接口
//! Capability traits invoked by the camera driver on its own thread.
//!
//! Implementations must not block: they only enqueue or swap a value under a
//! short lock.

use super::types::{Event, Frame};

/// 接收解码后的事件
pub trait EventReceiver: Send + Sync {
    fn on_event(&self, event: Event);

    /// 一次投递一个事件包
    fn on_events(&self, events: &[Event]) {
        for event in events {
            self.on_event(*event);
        }
    }
}

/// 接收强度帧
pub trait FrameReceiver: Send + Sync {
    fn on_frame(&self, frame: Frame);
}

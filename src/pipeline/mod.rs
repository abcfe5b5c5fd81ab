// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 事件处理流水线 (Event Processing Pipeline)
///
/// 线程架构:
/// - 相机线程: 回调入队 (EventReceiver / FrameReceiver), 不阻塞
/// - 处理线程: 出队 → 事件窗口 → 定期 检测 + 跟踪 + 统计
/// - 读取方:   任意线程通过加锁的快照接口读取结果
pub mod event_buffer;
pub mod frame_cache;
pub mod notify;
pub mod processor;
pub mod renderer;
pub mod stats;

pub use event_buffer::EventBuffer;
pub use frame_cache::FrameCache;
pub use notify::{Notifier, StatusLevel, StatusMessage};
pub use processor::{CycleOutput, Pipeline, Processor};
pub use stats::{StatsAggregator, StatsSnapshot};

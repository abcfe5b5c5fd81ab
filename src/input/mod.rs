// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 事件输入系统 (Event Input System)
///
/// 相机驱动在自己的线程上回调, 这里只负责入队:
/// - EventReceiver / FrameReceiver: 相机回调接口
/// - EventQueue: 有界输入队列 (相机线程 → 处理线程)
/// - SyntheticCamera: 合成事件源, 用于测试与演示
pub mod queue;
pub mod receiver;
pub mod synthetic;
pub mod types;

pub use queue::EventQueue;
pub use receiver::{EventReceiver, FrameReceiver};
pub use synthetic::{Blob, SyntheticCamera};
pub use types::{Event, Frame};

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 事件相机目标跟踪 (DVS object tracking)
//!
//! Turns the asynchronous event stream of a neuromorphic camera into a live
//! set of tracked objects with position, velocity and timing statistics.
pub mod config; // 处理器配置参数
pub mod detection; // 检测与跟踪
pub mod error; // 错误类型
pub mod input; // 事件输入系统
pub mod pipeline; // 处理流水线

pub use crate::config::{DetectorConfig, ProcessorConfig, QueueConfig, TrackerConfig};
pub use crate::detection::{BBox, CandidateDetector, Detector, Point2, TrackedObject, Tracker};
pub use crate::error::{PipelineError, Result};
pub use crate::input::{Event, EventReceiver, Frame, FrameReceiver};
pub use crate::pipeline::{EventBuffer, Pipeline, Processor, StatsSnapshot, StatusLevel, StatusMessage};

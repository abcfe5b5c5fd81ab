// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// 在处理线程内同步执行, 不持有跨周期状态的部分与持有状态的部分分开:
/// - Detector: 事件密度图 → 候选框 (无状态)
/// - Tracker:  候选框 → 持久目标 (ID、速度、统计)
pub mod detector;
pub mod tracker;
pub mod types;

pub use detector::{CandidateDetector, Detector};
pub use tracker::{is_in_roi, TrackedObject, Tracker};
pub use types::{BBox, Point2};

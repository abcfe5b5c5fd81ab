// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 多目标跟踪
//! Multi-object tracking over detector candidates
//!
//! 核心思想:
//! 1. 以预测中心(中心 + 速度 × Δt)与候选框匹配
//! 2. IOU 优先, 中心距离打破平局, 贪心一对一分配
//! 3. 未匹配的目标累计失配时长, 超过阈值即删除
//! 4. 未匹配的候选框创建新目标, ID 单调递增永不复用
//!
//! All timestamps are on the sensor's microsecond timeline.

use std::collections::VecDeque;

use tracing::debug;

use super::types::{BBox, Point2};
use crate::config::TrackerConfig;
use crate::input::Event;

/// 跟踪对象
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    /// 唯一跟踪ID
    pub id: u32,

    /// 当前中心点 (bbox 中心)
    pub center: Point2,

    /// 平滑速度 (像素/秒, 历史均值)
    pub velocity: Point2,

    /// 瞬时速度历史, 最旧的在前
    pub velocity_history: VecDeque<Point2>,

    /// 速度方向单位向量
    pub velocity_norm: Point2,

    /// 最近中心点, 用于位置标准差
    pub position_history: VecDeque<Point2>,

    /// 最近中心点的标准差 (x, y)
    pub position_std_dev: Point2,

    /// 计数事件用的区域 (bbox 外扩)
    pub roi: BBox,

    /// 最近一次匹配的检测框
    pub bbox: BBox,

    /// 落在 ROI 内的事件累计数
    pub event_count: usize,

    pub created_at_us: u64,
    pub last_roi_update_us: u64,
    pub time_since_last_update_us: u64,
}

impl TrackedObject {
    fn new(id: u32, bbox: BBox, events: &[Event], now_us: u64, config: &TrackerConfig) -> Self {
        let center = bbox.center();
        let roi = bbox.inflate(config.roi_margin);
        let event_count = events
            .iter()
            .filter(|e| e.timestamp_us <= now_us && is_in_roi(e, &roi))
            .count();

        let mut position_history = VecDeque::with_capacity(config.velocity_history_len);
        position_history.push_back(center);

        Self {
            id,
            center,
            velocity: Point2::ZERO,
            velocity_history: VecDeque::with_capacity(config.velocity_history_len),
            velocity_norm: Point2::ZERO,
            position_history,
            position_std_dev: Point2::ZERO,
            roi,
            bbox,
            event_count,
            created_at_us: now_us,
            last_roi_update_us: now_us,
            time_since_last_update_us: 0,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.norm()
    }

    pub fn age_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.created_at_us)
    }

    pub fn is_in_roi(&self, event: &Event) -> bool {
        is_in_roi(event, &self.roi)
    }

    /// 匀速模型预测 `now_us` 时刻的中心
    pub fn predicted_center(&self, now_us: u64) -> Point2 {
        let dt = now_us.saturating_sub(self.last_roi_update_us) as f32 / 1e6;
        self.center + self.velocity * dt
    }

    /// 用匹配到的检测框更新运动状态
    fn update(&mut self, bbox: BBox, events: &[Event], now_us: u64, config: &TrackerConfig) {
        let new_center = bbox.center();
        let dt_us = now_us.saturating_sub(self.last_roi_update_us);

        if dt_us > 0 {
            let dt = dt_us as f32 / 1e6;
            push_bounded(
                &mut self.velocity_history,
                (new_center - self.center) / dt,
                config.velocity_history_len,
            );
        }
        self.velocity = mean(&self.velocity_history);
        self.velocity_norm = self.velocity.normalized();

        push_bounded(&mut self.position_history, new_center, config.velocity_history_len);
        self.position_std_dev = std_dev(&self.position_history);

        let previous_update = self.last_roi_update_us;
        self.center = new_center;
        self.bbox = bbox;
        self.roi = bbox.inflate(config.roi_margin);

        // 只计入上次更新之后的事件, 窗口重叠时不重复计数
        self.event_count += events
            .iter()
            .filter(|e| e.timestamp_us > previous_update && e.timestamp_us <= now_us)
            .filter(|e| is_in_roi(e, &self.roi))
            .count();

        self.last_roi_update_us = now_us;
        self.time_since_last_update_us = 0;
    }
}

/// 半开区间判定, 与 `BBox::contains` 一致
#[inline]
pub fn is_in_roi(event: &Event, roi: &BBox) -> bool {
    roi.contains(event.x as f32, event.y as f32)
}

fn push_bounded(history: &mut VecDeque<Point2>, value: Point2, max_len: usize) {
    while history.len() >= max_len.max(1) {
        history.pop_front();
    }
    history.push_back(value);
}

fn mean(samples: &VecDeque<Point2>) -> Point2 {
    if samples.is_empty() {
        return Point2::ZERO;
    }
    let sum = samples.iter().fold(Point2::ZERO, |acc, p| acc + *p);
    sum / samples.len() as f32
}

fn std_dev(samples: &VecDeque<Point2>) -> Point2 {
    if samples.len() < 2 {
        return Point2::ZERO;
    }
    let m = mean(samples);
    let n = samples.len() as f32;
    let var = samples.iter().fold(Point2::ZERO, |acc, p| {
        let d = *p - m;
        acc + Point2::new(d.x * d.x, d.y * d.y)
    }) / n;
    Point2::new(var.x.sqrt(), var.y.sqrt())
}

/// 候选匹配对
struct Candidate {
    object: usize,
    detection: usize,
    iou: f32,
    distance: f32,
}

/// 多目标跟踪器
pub struct Tracker {
    config: TrackerConfig,

    /// 当前跟踪的目标, 仅由跟踪器持有
    objects: Vec<TrackedObject>,

    /// 下一个分配的ID
    next_id: u32,

    /// 上一次 update 的时刻
    last_update_us: Option<u64>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            next_id: 1,
            last_update_us: None,
        }
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn track_count(&self) -> usize {
        self.objects.len()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// 用本周期的候选框更新跟踪器
    ///
    /// `events` is the window the candidates were detected in, used to count
    /// events inside each ROI. `now_us` must not go backwards between calls.
    pub fn update(&mut self, detections: &[BBox], events: &[Event], now_us: u64) -> &[TrackedObject] {
        let elapsed_us = self
            .last_update_us
            .map(|last| now_us.saturating_sub(last))
            .unwrap_or(0);
        self.last_update_us = Some(now_us);

        // 1. 计算所有可接受的 (目标, 候选框) 对
        let mut pairs = Vec::new();
        for (oi, object) in self.objects.iter().enumerate() {
            let predicted = object.predicted_center(now_us);
            for (di, detection) in detections.iter().enumerate() {
                let iou = object.roi.iou(detection);
                let distance = predicted.distance_to(&detection.center());
                let overlaps = iou > 0.0 && iou >= self.config.match_iou_threshold;
                if overlaps || distance <= self.config.max_match_distance {
                    pairs.push(Candidate {
                        object: oi,
                        detection: di,
                        iou,
                        distance,
                    });
                }
            }
        }

        // 2. 贪心分配: IOU 高者优先, 距离近者打破平局
        pairs.sort_by(|a, b| b.iou.total_cmp(&a.iou).then(a.distance.total_cmp(&b.distance)));

        let mut object_matched = vec![false; self.objects.len()];
        let mut detection_matched = vec![false; detections.len()];
        for pair in &pairs {
            if object_matched[pair.object] || detection_matched[pair.detection] {
                continue;
            }
            object_matched[pair.object] = true;
            detection_matched[pair.detection] = true;
            self.objects[pair.object].update(detections[pair.detection], events, now_us, &self.config);
        }

        // 3. 未匹配目标累计失配时长, 超过阈值删除
        let staleness = self.config.staleness_threshold_us;
        let mut index = 0;
        self.objects.retain_mut(|object| {
            let matched = object_matched[index];
            index += 1;
            if matched {
                return true;
            }
            object.time_since_last_update_us += elapsed_us;
            if object.time_since_last_update_us > staleness {
                debug!(
                    "目标 {} 超过 {}us 未更新, 删除",
                    object.id, object.time_since_last_update_us
                );
                return false;
            }
            true
        });

        // 4. 未匹配候选框创建新目标
        for (di, detection) in detections.iter().enumerate() {
            if detection_matched[di] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            debug!("新目标 {} @ ({:.1}, {:.1})", id, detection.center().x, detection.center().y);
            self.objects
                .push(TrackedObject::new(id, *detection, events, now_us, &self.config));
        }

        &self.objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrackerConfig {
        TrackerConfig {
            match_iou_threshold: 0.1,
            max_match_distance: 20.0,
            staleness_threshold_us: 200_000,
            velocity_history_len: 3,
            roi_margin: 0.0,
        }
    }

    fn square_events(bbox: &BBox, t0: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for y in bbox.y1 as u16..bbox.y2 as u16 {
            for x in bbox.x1 as u16..bbox.x2 as u16 {
                events.push(Event::new(t0 + events.len() as u64, x, y, true));
            }
        }
        events
    }

    #[test]
    fn test_new_object_from_unmatched_candidate() {
        let mut tracker = Tracker::new(config());
        let bbox = BBox::new(10.0, 10.0, 20.0, 20.0);
        let events = square_events(&bbox, 0);

        let objects = tracker.update(&[bbox], &events, 1_000);
        assert_eq!(objects.len(), 1);
        let obj = &objects[0];
        assert_eq!(obj.id, 1);
        assert_eq!(obj.bbox, bbox);
        assert_eq!(obj.center, Point2::new(15.0, 15.0));
        assert_eq!(obj.velocity, Point2::ZERO);
        assert!(obj.velocity_history.is_empty());
        assert_eq!(obj.event_count, 100);
        assert_eq!(obj.last_roi_update_us, 1_000);
    }

    #[test]
    fn test_no_candidates_ages_objects() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(0.0, 0.0, 5.0, 5.0), BBox::new(50.0, 50.0, 55.0, 55.0)], &[], 0);

        let objects = tracker.update(&[], &[], 30_000);
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.time_since_last_update_us == 30_000));
        assert_eq!(tracker.next_id(), 3);
    }

    #[test]
    fn test_overlapping_candidate_updates_existing() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(10.0, 10.0, 20.0, 20.0)], &[], 0);

        let moved = BBox::new(12.0, 10.0, 22.0, 20.0);
        let objects = tracker.update(&[moved], &[], 10_000);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, 1);
        assert_eq!(objects[0].bbox, moved);
        assert_eq!(objects[0].time_since_last_update_us, 0);
        // 2 像素 / 0.01 秒
        assert!((objects[0].velocity.x - 200.0).abs() < 1e-2);
        assert!((objects[0].velocity_norm.x - 1.0).abs() < 1e-5);
        assert!(objects[0].velocity_norm.y.abs() < 1e-6);
    }

    #[test]
    fn test_speed_and_age() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(0.0, 0.0, 10.0, 10.0)], &[], 5_000);
        // 0.01 秒内移动 (3, 4) 像素
        let objects = tracker.update(&[BBox::new(3.0, 4.0, 13.0, 14.0)], &[], 15_000);
        assert!((objects[0].speed() - 500.0).abs() < 1e-2);
        assert_eq!(objects[0].age_us(15_000), 10_000);
        assert_eq!(objects[0].age_us(0), 0);
    }

    #[test]
    fn test_stale_object_removed_and_id_not_reused() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(10.0, 10.0, 20.0, 20.0)], &[], 0);

        tracker.update(&[], &[], 100_000);
        assert_eq!(tracker.track_count(), 1);
        tracker.update(&[], &[], 250_000);
        assert_eq!(tracker.track_count(), 0);

        let objects = tracker.update(&[BBox::new(10.0, 10.0, 20.0, 20.0)], &[], 260_000);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, 2);
    }

    #[test]
    fn test_competing_candidates_best_wins() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(10.0, 10.0, 20.0, 20.0)], &[], 0);

        let near = BBox::new(11.0, 10.0, 21.0, 20.0);
        let far = BBox::new(16.0, 10.0, 26.0, 20.0);
        let objects = tracker.update(&[far, near], &[], 10_000);

        assert_eq!(objects.len(), 2);
        let original = objects.iter().find(|o| o.id == 1).unwrap();
        assert_eq!(original.bbox, near);
        let spawned = objects.iter().find(|o| o.id == 2).unwrap();
        assert_eq!(spawned.bbox, far);
    }

    #[test]
    fn test_iou_tie_broken_by_distance() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_match_distance: 50.0,
            ..config()
        });
        tracker.update(&[BBox::new(0.0, 0.0, 10.0, 10.0)], &[], 0);

        // 两个候选框与 ROI 都不重叠 (IOU = 0), 选更近的
        let closer = BBox::new(20.0, 0.0, 30.0, 10.0);
        let farther = BBox::new(35.0, 0.0, 45.0, 10.0);
        let objects = tracker.update(&[farther, closer], &[], 10_000);
        let original = objects.iter().find(|o| o.id == 1).unwrap();
        assert_eq!(original.bbox, closer);
    }

    #[test]
    fn test_distant_candidate_not_matched() {
        let mut tracker = Tracker::new(config());
        tracker.update(&[BBox::new(0.0, 0.0, 10.0, 10.0)], &[], 0);
        let objects = tracker.update(&[BBox::new(100.0, 100.0, 110.0, 110.0)], &[], 10_000);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].time_since_last_update_us, 10_000);
    }

    #[test]
    fn test_velocity_history_bounded_and_smoothed() {
        let mut tracker = Tracker::new(config());
        let mut t = 0;
        for step in 0..6 {
            let x = step as f32 * 2.0;
            tracker.update(&[BBox::new(x, 0.0, x + 10.0, 10.0)], &[], t);
            t += 10_000;
        }
        let obj = &tracker.objects()[0];
        assert_eq!(obj.velocity_history.len(), 3);
        assert_eq!(obj.position_history.len(), 3);
        assert!((obj.velocity.x - 200.0).abs() < 1e-2);
        assert!(obj.velocity.y.abs() < 1e-6);
        // 最近三个中心 x = 11, 13, 15
        assert!((obj.position_std_dev.x - (8.0f32 / 3.0).sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_event_count_not_double_counted() {
        let mut tracker = Tracker::new(config());
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
        let first = square_events(&bbox, 0);
        tracker.update(&[bbox], &first, 1_000);
        assert_eq!(tracker.objects()[0].event_count, 100);

        // 窗口里仍有旧事件, 外加 100 个新事件
        let mut window = first.clone();
        window.extend(square_events(&bbox, 2_000));
        tracker.update(&[bbox], &window, 3_000);
        assert_eq!(tracker.objects()[0].event_count, 200);
    }

    #[test]
    fn test_shared_boundary_event_counted_once() {
        let mut tracker = Tracker::new(config());
        let left = BBox::new(0.0, 0.0, 10.0, 10.0);
        let right = BBox::new(10.0, 0.0, 20.0, 10.0);
        let boundary = [Event::new(0, 10, 5, true)];

        let objects = tracker.update(&[left, right], &boundary, 0);
        let total: usize = objects.iter().map(|o| o.event_count).sum();
        assert_eq!(total, 1);
        assert_eq!(objects.iter().find(|o| o.bbox == right).unwrap().event_count, 1);
    }
}

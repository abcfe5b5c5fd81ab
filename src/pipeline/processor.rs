// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 事件处理器 (Processor)
//! 职责: 相机回调入队 → 处理线程取出 → 更新事件窗口 → 定期 检测 + 跟踪 + 统计
//!
//! Locking: every accessor takes exactly one lock, copies, and releases it
//! before returning. The processing thread is the only writer of the event
//! buffer and the statistics snapshot.
//!
//! Detection and tracking run synchronously on the processing thread with no
//! per-call timeout; a cycle that hangs stalls ingestion and the queue then
//! starts dropping its oldest events. A cycle that fails or panics is
//! reported on the status channel and skipped.
//!
//! The tracker and the cycle clock belong to the `Processor`, not to one run
//! of the thread: `stop()` takes them back and the next `start()` resumes
//! them, so object ids keep increasing across restarts.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::event_buffer::EventBuffer;
use super::frame_cache::FrameCache;
use super::notify::{Notifier, StatusMessage};
use super::renderer;
use super::stats::{StatsAggregator, StatsSnapshot};
use crate::config::ProcessorConfig;
use crate::detection::{BBox, CandidateDetector, Detector, TrackedObject, Tracker};
use crate::error::{PipelineError, Result};
use crate::input::{Event, EventQueue, EventReceiver, Frame, FrameReceiver};

/// 每隔多少个周期输出一次摘要日志
const SUMMARY_EVERY: u64 = 60;

/// 单个周期的输出
#[derive(Clone, Debug)]
pub struct CycleOutput {
    pub candidates: Vec<BBox>,
    pub objects: Vec<TrackedObject>,
    pub processing_fps: f32,
    pub detect_ms: f64,
    pub track_ms: f64,
}

/// 单线程处理核心: 检测 → 跟踪 → 统计
///
/// `Processor` drives one of these from its worker thread; tests drive it
/// directly with synthetic windows.
pub struct Pipeline {
    detector: Box<dyn CandidateDetector>,
    tracker: Tracker,
    aggregator: StatsAggregator,
}

impl Pipeline {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        Self::with_detector(config, Box::new(Detector::new(config.detector.clone())))
    }

    /// 使用自定义检测器
    pub fn with_detector(config: &ProcessorConfig, detector: Box<dyn CandidateDetector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector,
            tracker: Tracker::new(config.tracker.clone()),
            aggregator: StatsAggregator::new(),
        })
    }

    /// 用当前窗口跑一个周期. `now_us` 为传感器时间, `now` 为单调时钟
    pub fn run_cycle(&mut self, events: &[Event], now_us: u64, now: Instant) -> Result<CycleOutput> {
        let t_detect = Instant::now();
        let candidates = self.detector.detect(events)?;
        let detect_ms = t_detect.elapsed().as_secs_f64() * 1000.0;

        let t_track = Instant::now();
        let objects = self.tracker.update(&candidates, events, now_us).to_vec();
        let track_ms = t_track.elapsed().as_secs_f64() * 1000.0;

        let processing_fps = self.aggregator.record_cycle(now);

        Ok(CycleOutput {
            candidates,
            objects,
            processing_fps,
            detect_ms,
            track_ms,
        })
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn cycle_count(&self) -> u64 {
        self.aggregator.cycle_count()
    }
}

/// 周期时刻: 事件时间前进时跟随最新事件时间戳, 没有新事件时按墙上时钟外推
#[derive(Debug, Default)]
struct CycleClock {
    now_us: u64,
    last_sensor_us: Option<u64>,
    last_wall: Option<Instant>,
}

impl CycleClock {
    fn advance(&mut self, max_timestamp_us: Option<u64>, wall: Instant) -> u64 {
        let wall_elapsed_us = self
            .last_wall
            .map(|last| wall.saturating_duration_since(last).as_micros() as u64)
            .unwrap_or(0);

        let candidate = match max_timestamp_us {
            Some(ts) if Some(ts) != self.last_sensor_us => ts,
            _ => self.now_us + wall_elapsed_us,
        };
        self.now_us = self.now_us.max(candidate);
        self.last_sensor_us = max_timestamp_us;
        self.last_wall = Some(wall);
        self.now_us
    }
}

/// 处理线程独占的状态, 线程退出时交还给 `Processor`
struct LoopState {
    pipeline: Pipeline,
    clock: CycleClock,
    dropped_total: u64,
}

/// 线程以任何方式退出时清除运行标志
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 状态: 相机线程、处理线程与读取方共享
struct Shared {
    config: ProcessorConfig,
    running: AtomicBool,
    queue: EventQueue,
    buffer: RwLock<EventBuffer>,
    frames: FrameCache,
    stats: Mutex<StatsSnapshot>,
    notifier: Notifier,
    /// 线程运行时被取走, 退出时放回
    loop_state: Mutex<Option<LoopState>>,
}

pub struct Processor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    /// 配置非法时直接失败
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let detector = Box::new(Detector::new(config.detector.clone()));
        Self::with_detector(config, detector)
    }

    /// 使用自定义检测器
    pub fn with_detector(config: ProcessorConfig, detector: Box<dyn CandidateDetector>) -> Result<Self> {
        let pipeline = Pipeline::with_detector(&config, detector)?;
        let state = LoopState {
            pipeline,
            clock: CycleClock::default(),
            dropped_total: 0,
        };
        let shared = Shared {
            running: AtomicBool::new(false),
            queue: EventQueue::new(config.queue.max_queue_len),
            buffer: RwLock::new(EventBuffer::new(config.time_window_us)),
            frames: FrameCache::new(Duration::from_micros(config.stale_after_us)),
            stats: Mutex::new(StatsSnapshot::default()),
            notifier: Notifier::new(config.queue.notify_capacity),
            loop_state: Mutex::new(Some(state)),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.shared.config
    }

    /// 启动处理线程. 已在运行时什么也不做
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        // 上一次 stop 之后残留的线程句柄
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        if self.shared.loop_state.lock().is_none() {
            self.shared.running.store(false, Ordering::Release);
            return Err(PipelineError::Thread(
                "tracker state was lost when the processing thread panicked".to_string(),
            ));
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("dvs-processor".to_string())
            .spawn(move || {
                let Some(state) = shared.loop_state.lock().take() else {
                    return;
                };
                let state = run_loop(&shared, state);
                *shared.loop_state.lock() = Some(state);
            })
            .map_err(|e| {
                self.shared.running.store(false, Ordering::Release);
                PipelineError::Thread(format!("failed to spawn processing thread: {}", e))
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// 停止并等待处理线程退出. 正在进行的周期会先完成
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.shared.running.store(false, Ordering::Release);
        self.shared.queue.wake_all();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                self.shared.notifier.error("processing thread panicked, tracker state lost");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> Receiver<StatusMessage> {
        self.shared.notifier.subscribe()
    }

    /// 当前事件窗口的拷贝
    pub fn buffer_snapshot(&self) -> Vec<Event> {
        self.shared.buffer.read().snapshot()
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.shared.frames.latest()
    }

    /// 可直接显示的图像: 最新帧 + 窗口事件 + 目标框
    pub fn rendered_frame(&self) -> RgbaImage {
        let frame = self.latest_frame();
        let events = self.buffer_snapshot();
        let objects = self.objects();
        let d = &self.shared.config.detector;
        renderer::render(
            frame.as_ref(),
            &events,
            &objects,
            d.sensor_width as u32,
            d.sensor_height as u32,
        )
    }

    /// 最近一个完成周期的统计, frame_fps 取当前值
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.shared.stats.lock().clone();
        snapshot.frame_fps = self.shared.frames.fps();
        snapshot
    }

    pub fn objects(&self) -> Vec<TrackedObject> {
        self.shared.stats.lock().objects.clone()
    }

    pub fn processing_fps(&self) -> f32 {
        self.shared.stats.lock().processing_fps
    }

    pub fn frame_fps(&self) -> f32 {
        self.shared.frames.fps()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }
}

impl EventReceiver for Processor {
    fn on_event(&self, event: Event) {
        self.shared.queue.push(event);
    }

    fn on_events(&self, events: &[Event]) {
        self.shared.queue.push_batch(events);
    }
}

impl FrameReceiver for Processor {
    fn on_frame(&self, frame: Frame) {
        self.shared.frames.publish(frame);
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// 处理线程主循环. 返回状态供下一次 start 继续使用
fn run_loop(shared: &Shared, mut state: LoopState) -> LoopState {
    let _running = RunningGuard(&shared.running);
    let config = &shared.config;
    let interval = Duration::from_micros(config.update_stats_interval_us);
    let timeout = Duration::from_millis(config.queue.wait_timeout_ms);

    shared
        .notifier
        .info(format!("处理线程启动 ({})", config.summary()));

    let mut last_cycle = Instant::now();

    while shared.running.load(Ordering::Acquire) {
        // 不越过下一个周期的时刻
        let until_cycle = interval.saturating_sub(last_cycle.elapsed());
        let drained = shared.queue.wait_drain(timeout.min(until_cycle), &shared.running);
        if !drained.is_empty() {
            shared.buffer.write().extend(drained);
        }

        if last_cycle.elapsed() < interval {
            continue;
        }
        let now = Instant::now();
        last_cycle = now;

        let dropped = shared.queue.take_dropped();
        if dropped > 0 {
            state.dropped_total += dropped;
            shared.notifier.warning(format!(
                "输入队列已满 (容量 {}), 丢弃最旧事件 {} 个",
                shared.queue.capacity(),
                dropped
            ));
        }

        // 窗口随周期时钟滑动, 没有新事件时旧事件也会过期
        let (events, now_us) = {
            let mut buffer = shared.buffer.write();
            let now_us = state.clock.advance(buffer.max_timestamp_us(), now);
            buffer.evict_before(now_us.saturating_sub(config.time_window_us));
            (buffer.snapshot(), now_us)
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| state.pipeline.run_cycle(&events, now_us, now)));
        match result {
            Ok(Ok(output)) => {
                let cycle_count = state.pipeline.cycle_count();
                if cycle_count % SUMMARY_EVERY == 0 {
                    debug!(
                        "周期 {}: {} 事件 | {} 候选 | {} 目标 | {:.1}fps (检测:{:.2}ms | 跟踪:{:.2}ms)",
                        cycle_count,
                        events.len(),
                        output.candidates.len(),
                        output.objects.len(),
                        output.processing_fps,
                        output.detect_ms,
                        output.track_ms
                    );
                }
                let snapshot = StatsSnapshot {
                    processing_fps: output.processing_fps,
                    frame_fps: 0.0,
                    objects: output.objects,
                    cycle_count,
                    timestamp_us: now_us,
                    buffered_events: events.len(),
                    dropped_events: state.dropped_total,
                };
                *shared.stats.lock() = snapshot;
            }
            Ok(Err(e)) => {
                shared.notifier.error(format!("跳过本周期: {}", e));
            }
            Err(payload) => {
                shared
                    .notifier
                    .error(format!("跳过本周期, 处理异常: {}", panic_message(&*payload)));
            }
        }
    }

    shared.notifier.info("处理线程退出");
    state
}

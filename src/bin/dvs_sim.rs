// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 合成事件流演示 (Synthetic DVS demo)
///
/// 线程架构:
/// 1. 相机线程: SyntheticCamera 产生事件包与强度帧, 通过回调接口投递
/// 2. 处理线程: Processor 内部的事件窗口 → 检测 → 跟踪 → 统计
/// 3. 主线程:   每秒打印统计, 结束时可保存渲染图
///
/// 运行: cargo run --bin dvs_sim --release -- --duration 5 --objects 3
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use dvs_tracker::input::{Blob, SyntheticCamera};
use dvs_tracker::{EventReceiver, FrameReceiver, Processor, ProcessorConfig};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 合成事件流演示参数
#[derive(Parser, Debug)]
#[command(author, version, about = "DVS 事件相机目标跟踪 - 合成数据演示", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写入默认配置)
    #[arg(short, long, default_value = "dvs_tracker.json")]
    config: PathBuf,

    /// 运行时长(秒)
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// 运动目标数量
    #[arg(short, long, default_value_t = 2)]
    objects: usize,

    /// 每秒噪声事件数
    #[arg(long, default_value_t = 20_000.0)]
    noise_rate: f64,

    /// 随机种子
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// 结束时保存渲染图到该路径 (PNG)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ProcessorConfig::load(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;

    println!("🚀 DVS 目标跟踪演示启动");
    println!("📦 配置: {}", config.summary());

    let width = config.detector.sensor_width;
    let height = config.detector.sensor_height;

    let processor = Arc::new(Processor::new(config)?);
    let status = processor.subscribe();
    processor.start()?;

    // ========== 相机线程 ==========
    let mut camera = SyntheticCamera::new(width, height, args.seed).with_noise_rate(args.noise_rate);
    for i in 0..args.objects {
        let offset = 20.0 + 40.0 * i as f32;
        let speed = 60.0 + 30.0 * i as f32;
        camera = camera.with_blob(Blob::new(offset, offset * 0.5, speed, speed * 0.4, 12));
    }

    let producing = Arc::new(AtomicBool::new(true));
    let producer = {
        let processor = Arc::clone(&processor);
        let producing = Arc::clone(&producing);
        thread::Builder::new()
            .name("synthetic-camera".to_string())
            .spawn(move || {
                let packet = Duration::from_millis(1);
                while producing.load(Ordering::Acquire) {
                    let (events, frame) = camera.advance(packet.as_micros() as u64);
                    processor.on_events(&events);
                    if let Some(frame) = frame {
                        processor.on_frame(frame);
                    }
                    thread::sleep(packet);
                }
            })?
    };

    // ========== 主线程: 每秒打印统计 ==========
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_secs(1));

        for message in status.try_iter() {
            println!("📣 {}", message);
        }

        let stats = processor.stats();
        println!(
            "📊 处理: {:.1}fps | 帧: {:.1}fps | 窗口事件: {} | 目标: {} | 丢弃: {}",
            stats.processing_fps,
            stats.frame_fps,
            stats.buffered_events,
            stats.objects.len(),
            stats.dropped_events
        );
        for object in &stats.objects {
            println!(
                "   🎯 #{} 中心({:.1}, {:.1}) 速度({:.1}, {:.1}) {:.1}px/s 存活:{}ms 事件:{} 未更新:{}us",
                object.id,
                object.center.x,
                object.center.y,
                object.velocity.x,
                object.velocity.y,
                object.speed(),
                object.age_us(stats.timestamp_us) / 1000,
                object.event_count,
                object.time_since_last_update_us
            );
        }
    }

    producing.store(false, Ordering::Release);
    if producer.join().is_err() {
        eprintln!("❌ 相机线程异常退出");
    }

    if let Some(path) = &args.output {
        processor
            .rendered_frame()
            .save(path)
            .with_context(|| format!("保存渲染图失败: {}", path.display()))?;
        println!("💾 渲染图已保存到 {}", path.display());
    }

    processor.stop();
    for message in status.try_iter() {
        println!("📣 {}", message);
    }
    println!("✅ 演示结束");
    Ok(())
}

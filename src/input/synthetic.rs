// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 合成事件相机 - 用于测试与演示, 无需硬件
//! Synthetic event camera: moving square blobs plus uniform noise

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{Event, Frame};

/// 匀速运动的方形目标
#[derive(Clone, Debug)]
pub struct Blob {
    pub x: f32,  // 左上角 x (像素)
    pub y: f32,  // 左上角 y (像素)
    pub vx: f32, // 像素/秒
    pub vy: f32, // 像素/秒
    pub size: u16,
}

impl Blob {
    pub fn new(x: f32, y: f32, vx: f32, vy: f32, size: u16) -> Self {
        Self { x, y, vx, vy, size }
    }

    fn step(&mut self, dt_s: f32, width: u16, height: u16) {
        self.x += self.vx * dt_s;
        self.y += self.vy * dt_s;

        // 碰到边界反弹
        let max_x = width.saturating_sub(self.size) as f32;
        let max_y = height.saturating_sub(self.size) as f32;
        if self.x < 0.0 || self.x > max_x {
            self.vx = -self.vx;
            self.x = self.x.clamp(0.0, max_x);
        }
        if self.y < 0.0 || self.y > max_y {
            self.vy = -self.vy;
            self.y = self.y.clamp(0.0, max_y);
        }
    }
}

pub struct SyntheticCamera {
    width: u16,
    height: u16,
    blobs: Vec<Blob>,
    events_per_blob_per_sec: f64,
    noise_per_sec: f64,
    frame_interval_us: u64,
    next_frame_us: u64,
    now_us: u64,
    rng: StdRng,
}

impl SyntheticCamera {
    pub fn new(width: u16, height: u16, seed: u64) -> Self {
        Self {
            width,
            height,
            blobs: Vec::new(),
            events_per_blob_per_sec: 200_000.0,
            noise_per_sec: 0.0,
            frame_interval_us: 40_000,
            next_frame_us: 0,
            now_us: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_blob(mut self, blob: Blob) -> Self {
        self.blobs.push(blob);
        self
    }

    pub fn with_event_rate(mut self, events_per_blob_per_sec: f64) -> Self {
        self.events_per_blob_per_sec = events_per_blob_per_sec.max(0.0);
        self
    }

    pub fn with_noise_rate(mut self, noise_per_sec: f64) -> Self {
        self.noise_per_sec = noise_per_sec.max(0.0);
        self
    }

    pub fn with_frame_interval(mut self, frame_interval_us: u64) -> Self {
        self.frame_interval_us = frame_interval_us.max(1);
        self
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// 推进 `dt_us` 微秒, 返回该时段内的事件(按时间排序)以及可能到期的帧
    pub fn advance(&mut self, dt_us: u64) -> (Vec<Event>, Option<Frame>) {
        let start = self.now_us;
        let dt_us = dt_us.max(1);
        let dt_s = dt_us as f64 / 1e6;
        let mut events = Vec::new();

        let per_blob = (self.events_per_blob_per_sec * dt_s).round() as usize;
        for blob in &self.blobs {
            let size = blob.size.max(1) as f32;
            for _ in 0..per_blob {
                let x = blob.x + self.rng.gen_range(0.0..size);
                let y = blob.y + self.rng.gen_range(0.0..size);
                if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                    continue;
                }
                events.push(Event::new(
                    start + self.rng.gen_range(0..dt_us),
                    x as u16,
                    y as u16,
                    self.rng.gen_bool(0.5),
                ));
            }
        }

        let noise = (self.noise_per_sec * dt_s).round() as usize;
        for _ in 0..noise {
            events.push(Event::new(
                start + self.rng.gen_range(0..dt_us),
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
                self.rng.gen_bool(0.5),
            ));
        }

        events.sort_by_key(|e| e.timestamp_us);

        let (width, height) = (self.width, self.height);
        for blob in &mut self.blobs {
            blob.step(dt_s as f32, width, height);
        }
        self.now_us = start + dt_us;

        let frame = if self.now_us >= self.next_frame_us {
            self.next_frame_us = self.now_us + self.frame_interval_us;
            Some(self.render_frame())
        } else {
            None
        };

        (events, frame)
    }

    /// 灰色背景上的亮方块
    fn render_frame(&self) -> Frame {
        let mut image = GrayImage::from_pixel(self.width as u32, self.height as u32, Luma([40]));
        for blob in &self.blobs {
            let x0 = blob.x.max(0.0) as u32;
            let y0 = blob.y.max(0.0) as u32;
            let x1 = (x0 + blob.size as u32).min(self.width as u32);
            let y1 = (y0 + blob.size as u32).min(self.height as u32);
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, Luma([220]));
                }
            }
        }
        Frame::new(image, self.now_us)
    }
}

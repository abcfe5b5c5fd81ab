// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测器 (Detector)
//! 职责: 窗口内事件 → 密度图 → 连通区域 → 候选框
//!
//! Stateless: every call is a pure function of the events it is given.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::Array2;
use tracing::trace;

use super::types::BBox;
use crate::config::DetectorConfig;
use crate::error::{PipelineError, Result};
use crate::input::Event;

/// 连通区域的外接矩形 (格坐标, 闭区间)
#[derive(Clone, Copy)]
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    cells: u32,
}

impl Region {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            cells: 1,
        }
    }

    fn extend(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.cells += 1;
    }
}

/// 候选框检测接口
///
/// 处理流水线只通过这个接口调用检测器, 与具体算法解耦
pub trait CandidateDetector: Send {
    /// 窗口内事件 → 候选框. 出错时本周期被跳过
    fn detect(&mut self, events: &[Event]) -> Result<Vec<BBox>>;
}

/// 密度图 + 连通区域检测器
pub struct Detector {
    config: DetectorConfig,
    grid_width: u32,
    grid_height: u32,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        let bin = config.bin_size.max(1) as u32;
        let grid_width = (config.sensor_width as u32).div_ceil(bin);
        let grid_height = (config.sensor_height as u32).div_ceil(bin);
        Self {
            config,
            grid_width,
            grid_height,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 事件密度图, shape = (grid_height, grid_width). 超出传感器范围的事件忽略
    pub fn density_map(&self, events: &[Event]) -> Array2<u32> {
        let bin = self.config.bin_size.max(1);
        let mut density = Array2::<u32>::zeros((self.grid_height as usize, self.grid_width as usize));
        for e in events {
            if e.x >= self.config.sensor_width || e.y >= self.config.sensor_height {
                continue;
            }
            density[[(e.y / bin) as usize, (e.x / bin) as usize]] += 1;
        }
        density
    }

    /// 检测候选区域, 按 (y1, x1) 排序
    pub fn detect(&self, events: &[Event]) -> Result<Vec<BBox>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let density = self.density_map(events);
        let min_density = self.config.min_density;

        // ndarray 默认行优先, 与 GrayImage 的像素顺序一致
        let raw: Vec<u8> = density
            .iter()
            .map(|&count| if count >= min_density { 255 } else { 0 })
            .collect();
        if raw.iter().all(|&v| v == 0) {
            return Ok(Vec::new());
        }

        let mask = GrayImage::from_raw(self.grid_width, self.grid_height, raw).ok_or_else(|| {
            PipelineError::Detection(format!(
                "density mask does not fit {}x{}",
                self.grid_width, self.grid_height
            ))
        })?;

        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        let mut regions: Vec<Option<Region>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if regions.len() < label {
                regions.resize(label, None);
            }
            match &mut regions[label - 1] {
                Some(region) => region.extend(x, y),
                slot => *slot = Some(Region::new(x, y)),
            }
        }

        let bin = self.config.bin_size.max(1) as u32;
        let cell_area = bin * bin;
        let max_x = self.config.sensor_width as u32;
        let max_y = self.config.sensor_height as u32;

        let mut boxes: Vec<BBox> = regions
            .into_iter()
            .flatten()
            .filter(|r| r.cells * cell_area >= self.config.min_area)
            .map(|r| {
                BBox::new(
                    (r.min_x * bin) as f32,
                    (r.min_y * bin) as f32,
                    ((r.max_x + 1) * bin).min(max_x) as f32,
                    ((r.max_y + 1) * bin).min(max_y) as f32,
                )
            })
            .collect();

        boxes.sort_by(|a, b| a.y1.total_cmp(&b.y1).then(a.x1.total_cmp(&b.x1)));
        trace!("检测: {} 个事件 → {} 个候选框", events.len(), boxes.len());
        Ok(boxes)
    }
}

impl CandidateDetector for Detector {
    fn detect(&mut self, events: &[Event]) -> Result<Vec<BBox>> {
        Detector::detect(&*self, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(min_area: u32) -> Detector {
        Detector::new(DetectorConfig {
            sensor_width: 64,
            sensor_height: 48,
            bin_size: 1,
            min_density: 1,
            min_area,
        })
    }

    /// 在 [x0, x0+w) × [y0, y0+h) 内每个像素放一个事件
    fn square(x0: u16, y0: u16, w: u16, h: u16) -> Vec<Event> {
        let mut events = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                events.push(Event::new(events.len() as u64, x, y, true));
            }
        }
        events
    }

    #[test]
    fn test_empty_input_yields_no_candidates() {
        assert!(detector(4).detect(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_single_cluster() {
        let boxes = detector(4).detect(&square(10, 12, 5, 4)).unwrap();
        assert_eq!(boxes, vec![BBox::new(10.0, 12.0, 15.0, 16.0)]);
    }

    #[test]
    fn test_two_separate_clusters() {
        let mut events = square(2, 2, 3, 3);
        events.extend(square(30, 20, 4, 4));
        let boxes = detector(4).detect(&events).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0], BBox::new(2.0, 2.0, 5.0, 5.0));
        assert_eq!(boxes[1], BBox::new(30.0, 20.0, 34.0, 24.0));
    }

    #[test]
    fn test_isolated_noise_filtered_by_area() {
        let mut events = square(10, 10, 4, 4);
        events.push(Event::new(0, 40, 40, false));
        events.push(Event::new(1, 50, 5, true));
        let boxes = detector(4).detect(&events).unwrap();
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn test_below_density_yields_nothing() {
        let det = Detector::new(DetectorConfig {
            sensor_width: 64,
            sensor_height: 48,
            bin_size: 1,
            min_density: 2,
            min_area: 1,
        });
        assert!(det.detect(&square(0, 0, 8, 8)).unwrap().is_empty());
    }

    #[test]
    fn test_binning_and_out_of_range_events() {
        let det = Detector::new(DetectorConfig {
            sensor_width: 64,
            sensor_height: 48,
            bin_size: 4,
            min_density: 1,
            min_area: 16,
        });
        let mut events = square(9, 9, 2, 2);
        events.push(Event::new(0, 500, 500, true));

        let density = det.density_map(&events);
        assert_eq!(density.dim(), (12, 16));
        assert_eq!(density.sum(), 4);

        let boxes = det.detect(&events).unwrap();
        assert_eq!(boxes, vec![BBox::new(8.0, 8.0, 12.0, 12.0)]);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let events: Vec<Event> = (0..6).map(|i| Event::new(i, 5 + i as u16, 5 + i as u16, true)).collect();
        let boxes = detector(6).detect(&events).unwrap();
        assert_eq!(boxes, vec![BBox::new(5.0, 5.0, 11.0, 11.0)]);
    }
}

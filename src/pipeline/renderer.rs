// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 渲染: 强度帧 + 事件叠加 + 目标框
//! Renders the displayable image handed to a presentation layer

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detection::TrackedObject;
use crate::input::{Event, Frame};

const ON_COLOR: Rgba<u8> = Rgba([64, 255, 64, 255]);
const OFF_COLOR: Rgba<u8> = Rgba([255, 64, 64, 255]);

/// 有帧时以帧为底图, 否则为传感器尺寸的黑色画布
pub fn render(
    frame: Option<&Frame>,
    events: &[Event],
    objects: &[TrackedObject],
    sensor_width: u32,
    sensor_height: u32,
) -> RgbaImage {
    let mut canvas = match frame {
        Some(frame) => DynamicImage::ImageLuma8((*frame.image).clone()).to_rgba8(),
        None => RgbaImage::from_pixel(sensor_width.max(1), sensor_height.max(1), Rgba([0, 0, 0, 255])),
    };
    let (width, height) = canvas.dimensions();

    for e in events {
        let (x, y) = (e.x as u32, e.y as u32);
        if x < width && y < height {
            canvas.put_pixel(x, y, if e.polarity { ON_COLOR } else { OFF_COLOR });
        }
    }

    for object in objects {
        let w = object.bbox.width().round() as u32;
        let h = object.bbox.height().round() as u32;
        if w == 0 || h == 0 {
            continue;
        }
        let (r, g, b) = id_to_color(object.id);
        let rect = Rect::at(object.bbox.x1.round() as i32, object.bbox.y1.round() as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut canvas, rect, Rgba([r, g, b, 255]));
    }

    canvas
}

/// 根据ID生成不同颜色
pub fn id_to_color(id: u32) -> (u8, u8, u8) {
    let hue = (id as f32 * 137.508) % 360.0; // 黄金角度采样
    hsv_to_rgb(hue, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::detection::{BBox, Tracker};
    use image::{GrayImage, Luma};

    #[test]
    fn test_blank_canvas_with_events() {
        let events = [Event::new(0, 1, 2, true), Event::new(1, 3, 0, false), Event::new(2, 99, 99, true)];
        let img = render(None, &events, &[], 8, 4);
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(*img.get_pixel(1, 2), ON_COLOR);
        assert_eq!(*img.get_pixel(3, 0), OFF_COLOR);
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_frame_background_and_object_box() {
        let frame = Frame::new(GrayImage::from_pixel(20, 20, Luma([100])), 0);
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&[BBox::new(5.0, 5.0, 10.0, 10.0)], &[], 0);

        let img = render(Some(&frame), &[], tracker.objects(), 346, 260);
        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(*img.get_pixel(0, 0), Rgba([100, 100, 100, 255]));

        let (r, g, b) = id_to_color(1);
        assert_eq!(*img.get_pixel(5, 5), Rgba([r, g, b, 255]));
        assert_eq!(*img.get_pixel(7, 7), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn test_colors_differ_between_ids() {
        assert_ne!(id_to_color(1), id_to_color(2));
    }
}

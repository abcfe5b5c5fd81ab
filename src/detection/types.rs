// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测与跟踪共用的几何类型
//! Geometry shared by the detector and the tracker

use std::ops::{Add, Div, Mul, Sub};

/// 二维点 / 二维向量 (像素 或 像素/秒)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const ZERO: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_to(&self, other: &Point2) -> f32 {
        (*self - *other).norm()
    }

    /// 单位方向向量, 长度接近0时返回零向量
    pub fn normalized(&self) -> Point2 {
        let n = self.norm();
        if n < 1e-6 {
            Point2::ZERO
        } else {
            *self / n
        }
    }
}

impl Add for Point2 {
    type Output = Point2;
    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;
    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point2 {
    type Output = Point2;
    fn mul(self, rhs: f32) -> Point2 {
        Point2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point2 {
    type Output = Point2;
    fn div(self, rhs: f32) -> Point2 {
        Point2::new(self.x / rhs, self.y / rhs)
    }
}

/// 轴对齐矩形, 半开区间 [x1, x2) × [y1, y2)
///
/// A pixel `(x, y)` belongs to the box when `x1 <= x < x2` and `y1 <= y < y2`,
/// so two boxes sharing an edge never both contain a pixel on it.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point2 {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// 四周外扩 `margin` 像素
    pub fn inflate(&self, margin: f32) -> BBox {
        BBox::new(
            self.x1 - margin,
            self.y1 - margin,
            self.x2 + margin,
            self.y2 + margin,
        )
    }

    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        (x2 - x1) * (y2 - y1)
    }

    /// 计算两个边界框的IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_contains() {
        let left = BBox::new(0.0, 0.0, 10.0, 10.0);
        let right = BBox::new(10.0, 0.0, 20.0, 10.0);

        assert!(left.contains(0.0, 0.0));
        assert!(left.contains(9.0, 9.0));
        assert!(!left.contains(10.0, 5.0));
        assert!(right.contains(10.0, 5.0));
        // 共享边上的像素只属于一个框
        for y in 0..10 {
            let owners = [left, right]
                .iter()
                .filter(|b| b.contains(10.0, y as f32))
                .count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn test_iou() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        // 交集 50, 并集 150
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);

        let c = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.iou(&c), 0.0);
        assert_eq!(BBox::default().iou(&BBox::default()), 0.0);
    }

    #[test]
    fn test_inflate_and_center() {
        let b = BBox::from_xywh(10.0, 20.0, 10.0, 4.0);
        assert_eq!(b.center(), Point2::new(15.0, 22.0));
        let r = b.inflate(2.0);
        assert_eq!(r, BBox::new(8.0, 18.0, 22.0, 26.0));
        assert_eq!(r.center(), b.center());
    }

    #[test]
    fn test_point_ops() {
        let p = Point2::new(3.0, 4.0);
        assert_eq!(p.norm(), 5.0);
        assert_eq!(p.normalized(), Point2::new(0.6, 0.8));
        assert_eq!(Point2::ZERO.normalized(), Point2::ZERO);
        assert_eq!((p - Point2::new(1.0, 1.0)) * 2.0, Point2::new(4.0, 6.0));
    }
}

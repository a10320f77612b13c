// 该文件是 HiMa 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::BoundingBox;

/// 归一化坐标的网格大小
pub const NORMALIZED_GRID: f64 = 1000.0;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: (i32, i32) = (8, 6);
const LINE_WIDTH: i32 = 4;

/// 调色板：red, green, blue, yellow, orange, pink, purple, cyan, lime, magenta, violet, gold, silver
pub const PALETTE: [[u8; 3]; 13] = [
  [255, 0, 0],
  [0, 128, 0],
  [0, 0, 255],
  [255, 255, 0],
  [255, 165, 0],
  [255, 192, 203],
  [128, 0, 128],
  [0, 255, 255],
  [0, 255, 0],
  [255, 0, 255],
  [238, 130, 238],
  [255, 215, 0],
  [192, 192, 192],
];

// 常见系统字体位置
const FONT_CANDIDATES: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  FontIoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(PathBuf),
}

/// 像素坐标矩形，两端均包含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl PixelRect {
  pub fn width(&self) -> i32 {
    self.x2.saturating_sub(self.x1)
  }

  pub fn height(&self) -> i32 {
    self.y2.saturating_sub(self.y1)
  }

  /// 标签文本的锚点
  pub fn label_origin(&self) -> (i32, i32) {
    (
      self.x1.saturating_add(LABEL_OFFSET.0),
      self.y1.saturating_add(LABEL_OFFSET.1),
    )
  }
}

fn to_pixel(coord: i32, dimension: u32) -> i32 {
  (coord as f64 / NORMALIZED_GRID * dimension as f64) as i32
}

/// 将 [y1, x1, y2, x2] 归一化坐标映射为像素矩形
///
/// 不检查取值范围；结果总满足 `x1 <= x2`、`y1 <= y2`。
pub fn map_box(bbox: &BoundingBox, width: u32, height: u32) -> PixelRect {
  let [y1, x1, y2, x2] = bbox.normalized_coords;
  let (x1, x2) = (to_pixel(x1, width), to_pixel(x2, width));
  let (y1, y2) = (to_pixel(y1, height), to_pixel(y2, height));

  PixelRect {
    x1: x1.min(x2),
    y1: y1.min(y2),
    x2: x1.max(x2),
    y2: y1.max(y2),
  }
}

/// 按序号循环取色
pub fn palette_color(index: usize) -> Rgb<u8> {
  Rgb(PALETTE[index % PALETTE.len()])
}

pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  line_width: i32,
}

impl Default for Draw {
  fn default() -> Self {
    for candidate in FONT_CANDIDATES {
      let path = Path::new(candidate);
      if !path.exists() {
        continue;
      }
      match Self::with_font_file(path) {
        Ok(draw) => return draw,
        Err(e) => warn!("无法加载字体 {}: {}", candidate, e),
      }
    }

    warn!("未找到可用字体，标签文本将不会绘制");
    Self::without_font()
  }
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    info!("加载标签字体: {}", path.display());

    Ok(Self {
      font: Some(font),
      ..Self::without_font()
    })
  }

  /// 只画边框，不画标签
  pub fn without_font() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      line_width: LINE_WIDTH,
    }
  }

  fn draw_outline(&self, image: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>) {
    // 画布外的边只需保持在画布外，收拢到留有线宽余量的范围内即可
    let margin = self.line_width + 1;
    let (canvas_w, canvas_h) = (image.width() as i32, image.height() as i32);
    let rect = PixelRect {
      x1: rect.x1.clamp(-margin, canvas_w + margin),
      y1: rect.y1.clamp(-margin, canvas_h + margin),
      x2: rect.x2.clamp(-margin, canvas_w + margin),
      y2: rect.y2.clamp(-margin, canvas_h + margin),
    };

    let full_width = rect.width() + 1;
    let full_height = rect.height() + 1;

    // 向内逐层加粗
    for inset in 0..self.line_width {
      let width = full_width - 2 * inset;
      let height = full_height - 2 * inset;
      if width <= 0 || height <= 0 {
        break;
      }
      let outline = Rect::at(rect.x1 + inset, rect.y1 + inset).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, outline, color);
    }
  }

  /// 按数组顺序绘制所有检测框，后画的覆盖先画的
  pub fn draw_boxes(&self, image: &mut RgbImage, boxes: &[BoundingBox]) {
    let (width, height) = image.dimensions();

    for (index, bbox) in boxes.iter().enumerate() {
      let color = palette_color(index);
      let rect = map_box(bbox, width, height);
      debug!("绘制 {:?} -> {:?}", bbox.label, rect);

      self.draw_outline(image, &rect, color);

      if let Some(font) = &self.font
        && !bbox.label.is_empty()
      {
        let (x, y) = rect.label_origin();
        draw_text_mut(image, color, x, y, self.font_scale, font, &bbox.label);
      }
    }
  }
}

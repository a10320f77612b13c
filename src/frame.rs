// 该文件是 HiMa 项目的一部分。
// src/frame.rs - 检测用工作帧
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

use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

/// 送入模型前统一缩放到的宽度
pub const WORKING_WIDTH: u32 = 1024;

const JPEG_QUALITY: u8 = 75;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("invalid image size: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("JPEG encode error: {0}")]
  EncodeError(#[from] image::ImageError),
}

/// 固定宽度、保持宽高比的工作帧
///
/// 模型看到的坐标系、最终绘制的画布都是这一帧。
#[derive(Debug, Clone)]
pub struct WorkingFrame {
  image: RgbImage,
}

impl WorkingFrame {
  pub fn from_image(image: &RgbImage) -> Result<Self, FrameError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyImage(width, height));
    }

    let target_height = working_height(width, height);
    debug!(
      "缩放输入图像: {}x{} -> {}x{}",
      width, height, WORKING_WIDTH, target_height
    );
    let image = image::imageops::resize(image, WORKING_WIDTH, target_height, FilterType::CatmullRom);

    Ok(Self { image })
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  pub fn to_jpeg(&self) -> Result<Vec<u8>, FrameError> {
    let mut buffer = Vec::new();
    self
      .image
      .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))?;
    Ok(buffer)
  }
}

fn working_height(width: u32, height: u32) -> u32 {
  let scaled = (WORKING_WIDTH as u64 * height as u64) / width as u64;
  scaled.clamp(1, u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn resize_keeps_aspect_ratio() {
    let image = RgbImage::from_pixel(2000, 1000, Rgb([10, 20, 30]));
    let frame = WorkingFrame::from_image(&image).unwrap();
    assert_eq!((frame.width(), frame.height()), (1024, 512));
  }

  #[test]
  fn very_wide_image_keeps_one_row() {
    let image = RgbImage::new(5000, 1);
    let frame = WorkingFrame::from_image(&image).unwrap();
    assert_eq!((frame.width(), frame.height()), (1024, 1));
  }

  #[test]
  fn small_image_is_upscaled() {
    let image = RgbImage::new(512, 300);
    let frame = WorkingFrame::from_image(&image).unwrap();
    assert_eq!((frame.width(), frame.height()), (1024, 600));
  }

  #[test]
  fn empty_image_is_rejected() {
    let image = RgbImage::new(0, 10);
    assert!(matches!(
      WorkingFrame::from_image(&image),
      Err(FrameError::EmptyImage(0, 10))
    ));
  }

  #[test]
  fn jpeg_encoding_has_soi_marker() {
    let image = RgbImage::from_pixel(64, 32, Rgb([200, 100, 50]));
    let frame = WorkingFrame::from_image(&image).unwrap();
    let jpeg = frame.to_jpeg().unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
  }
}

// 该文件是 HiMa 项目的一部分。
// src/pipeline/detection.rs - 目标检测与标注
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

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::{FrameError, WorkingFrame},
  model::{
    BoundingBox, DetectionRequest, DetectionResult, GenerateRequest, GenerativeModel,
    HarmBlockThreshold, HarmCategory, decode_boxes,
  },
  output::Draw,
  pipeline::UpstreamError,
};

pub const MAX_DETECTIONS: usize = 25;

pub const BOUNDING_BOX_SYSTEM_INSTRUCTION: &str = "\
Return bounding boxes as a JSON array with labels in the context of maternity and baby. \
Each entry has a \"label\" and a \"box_2d\" of four integers [y1, x1, y2, x2] normalized to 0-1000. \
Never return masks or code fencing. Limit to 25 objects.
If an object is present multiple times, name them according to their unique characteristic \
(colors, size, position, unique characteristics, usage etc..).";

const DETECTION_TEMPERATURE: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("image processing failed: {0}")]
  FrameError(#[from] FrameError),
  #[error("upstream call failed: {0}")]
  UpstreamError(UpstreamError),
  #[error("No bounding boxes returned.")]
  NoDetections,
}

/// 检测结果；失败时退化为未标注的工作帧加诊断信息
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
  Annotated(DetectionResult),
  Degraded { image: RgbImage, diagnostic: String },
}

impl DetectionOutcome {
  pub fn image(&self) -> &RgbImage {
    match self {
      DetectionOutcome::Annotated(result) => &result.annotated_image,
      DetectionOutcome::Degraded { image, .. } => image,
    }
  }

  /// 成功时为模型原始输出，失败时为错误描述；后续对话以此为上下文
  pub fn diagnostic(&self) -> &str {
    match self {
      DetectionOutcome::Annotated(result) => &result.raw_text,
      DetectionOutcome::Degraded { diagnostic, .. } => diagnostic,
    }
  }

  pub fn boxes(&self) -> &[BoundingBox] {
    match self {
      DetectionOutcome::Annotated(result) => &result.boxes,
      DetectionOutcome::Degraded { .. } => &[],
    }
  }

  pub fn is_degraded(&self) -> bool {
    matches!(self, DetectionOutcome::Degraded { .. })
  }

  pub fn into_image(self) -> RgbImage {
    match self {
      DetectionOutcome::Annotated(result) => result.annotated_image,
      DetectionOutcome::Degraded { image, .. } => image,
    }
  }
}

pub struct DetectionPipeline<'a, M> {
  model: &'a M,
  draw: &'a Draw,
}

impl<'a, M: GenerativeModel> DetectionPipeline<'a, M> {
  pub fn new(model: &'a M, draw: &'a Draw) -> Self {
    Self { model, draw }
  }

  pub fn detect(&self, request: DetectionRequest) -> DetectionOutcome {
    let DetectionRequest { image, instruction } = request;

    let frame = match WorkingFrame::from_image(&image) {
      Ok(frame) => frame,
      Err(e) => {
        error!("无法缩放输入图像: {}", e);
        return DetectionOutcome::Degraded {
          image,
          diagnostic: format!("Error: {}", e),
        };
      }
    };

    match self.annotate(&frame, &instruction) {
      Ok(result) => DetectionOutcome::Annotated(result),
      Err(e) => {
        warn!("检测未完成，返回原图: {}", e);
        DetectionOutcome::Degraded {
          image: frame.into_image(),
          diagnostic: format!("Error: {}", e),
        }
      }
    }
  }

  fn annotate(
    &self,
    frame: &WorkingFrame,
    instruction: &str,
  ) -> Result<DetectionResult, DetectionError> {
    let request = GenerateRequest::new()
      .text(instruction)
      .jpeg(frame.to_jpeg()?)
      .system_instruction(BOUNDING_BOX_SYSTEM_INSTRUCTION)
      .temperature(DETECTION_TEMPERATURE)
      .safety(HarmCategory::DangerousContent, HarmBlockThreshold::BlockOnlyHigh);

    info!("开始检测: {}x{}", frame.width(), frame.height());
    let now = Instant::now();
    let response = self
      .model
      .generate(&request)
      .map_err(|e| DetectionError::UpstreamError(Box::new(e)))?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    debug!("模型输出: {}", response.text);

    let mut boxes = match decode_boxes(&response.text) {
      Ok(boxes) => boxes,
      Err(e) => {
        // 无法解析按零检测处理，原始输出仍作为对话上下文
        warn!("检测结果无法解析，按零检测处理: {}", e);
        return Ok(DetectionResult {
          annotated_image: frame.image().clone(),
          raw_text: response.text,
          boxes: Box::default(),
        });
      }
    };
    if boxes.is_empty() {
      return Err(DetectionError::NoDetections);
    }
    if boxes.len() > MAX_DETECTIONS {
      warn!("检测到 {} 个对象，仅绘制前 {} 个", boxes.len(), MAX_DETECTIONS);
      boxes.truncate(MAX_DETECTIONS);
    }
    info!("检测到 {} 个对象", boxes.len());

    let mut annotated_image = frame.image().clone();
    self.draw.draw_boxes(&mut annotated_image, &boxes);

    Ok(DetectionResult {
      annotated_image,
      raw_text: response.text,
      boxes: boxes.into_boxed_slice(),
    })
  }
}

// 该文件是 HiMa 项目的一部分。
// src/model.rs - 生成模型接口与检测数据
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

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 生成模型
///
/// 检测、对话、播客脚本三类调用共用同一个接口，只是请求内容不同。
pub trait GenerativeModel {
  type Error: std::error::Error + Send + Sync + 'static;

  fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
  Text(String),
  InlineData { mime_type: String, data: Vec<u8> },
}

impl Part {
  pub fn jpeg(data: Vec<u8>) -> Self {
    Part::InlineData {
      mime_type: "image/jpeg".to_string(),
      data,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
  #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
  DangerousContent,
  #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
  HateSpeech,
  #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
  Harassment,
  #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
  SexuallyExplicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
  BlockLowAndAbove,
  BlockMediumAndAbove,
  BlockOnlyHigh,
  BlockNone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
  pub category: HarmCategory,
  pub threshold: HarmBlockThreshold,
}

/// 一次生成调用的请求
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
  pub parts: Vec<Part>,
  pub system_instruction: Option<String>,
  pub temperature: Option<f32>,
  pub safety_settings: Vec<SafetySetting>,
  /// 是否启用搜索增强
  pub google_search: bool,
}

impl GenerateRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.parts.push(Part::Text(text.into()));
    self
  }

  pub fn jpeg(mut self, data: Vec<u8>) -> Self {
    self.parts.push(Part::jpeg(data));
    self
  }

  pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
    self.system_instruction = Some(instruction.into());
    self
  }

  pub fn temperature(mut self, temperature: f32) -> Self {
    self.temperature = Some(temperature);
    self
  }

  pub fn safety(mut self, category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
    self.safety_settings.push(SafetySetting {
      category,
      threshold,
    });
    self
  }

  pub fn google_search(mut self, enabled: bool) -> Self {
    self.google_search = enabled;
    self
  }

  /// 请求中所有文本片段，按顺序拼接
  pub fn prompt_text(&self) -> String {
    self
      .parts
      .iter()
      .filter_map(|part| match part {
        Part::Text(text) => Some(text.as_str()),
        Part::InlineData { .. } => None,
      })
      .collect::<Vec<_>>()
      .join("\n")
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
  pub text: String,
  /// 搜索增强时返回的渲染结果（搜索入口 HTML）
  pub search_entry_point: Option<String>,
}

impl GenerateResponse {
  pub fn from_text(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      search_entry_point: None,
    }
  }
}

/// 一次检测提交
#[derive(Debug, Clone)]
pub struct DetectionRequest {
  pub image: RgbImage,
  pub instruction: String,
}

impl DetectionRequest {
  pub fn new(image: RgbImage, instruction: impl Into<String>) -> Self {
    Self {
      image,
      instruction: instruction.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
  #[serde(default)]
  pub label: String,
  #[serde(rename = "box_2d")]
  pub normalized_coords: [i32; 4], // [y1, x1, y2, x2]，0-1000
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
  pub annotated_image: RgbImage,
  /// 模型原始输出，后续对话的唯一上下文
  pub raw_text: String,
  pub boxes: Box<[BoundingBox]>,
}

mod extract;
pub use self::extract::{MalformedPayload, decode_boxes, extract_payload};

#[cfg(feature = "gemini")]
mod gemini;
#[cfg(feature = "gemini")]
pub use self::gemini::{
  DEFAULT_ENDPOINT, DEFAULT_MODEL, GeminiClient, GeminiClientBuilder, GeminiError,
};

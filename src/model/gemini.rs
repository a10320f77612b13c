// 该文件是 HiMa 项目的一部分。
// src/model/gemini.rs - Gemini generateContent 客户端
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

use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::model::{GenerateRequest, GenerateResponse, GenerativeModel, Part, SafetySetting};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Error, Debug)]
pub enum GeminiError {
  #[error("HTTP error: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("service returned status {status}: {body}")]
  StatusError { status: u16, body: String },
  #[error("invalid response body: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("invalid endpoint URL: {0}")]
  UrlError(#[from] url::ParseError),
  #[error("no candidates returned: {0}")]
  NoCandidates(String),
  #[error("missing API key")]
  MissingApiKey,
}

pub struct GeminiClient {
  http: reqwest::blocking::Client,
  url: Url,
  api_key: String,
  model: String,
}

pub struct GeminiClientBuilder {
  api_key: String,
  model: String,
  endpoint: String,
  timeout: Duration,
}

impl GeminiClientBuilder {
  pub fn model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  /// 接口根地址，需以 `/` 结尾
  pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> Result<GeminiClient, GeminiError> {
    if self.api_key.trim().is_empty() {
      return Err(GeminiError::MissingApiKey);
    }

    let url = Url::parse(&self.endpoint)?.join(&format!("models/{}:generateContent", self.model))?;
    info!("Gemini 模型: {} ({})", self.model, url);

    let http = reqwest::blocking::Client::builder()
      .timeout(self.timeout)
      .build()?;

    Ok(GeminiClient {
      http,
      url,
      api_key: self.api_key,
      model: self.model,
    })
  }
}

impl GeminiClient {
  pub fn builder(api_key: impl Into<String>) -> GeminiClientBuilder {
    GeminiClientBuilder {
      api_key: api_key.into(),
      model: DEFAULT_MODEL.to_string(),
      endpoint: DEFAULT_ENDPOINT.to_string(),
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn model(&self) -> &str {
    &self.model
  }
}

impl GenerativeModel for GeminiClient {
  type Error = GeminiError;

  fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, Self::Error> {
    let body = WireRequest::from_request(request);
    debug!(
      "发送生成请求: {} 个片段, 搜索增强: {}",
      request.parts.len(),
      request.google_search
    );

    let now = Instant::now();
    let response = self
      .http
      .post(self.url.clone())
      .header(API_KEY_HEADER, &self.api_key)
      .json(&body)
      .send()?;
    let status = response.status();
    let text = response.text()?;
    info!("生成请求完成，耗时: {:.2?}", now.elapsed());

    if !status.is_success() {
      warn!("Gemini 返回错误状态: {}", status);
      return Err(GeminiError::StatusError {
        status: status.as_u16(),
        body: text,
      });
    }

    parse_response(&text)
  }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
  contents: Vec<WireContent<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<WireContent<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<WireGenerationConfig>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  safety_settings: Vec<SafetySetting>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools: Vec<WireTool>,
}

#[derive(Serialize, Debug)]
struct WireContent<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'static str>,
  parts: Vec<WirePart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WirePart<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  text: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  inline_data: Option<WireInlineData<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireInlineData<'a> {
  mime_type: &'a str,
  data: String,
}

#[derive(Serialize, Debug)]
struct WireGenerationConfig {
  temperature: f32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireTool {
  google_search: WireGoogleSearch,
}

#[derive(Serialize, Debug)]
struct WireGoogleSearch {}

impl<'a> WireRequest<'a> {
  fn from_request(request: &'a GenerateRequest) -> Self {
    let parts = request
      .parts
      .iter()
      .map(|part| match part {
        Part::Text(text) => WirePart {
          text: Some(text.as_str()),
          inline_data: None,
        },
        Part::InlineData { mime_type, data } => WirePart {
          text: None,
          inline_data: Some(WireInlineData {
            mime_type: mime_type.as_str(),
            data: STANDARD.encode(data),
          }),
        },
      })
      .collect();

    let system_instruction = request.system_instruction.as_deref().map(|text| WireContent {
      role: None,
      parts: vec![WirePart {
        text: Some(text),
        inline_data: None,
      }],
    });

    let tools = if request.google_search {
      vec![WireTool {
        google_search: WireGoogleSearch {},
      }]
    } else {
      Vec::new()
    };

    WireRequest {
      contents: vec![WireContent {
        role: Some("user"),
        parts,
      }],
      system_instruction,
      generation_config: request
        .temperature
        .map(|temperature| WireGenerationConfig { temperature }),
      safety_settings: request.safety_settings.clone(),
      tools,
    }
  }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
  #[serde(default)]
  candidates: Vec<WireCandidate>,
  prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
  content: Option<WireResponseContent>,
  grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct WireResponseContent {
  #[serde(default)]
  parts: Vec<WireResponsePart>,
}

#[derive(Deserialize, Debug)]
struct WireResponsePart {
  text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
  search_entry_point: Option<WireSearchEntryPoint>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireSearchEntryPoint {
  rendered_content: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
  block_reason: Option<String>,
}

fn parse_response(body: &str) -> Result<GenerateResponse, GeminiError> {
  let response: WireResponse = serde_json::from_str(body)?;

  let Some(candidate) = response.candidates.into_iter().next() else {
    let reason = response
      .prompt_feedback
      .and_then(|feedback| feedback.block_reason)
      .unwrap_or_else(|| "empty response".to_string());
    return Err(GeminiError::NoCandidates(reason));
  };

  let text = candidate
    .content
    .map(|content| {
      content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<String>()
    })
    .unwrap_or_default();

  let search_entry_point = candidate
    .grounding_metadata
    .and_then(|metadata| metadata.search_entry_point)
    .and_then(|entry| entry.rendered_content);

  Ok(GenerateResponse {
    text,
    search_entry_point,
  })
}

// 该文件是 HiMa 项目的一部分。
// src/pipeline/narration.rs - 播客脚本与语音
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

use std::{io::Write, time::Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  model::{GenerateRequest, GenerativeModel, HarmBlockThreshold, HarmCategory},
  pipeline::UpstreamError,
  speech::{AudioArtifact, AudioNormalizeError, AudioNormalizer, SpeechSynthesizer},
};

pub const PODCAST_SYSTEM_INSTRUCTION: &str = "\
You are MommyBird, host of Nesting with MommyBird, a short and friendly podcast answering questions from new and expecting mothers.
- Output only the podcast script itself, with no preamble such as \"okay, here's the podcast\". Never use stage directions or cues; the text is read aloud verbatim by a text-to-speech engine.
- Start by introducing yourself as MommyBird, the host of the show.
- Each episode is inspired by a question submitted by a listener, which you answer directly with practical tips and relatable advice.
- Speak in a warm, nurturing tone as if you're chatting with a fellow mom over tea, sharing insights that are helpful and easy to apply.
- Use an engaging and conversational style, sprinkling in light humor or personal anecdotes when relevant.
- Conclude each episode with a positive affirmation.
- Keep episodes concise, under 120 seconds.
- Use a casual, friendly flow with natural pauses, avoiding formal language.
- Avoid overly technical language; prioritize practicality over scientific jargon.
- Acknowledge listener emotions and provide comforting responses when addressing concerns or challenges.
- Avoid offering medical diagnoses or replacing professional medical advice; encourage listeners to consult a healthcare provider when necessary.";

const NARRATION_TEMPERATURE: f32 = 0.5;
const DEFAULT_LANGUAGE: &str = "en";

const NARRATION_SAFETY: [HarmCategory; 4] = [
  HarmCategory::DangerousContent,
  HarmCategory::HateSpeech,
  HarmCategory::Harassment,
  HarmCategory::SexuallyExplicit,
];

#[derive(Error, Debug)]
pub enum NarrationError {
  #[error("{0}")]
  InvalidInput(String),
  #[error("script generation failed: {0}")]
  UpstreamError(UpstreamError),
  #[error("speech synthesis failed: {0}")]
  SpeechError(UpstreamError),
  #[error("temporary file error: {0}")]
  StorageError(#[from] std::io::Error),
  #[error("audio export failed: {0}")]
  NormalizeError(#[from] AudioNormalizeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationScript {
  pub text: String,
}

#[derive(Debug)]
pub struct Narration {
  pub script: NarrationScript,
  pub audio: AudioArtifact,
}

/// 自定义话题非空时优先，否则使用检测上下文
pub fn choose_topic<'t>(custom_topic: Option<&'t str>, detection_context: &'t str) -> &'t str {
  match custom_topic {
    Some(topic) if !topic.trim().is_empty() => topic,
    _ => detection_context,
  }
}

pub fn podcast_prompt(topic: &str) -> String {
  format!(
    "Based on the key topic of : {}, create a podcast script as MommyBird for a maternity podcast.",
    topic
  )
}

pub struct NarrationPipeline<'a, M, S> {
  model: &'a M,
  speech: &'a S,
  normalizer: AudioNormalizer,
  language: String,
}

impl<'a, M: GenerativeModel, S: SpeechSynthesizer> NarrationPipeline<'a, M, S> {
  pub fn new(model: &'a M, speech: &'a S) -> Self {
    Self {
      model,
      speech,
      normalizer: AudioNormalizer::new(),
      language: DEFAULT_LANGUAGE.to_string(),
    }
  }

  pub fn with_language(mut self, language: impl Into<String>) -> Self {
    self.language = language.into();
    self
  }

  pub fn narrate(&self, topic: &str) -> Result<Narration, NarrationError> {
    let script = self.script(topic)?;
    let audio = self.synthesize(&script)?;
    Ok(Narration { script, audio })
  }

  pub fn script(&self, topic: &str) -> Result<NarrationScript, NarrationError> {
    if topic.trim().is_empty() {
      return Err(NarrationError::InvalidInput(
        "No topic provided for the podcast script.".to_string(),
      ));
    }

    let mut request = GenerateRequest::new()
      .text(podcast_prompt(topic))
      .system_instruction(PODCAST_SYSTEM_INSTRUCTION)
      .temperature(NARRATION_TEMPERATURE);
    for category in NARRATION_SAFETY {
      request = request.safety(category, HarmBlockThreshold::BlockLowAndAbove);
    }

    let now = Instant::now();
    let response = self
      .model
      .generate(&request)
      .map_err(|e| NarrationError::UpstreamError(Box::new(e)))?;
    info!("播客脚本生成完成，耗时: {:.2?}", now.elapsed());

    Ok(NarrationScript {
      text: response.text.trim().to_string(),
    })
  }

  /// 合成并导出音频；合成前的临时文件在返回时删除
  pub fn synthesize(&self, script: &NarrationScript) -> Result<AudioArtifact, NarrationError> {
    if script.text.trim().is_empty() {
      return Err(NarrationError::InvalidInput(
        "No script provided for audio conversion.".to_string(),
      ));
    }

    let now = Instant::now();
    let synthesized = self
      .speech
      .synthesize(&script.text, &self.language)
      .map_err(|e| NarrationError::SpeechError(Box::new(e)))?;
    info!(
      "语音合成完成: {} 字节, 耗时: {:.2?}",
      synthesized.bytes.len(),
      now.elapsed()
    );

    let mut raw = tempfile::Builder::new()
      .prefix("hima-tts-")
      .suffix(&format!(".{}", synthesized.format.extension()))
      .tempfile()?;
    raw.write_all(&synthesized.bytes)?;
    raw.flush()?;
    debug!("合成音频暂存: {}", raw.path().display());

    let artifact = self.normalizer.export(raw.path(), synthesized.format)?;
    Ok(artifact)
  }
}

// 该文件是 HiMa 项目的一部分。
// src/task.rs - 任务编排
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

use tracing::{info, warn};

use crate::{
  context::ServiceContext,
  model::{DetectionRequest, GenerativeModel},
  output::{Render, SaveAudioFileOutput, SaveImageFileOutput},
  pipeline::{DetectionOutcome, Narration, choose_topic},
  speech::SpeechSynthesizer,
  transcript::Transcript,
};

pub trait Task<I, C>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, context: C) -> Result<Self::Output, Self::Error>;
}

/// 检测一张图像，可选保存标注结果
#[derive(Default)]
pub struct DetectTask {
  output: Option<SaveImageFileOutput>,
}

impl DetectTask {
  pub fn with_output(mut self, output: Option<SaveImageFileOutput>) -> Self {
    self.output = output;
    self
  }
}

impl<M: GenerativeModel, S: SpeechSynthesizer> Task<DetectionRequest, &ServiceContext<M, S>>
  for DetectTask
{
  type Output = DetectionOutcome;
  type Error = anyhow::Error;

  fn run_task(
    self,
    request: DetectionRequest,
    context: &ServiceContext<M, S>,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始检测任务...");
    let now = Instant::now();
    let outcome = context.detection().detect(request);
    if outcome.is_degraded() {
      warn!("检测未成功: {}", outcome.diagnostic());
    } else {
      info!(
        "检测到 {} 个物体，耗时: {:.2?}",
        outcome.boxes().len(),
        now.elapsed()
      );
    }

    if let Some(output) = &self.output {
      output.render_result(&outcome)?;
    }
    Ok(outcome)
  }
}

/// 依次提问，每个问题追加到同一份记录
pub struct AskTask {
  detection_context: String,
  use_search: bool,
  transcript: Transcript,
}

impl AskTask {
  pub fn new(detection_context: impl Into<String>) -> Self {
    Self {
      detection_context: detection_context.into(),
      use_search: false,
      transcript: Transcript::new(),
    }
  }

  pub fn with_search(mut self, use_search: bool) -> Self {
    self.use_search = use_search;
    self
  }

  pub fn with_transcript(mut self, transcript: Transcript) -> Self {
    self.transcript = transcript;
    self
  }
}

impl<Q, M, S> Task<Q, &ServiceContext<M, S>> for AskTask
where
  Q: IntoIterator,
  Q::Item: AsRef<str>,
  M: GenerativeModel,
  S: SpeechSynthesizer,
{
  type Output = Transcript;
  type Error = anyhow::Error;

  fn run_task(self, questions: Q, context: &ServiceContext<M, S>) -> Result<Self::Output, Self::Error> {
    let conversation = context.conversation();
    let mut transcript = self.transcript;
    for (index, question) in questions.into_iter().enumerate() {
      info!("回答第 {} 个问题", index + 1);
      transcript = conversation.ask(
        question.as_ref(),
        &self.detection_context,
        self.use_search,
        transcript,
      );
    }
    Ok(transcript)
  }
}

/// 生成播客；输入为检测上下文，自定义话题非空时优先
#[derive(Default)]
pub struct NarrateTask {
  custom_topic: Option<String>,
  output: Option<SaveAudioFileOutput>,
}

impl NarrateTask {
  pub fn with_topic(mut self, custom_topic: Option<String>) -> Self {
    self.custom_topic = custom_topic;
    self
  }

  pub fn with_output(mut self, output: Option<SaveAudioFileOutput>) -> Self {
    self.output = output;
    self
  }
}

impl<M: GenerativeModel, S: SpeechSynthesizer> Task<&str, &ServiceContext<M, S>> for NarrateTask {
  type Output = Narration;
  type Error = anyhow::Error;

  fn run_task(
    self,
    detection_context: &str,
    context: &ServiceContext<M, S>,
  ) -> Result<Self::Output, Self::Error> {
    let topic = choose_topic(self.custom_topic.as_deref(), detection_context);
    info!("开始生成播客，话题长度: {} 字符", topic.chars().count());

    let now = Instant::now();
    let narration = context.narration().narrate(topic)?;
    info!("播客生成完成，耗时: {:.2?}", now.elapsed());

    if let Some(output) = &self.output {
      output.render_result(&narration)?;
    }
    Ok(narration)
  }
}

#[derive(Debug)]
pub struct SessionReport {
  pub outcome: DetectionOutcome,
  pub transcript: Transcript,
  pub narration: Option<Narration>,
}

/// 检测、提问、播客依次执行；后两步以检测输出为上下文
#[derive(Default)]
pub struct SessionTask {
  questions: Vec<String>,
  use_search: bool,
  narrate: bool,
  custom_topic: Option<String>,
  image_output: Option<SaveImageFileOutput>,
  audio_output: Option<SaveAudioFileOutput>,
}

impl SessionTask {
  pub fn with_questions(mut self, questions: Vec<String>) -> Self {
    self.questions = questions;
    self
  }

  pub fn with_search(mut self, use_search: bool) -> Self {
    self.use_search = use_search;
    self
  }

  pub fn with_narration(mut self, narrate: bool, custom_topic: Option<String>) -> Self {
    self.narrate = narrate;
    self.custom_topic = custom_topic;
    self
  }

  pub fn with_image_output(mut self, output: Option<SaveImageFileOutput>) -> Self {
    self.image_output = output;
    self
  }

  pub fn with_audio_output(mut self, output: Option<SaveAudioFileOutput>) -> Self {
    self.audio_output = output;
    self
  }
}

impl<M: GenerativeModel, S: SpeechSynthesizer> Task<DetectionRequest, &ServiceContext<M, S>>
  for SessionTask
{
  type Output = SessionReport;
  type Error = anyhow::Error;

  fn run_task(
    self,
    request: DetectionRequest,
    context: &ServiceContext<M, S>,
  ) -> Result<Self::Output, Self::Error> {
    let outcome = DetectTask::default()
      .with_output(self.image_output)
      .run_task(request, context)?;

    let transcript = AskTask::new(outcome.diagnostic())
      .with_search(self.use_search)
      .run_task(&self.questions, context)?;

    let narration = if self.narrate {
      let narration = NarrateTask::default()
        .with_topic(self.custom_topic)
        .with_output(self.audio_output)
        .run_task(outcome.diagnostic(), context)?;
      Some(narration)
    } else {
      None
    };

    Ok(SessionReport {
      outcome,
      transcript,
      narration,
    })
  }
}

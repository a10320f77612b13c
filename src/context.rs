// 该文件是 HiMa 项目的一部分。
// src/context.rs - 服务上下文
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

use crate::{
  model::GenerativeModel,
  output::Draw,
  pipeline::{ConversationOrchestrator, DetectionPipeline, NarrationPipeline},
  speech::SpeechSynthesizer,
};

/// 进程内共享的模型与语音客户端
///
/// 启动时创建一次，各流程从这里借用；测试时换成替身实现即可。
pub struct ServiceContext<M, S> {
  pub model: M,
  pub speech: S,
  pub draw: Draw,
  pub language: String,
}

impl<M: GenerativeModel, S: SpeechSynthesizer> ServiceContext<M, S> {
  pub fn new(model: M, speech: S) -> Self {
    Self {
      model,
      speech,
      draw: Draw::default(),
      language: "en".to_string(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_language(mut self, language: impl Into<String>) -> Self {
    self.language = language.into();
    self
  }

  pub fn detection(&self) -> DetectionPipeline<'_, M> {
    DetectionPipeline::new(&self.model, &self.draw)
  }

  pub fn conversation(&self) -> ConversationOrchestrator<'_, M> {
    ConversationOrchestrator::new(&self.model)
  }

  pub fn narration(&self) -> NarrationPipeline<'_, M, S> {
    NarrationPipeline::new(&self.model, &self.speech).with_language(self.language.as_str())
  }
}

// 该文件是 HiMa 项目的一部分。
// src/pipeline/conversation.rs - 基于检测结果的对话
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

use thiserror::Error;
use tracing::{info, warn};

use crate::{
  model::{GenerateRequest, GenerativeModel},
  pipeline::UpstreamError,
  transcript::{Speaker, Transcript},
};

pub const SEARCH_NOT_USED: &str = "Web search not used.";

#[derive(Error, Debug)]
pub enum ConversationError {
  #[error("upstream call failed: {0}")]
  UpstreamError(UpstreamError),
  #[error("search response carried no rendered results")]
  MissingSearchContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
  NotUsed,
  Rendered(String),
}

impl SearchOutcome {
  pub fn as_text(&self) -> &str {
    match self {
      SearchOutcome::NotUsed => SEARCH_NOT_USED,
      SearchOutcome::Rendered(content) => content,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
  pub baseline: String,
  pub search: SearchOutcome,
}

/// 把检测上下文拼进问题里
pub fn grounded_prompt(question: &str, detection_context: &str) -> String {
  format!("{}. Objects detected: {}", question, detection_context)
}

pub struct ConversationOrchestrator<'a, M> {
  model: &'a M,
}

impl<'a, M: GenerativeModel> ConversationOrchestrator<'a, M> {
  pub fn new(model: &'a M) -> Self {
    Self { model }
  }

  /// 回答一个问题；不修改记录，只返回答案
  pub fn query(
    &self,
    question: &str,
    detection_context: &str,
    use_search: bool,
  ) -> Result<Answer, ConversationError> {
    let prompt = grounded_prompt(question, detection_context);

    let now = Instant::now();
    let baseline = self
      .model
      .generate(&GenerateRequest::new().text(prompt.as_str()))
      .map_err(|e| ConversationError::UpstreamError(Box::new(e)))?;
    info!("对话回答完成，耗时: {:.2?}", now.elapsed());

    let search = if use_search {
      let now = Instant::now();
      let augmented = self
        .model
        .generate(&GenerateRequest::new().text(prompt).google_search(true))
        .map_err(|e| ConversationError::UpstreamError(Box::new(e)))?;
      info!("搜索增强完成，耗时: {:.2?}", now.elapsed());
      let content = augmented
        .search_entry_point
        .ok_or(ConversationError::MissingSearchContent)?;
      SearchOutcome::Rendered(content)
    } else {
      SearchOutcome::NotUsed
    };

    Ok(Answer {
      baseline: baseline.text,
      search,
    })
  }

  /// 追加一轮对话并返回记录；失败时只追加一条 System 记录
  pub fn ask(
    &self,
    question: &str,
    detection_context: &str,
    use_search: bool,
    mut transcript: Transcript,
  ) -> Transcript {
    match self.query(question, detection_context, use_search) {
      Ok(Answer { baseline, search }) => {
        transcript.push(Speaker::User, question);
        transcript.push(Speaker::Assistant, baseline);
        if let SearchOutcome::Rendered(content) = search {
          transcript.push(Speaker::AssistantAugmented, content);
        }
      }
      Err(e) => {
        warn!("对话失败: {}", e);
        transcript.push(Speaker::System, format!("Error: {}", e));
      }
    }
    transcript
  }
}

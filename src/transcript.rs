// 该文件是 HiMa 项目的一部分。
// src/transcript.rs - 对话记录
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

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
  User,
  Assistant,
  /// 搜索增强后的回答
  AssistantAugmented,
  System,
}

impl Speaker {
  pub fn display_name(&self) -> &'static str {
    match self {
      Speaker::User => "You",
      Speaker::Assistant => "HiMa",
      Speaker::AssistantAugmented => "HiMa+",
      Speaker::System => "System",
    }
  }
}

impl fmt::Display for Speaker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.display_name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
  pub speaker: Speaker,
  pub text: String,
}

/// 只追加、不修改的对话记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
  turns: Vec<ChatTurn>,
}

impl Transcript {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
    self.turns.push(ChatTurn {
      speaker,
      text: text.into(),
    });
  }

  pub fn turns(&self) -> &[ChatTurn] {
    &self.turns
  }

  pub fn len(&self) -> usize {
    self.turns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.turns.is_empty()
  }

  pub fn last(&self) -> Option<&ChatTurn> {
    self.turns.last()
  }

  pub fn speakers(&self) -> impl Iterator<Item = Speaker> + '_ {
    self.turns.iter().map(|turn| turn.speaker)
  }
}

impl fmt::Display for Transcript {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for turn in &self.turns {
      writeln!(f, "[{}] {}", turn.speaker, turn.text)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn turns_keep_insertion_order() {
    let mut transcript = Transcript::new();
    transcript.push(Speaker::User, "Is this safe?");
    transcript.push(Speaker::Assistant, "Yes.");
    assert_eq!(transcript.len(), 2);
    assert_eq!(
      transcript.speakers().collect::<Vec<_>>(),
      vec![Speaker::User, Speaker::Assistant]
    );
    assert_eq!(transcript.last().map(|t| t.text.as_str()), Some("Yes."));
  }

  #[test]
  fn display_uses_speaker_names() {
    let mut transcript = Transcript::new();
    transcript.push(Speaker::AssistantAugmented, "<div/>");
    transcript.push(Speaker::System, "Error: offline");
    assert_eq!(
      transcript.to_string(),
      "[HiMa+] <div/>\n[System] Error: offline\n"
    );
  }
}

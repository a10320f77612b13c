// 该文件是 HiMa 项目的一部分。
// src/speech.rs - 语音合成与音频产物
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

use std::path::Path;

use tempfile::TempPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
  Mp3,
  Wav,
}

impl AudioFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      AudioFormat::Mp3 => "mp3",
      AudioFormat::Wav => "wav",
    }
  }
}

/// 合成器返回的压缩音频
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
  pub bytes: Vec<u8>,
  pub format: AudioFormat,
}

pub trait SpeechSynthesizer {
  type Error: std::error::Error + Send + Sync + 'static;

  fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, Self::Error>;
}

/// 导出后的音频文件
///
/// 文件位于临时目录，随本对象释放而删除；需要保留时用 [`AudioArtifact::save_to`] 复制。
#[derive(Debug)]
pub struct AudioArtifact {
  path: TempPath,
  format: AudioFormat,
}

impl AudioArtifact {
  pub(crate) fn new(path: TempPath, format: AudioFormat) -> Self {
    Self { path, format }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn format(&self) -> AudioFormat {
    self.format
  }

  pub fn save_to(&self, dest: impl AsRef<Path>) -> std::io::Result<u64> {
    std::fs::copy(&self.path, dest)
  }
}

mod normalize;
pub use self::normalize::{AudioNormalizeError, AudioNormalizer};

#[cfg(feature = "google_tts")]
mod google_tts;
#[cfg(feature = "google_tts")]
pub use self::google_tts::{GoogleTts, GoogleTtsError, split_text};

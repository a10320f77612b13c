// 该文件是 HiMa 项目的一部分。
// src/output/save_audio_file.rs - 保存播客音频
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, ensure_parent_dir},
  pipeline::Narration,
  speech::AudioArtifact,
  url_file_path,
};

pub struct SaveAudioFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveAudioFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveAudioFileOutput {
  const SCHEME: &'static str = "audio";
}

impl FromUrl for SaveAudioFileOutput {
  type Error = SaveAudioFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveAudioFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(url_file_path(uri)))
  }
}

impl SaveAudioFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<AudioArtifact> for SaveAudioFileOutput {
  type Error = SaveAudioFileError;

  fn render_result(&self, artifact: &AudioArtifact) -> Result<(), Self::Error> {
    let expected = artifact.format().extension();
    if self.path.extension().and_then(|ext| ext.to_str()) != Some(expected) {
      warn!(
        "输出文件扩展名与音频格式 {} 不一致: {}",
        expected,
        self.path.display()
      );
    }

    ensure_parent_dir(&self.path)?;
    let size = artifact.save_to(&self.path)?;
    info!("保存音频到文件: {} ({} 字节)", self.path.display(), size);
    Ok(())
  }
}

impl Render<Narration> for SaveAudioFileOutput {
  type Error = SaveAudioFileError;

  fn render_result(&self, narration: &Narration) -> Result<(), Self::Error> {
    self.render_result(&narration.audio)
  }
}

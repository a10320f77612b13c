// 该文件是 HiMa 项目的一部分。
// src/speech/google_tts.rs - Google 翻译语音合成
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::speech::{AudioFormat, SpeechSynthesizer, SynthesizedAudio};

const GOOGLE_TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";
// 接口单次请求的文本上限
const MAX_CHUNK_CHARS: usize = 100;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

#[derive(Error, Debug)]
pub enum GoogleTtsError {
  #[error("HTTP error: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("invalid endpoint URL: {0}")]
  UrlError(#[from] url::ParseError),
  #[error("no text to synthesize")]
  EmptyText,
}

pub struct GoogleTts {
  http: reqwest::blocking::Client,
  endpoint: Url,
}

impl GoogleTts {
  pub fn new(timeout: Duration) -> Result<Self, GoogleTtsError> {
    let http = reqwest::blocking::Client::builder()
      .timeout(timeout)
      .user_agent(USER_AGENT)
      .build()?;

    Ok(Self {
      http,
      endpoint: Url::parse(GOOGLE_TTS_ENDPOINT)?,
    })
  }

  pub fn with_endpoint(mut self, endpoint: Url) -> Self {
    self.endpoint = endpoint;
    self
  }

  fn chunk_url(&self, chunk: &str, language: &str, index: usize, total: usize) -> Url {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("ie", "UTF-8")
      .append_pair("q", chunk)
      .append_pair("tl", language)
      .append_pair("client", "tw-ob")
      .append_pair("total", &total.to_string())
      .append_pair("idx", &index.to_string())
      .append_pair("textlen", &chunk.chars().count().to_string());
    url
  }
}

impl SpeechSynthesizer for GoogleTts {
  type Error = GoogleTtsError;

  fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, Self::Error> {
    let chunks = split_text(text, MAX_CHUNK_CHARS);
    if chunks.is_empty() {
      return Err(GoogleTtsError::EmptyText);
    }

    let now = Instant::now();
    let total = chunks.len();
    let mut bytes = Vec::new();
    // MP3 帧可以直接首尾相接
    for (index, chunk) in chunks.iter().enumerate() {
      let url = self.chunk_url(chunk, language, index, total);
      let response = self.http.get(url).send()?.error_for_status()?;
      let audio = response.bytes()?;
      debug!("语音片段 {}/{}: {} 字节", index + 1, total, audio.len());
      bytes.extend_from_slice(&audio);
    }
    info!(
      "语音合成完成: {} 个片段, {} 字节, 耗时: {:.2?}",
      total,
      bytes.len(),
      now.elapsed()
    );

    Ok(SynthesizedAudio {
      bytes,
      format: AudioFormat::Mp3,
    })
  }
}

/// 按空白切分文本，每段不超过 `max_chars` 个字符；过长的单词直接截断
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
  let max_chars = max_chars.max(1);
  let mut chunks = Vec::new();
  let mut current = String::new();
  let mut current_len = 0;

  for word in text.split_whitespace() {
    let word_len = word.chars().count();

    if word_len > max_chars {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
        current_len = 0;
      }
      let chars: Vec<char> = word.chars().collect();
      for piece in chars.chunks(max_chars) {
        chunks.push(piece.iter().collect());
      }
      continue;
    }

    let needed = if current.is_empty() {
      word_len
    } else {
      current_len + 1 + word_len
    };
    if needed > max_chars {
      chunks.push(std::mem::take(&mut current));
      current_len = 0;
    }

    if !current.is_empty() {
      current.push(' ');
      current_len += 1;
    }
    current.push_str(word);
    current_len += word_len;
  }

  if !current.is_empty() {
    chunks.push(current);
  }
  chunks
}

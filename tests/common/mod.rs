// 该文件是 HiMa 项目的一部分。
// tests/common/mod.rs - 测试用的模型与语音替身
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

#![allow(dead_code)]

use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  io::Cursor,
};

use hima::{
  ServiceContext,
  model::{GenerateRequest, GenerateResponse, GenerativeModel},
  output::Draw,
  speech::{AudioFormat, SpeechSynthesizer, SynthesizedAudio},
};

#[derive(Debug, thiserror::Error)]
#[error("mock upstream: {0}")]
pub struct MockError(pub String);

/// 按顺序返回预设响应，并记录收到的请求
#[derive(Default)]
pub struct MockModel {
  responses: RefCell<VecDeque<Result<GenerateResponse, MockError>>>,
  requests: RefCell<Vec<GenerateRequest>>,
}

impl MockModel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reply(self, text: &str) -> Self {
    self
      .responses
      .borrow_mut()
      .push_back(Ok(GenerateResponse::from_text(text)));
    self
  }

  pub fn reply_with_search(self, text: &str, rendered: &str) -> Self {
    self.responses.borrow_mut().push_back(Ok(GenerateResponse {
      text: text.to_string(),
      search_entry_point: Some(rendered.to_string()),
    }));
    self
  }

  pub fn fail(self, message: &str) -> Self {
    self
      .responses
      .borrow_mut()
      .push_back(Err(MockError(message.to_string())));
    self
  }

  pub fn requests(&self) -> Vec<GenerateRequest> {
    self.requests.borrow().clone()
  }

  pub fn call_count(&self) -> usize {
    self.requests.borrow().len()
  }
}

impl GenerativeModel for MockModel {
  type Error = MockError;

  fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, Self::Error> {
    self.requests.borrow_mut().push(request.clone());
    self
      .responses
      .borrow_mut()
      .pop_front()
      .unwrap_or_else(|| Err(MockError("no scripted response".to_string())))
  }
}

/// 返回一段单声道 WAV，并记录调用次数
#[derive(Default)]
pub struct MockSpeech {
  calls: Cell<usize>,
  texts: RefCell<Vec<String>>,
  fail: bool,
  mp3: bool,
}

impl MockSpeech {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::default()
    }
  }

  /// 与真实合成器一样返回 MP3
  pub fn mp3() -> Self {
    Self {
      mp3: true,
      ..Self::default()
    }
  }

  pub fn call_count(&self) -> usize {
    self.calls.get()
  }

  pub fn texts(&self) -> Vec<String> {
    self.texts.borrow().clone()
  }
}

impl SpeechSynthesizer for MockSpeech {
  type Error = MockError;

  fn synthesize(&self, text: &str, _language: &str) -> Result<SynthesizedAudio, Self::Error> {
    self.calls.set(self.calls.get() + 1);
    self.texts.borrow_mut().push(text.to_string());
    if self.fail {
      return Err(MockError("speech service offline".to_string()));
    }
    if self.mp3 {
      return Ok(SynthesizedAudio {
        bytes: silent_mp3(8),
        format: AudioFormat::Mp3,
      });
    }
    Ok(SynthesizedAudio {
      bytes: wav_bytes(SAMPLE_RATE, 1600),
      format: AudioFormat::Wav,
    })
  }
}

pub const SAMPLE_RATE: u32 = 16_000;

pub fn wav_bytes(sample_rate: u32, samples: usize) -> Vec<u8> {
  let spec = hound::WavSpec {
    channels: 1,
    sample_rate,
    bits_per_sample: 16,
    sample_format: hound::SampleFormat::Int,
  };
  let mut cursor = Cursor::new(Vec::new());
  {
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for i in 0..samples {
      writer.write_sample(((i % 64) as i16 - 32) * 256).unwrap();
    }
    writer.finalize().unwrap();
  }
  cursor.into_inner()
}

pub const MP3_SAMPLE_RATE: u32 = 44_100;

// MPEG-1 Layer III, 128 kbps, 44.1 kHz, 单声道；边信息全零即为静音帧
pub fn silent_mp3(frames: usize) -> Vec<u8> {
  const FRAME_LEN: usize = 417;
  let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
  for _ in 0..frames {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
    bytes.extend_from_slice(&frame);
  }
  bytes
}

pub fn context(model: MockModel, speech: MockSpeech) -> ServiceContext<MockModel, MockSpeech> {
  ServiceContext::new(model, speech).with_draw(Draw::without_font())
}

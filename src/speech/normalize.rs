// 该文件是 HiMa 项目的一部分。
// src/speech/normalize.rs - 音频格式归一化
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

use std::{
  fs::File,
  io::{BufWriter, ErrorKind},
  path::Path,
};

use symphonia::core::{
  audio::{SampleBuffer, SignalSpec},
  codecs::{CODEC_TYPE_NULL, DecoderOptions},
  errors::Error as SymphoniaError,
  formats::FormatOptions,
  io::MediaSourceStream,
  meta::MetadataOptions,
  probe::Hint,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::speech::{AudioArtifact, AudioFormat};

#[derive(Error, Debug)]
pub enum AudioNormalizeError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("audio decode error: {0}")]
  DecodeError(#[from] SymphoniaError),
  #[error("WAV encode error: {0}")]
  EncodeError(#[from] hound::Error),
  #[error("no decodable audio track")]
  NoTrack,
  #[error("audio contains no samples")]
  NoSamples,
}

struct DecodedPcm {
  samples: Vec<i16>,
  spec: SignalSpec,
}

/// 把合成器输出重新封装为 16 位 PCM WAV
///
/// 只做格式归一化，采样率、声道与音高保持不变。
#[derive(Debug, Clone, Default)]
pub struct AudioNormalizer;

impl AudioNormalizer {
  pub fn new() -> Self {
    Self
  }

  pub fn export(
    &self,
    source: &Path,
    format: AudioFormat,
  ) -> Result<AudioArtifact, AudioNormalizeError> {
    let decoded = decode_pcm(source, format)?;
    if decoded.samples.is_empty() {
      return Err(AudioNormalizeError::NoSamples);
    }

    let channels = decoded.spec.channels.count() as u16;
    let spec = hound::WavSpec {
      channels,
      sample_rate: decoded.spec.rate,
      bits_per_sample: 16,
      sample_format: hound::SampleFormat::Int,
    };

    let mut target = tempfile::Builder::new()
      .prefix("hima-podcast-")
      .suffix(".wav")
      .tempfile()?;
    {
      let mut writer = hound::WavWriter::new(BufWriter::new(target.as_file_mut()), spec)?;
      for sample in &decoded.samples {
        writer.write_sample(*sample)?;
      }
      writer.finalize()?;
    }

    info!(
      "音频导出完成: {} Hz, {} 声道, {} 个采样 -> {}",
      spec.sample_rate,
      channels,
      decoded.samples.len(),
      target.path().display()
    );

    Ok(AudioArtifact::new(target.into_temp_path(), AudioFormat::Wav))
  }
}

fn decode_pcm(path: &Path, format: AudioFormat) -> Result<DecodedPcm, AudioNormalizeError> {
  let source = File::open(path)?;
  let stream = MediaSourceStream::new(Box::new(source), Default::default());

  let mut hint = Hint::new();
  hint.with_extension(format.extension());

  let probed = symphonia::default::get_probe().format(
    &hint,
    stream,
    &FormatOptions::default(),
    &MetadataOptions::default(),
  )?;
  let mut reader = probed.format;

  let track = reader
    .tracks()
    .iter()
    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
    .ok_or(AudioNormalizeError::NoTrack)?;
  let track_id = track.id;
  let mut decoder =
    symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

  let mut samples = Vec::new();
  let mut spec: Option<SignalSpec> = None;

  loop {
    let packet = match reader.next_packet() {
      Ok(packet) => packet,
      Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
      Err(e) => return Err(e.into()),
    };

    if packet.track_id() != track_id {
      continue;
    }

    match decoder.decode(&packet) {
      Ok(decoded) => {
        let signal = *decoded.spec();
        if spec.is_none() {
          debug!("音频参数: {} Hz, {} 声道", signal.rate, signal.channels.count());
          spec = Some(signal);
        }
        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, signal);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
      }
      Err(SymphoniaError::DecodeError(e)) => warn!("跳过损坏的音频包: {}", e),
      Err(e) => return Err(e.into()),
    }
  }

  let spec = spec.ok_or(AudioNormalizeError::NoSamples)?;
  Ok(DecodedPcm { samples, spec })
}

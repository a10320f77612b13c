// 该文件是 HiMa 项目的一部分。
// src/main.rs - 命令行入口
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

mod args;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use hima::{
  FromUrl, ServiceContext,
  input::ImageFileInput,
  model::GeminiClient,
  output::{Draw, SaveAudioFileOutput, SaveImageFileOutput},
  speech::GoogleTts,
  task::{AskTask, DetectTask, NarrateTask, SessionTask, Task},
};

use args::{Args, Command, ServiceArgs};

fn build_context(service: ServiceArgs) -> Result<ServiceContext<GeminiClient, GoogleTts>> {
  let timeout = Duration::from_secs(service.timeout_secs);
  let model = GeminiClient::builder(service.api_key)
    .model(service.model)
    .endpoint(service.endpoint.as_str())
    .timeout(timeout)
    .build()?;
  info!("使用模型: {}", model.model());
  let speech = GoogleTts::new(timeout)?;

  let draw = match &service.font {
    Some(path) => Draw::with_font_file(path)?,
    None => Draw::default(),
  };

  Ok(
    ServiceContext::new(model, speech)
      .with_draw(draw)
      .with_language(service.language),
  )
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let context = build_context(args.service)?;

  match args.command {
    Command::Detect {
      input,
      output,
      instruction,
    } => {
      info!("输入来源: {}", input);
      info!("输出路径: {}", output);
      let request = ImageFileInput::from_url(&input)?.into_request(instruction);
      let output = SaveImageFileOutput::from_url(&output)?;
      let outcome = DetectTask::default()
        .with_output(Some(output))
        .run_task(request, &context)?;
      println!("{}", outcome.diagnostic());
    }
    Command::Ask {
      questions,
      context: detection_context,
      search,
    } => {
      let transcript = AskTask::new(detection_context)
        .with_search(search)
        .run_task(&questions, &context)?;
      print!("{}", transcript);
    }
    Command::Narrate { topic, output } => {
      info!("输出路径: {}", output);
      let output = SaveAudioFileOutput::from_url(&output)?;
      let narration = NarrateTask::default()
        .with_topic(Some(topic))
        .with_output(Some(output))
        .run_task("", &context)?;
      println!("{}", narration.script.text);
    }
    Command::Session {
      input,
      output,
      instruction,
      questions,
      search,
      topic,
      audio,
    } => {
      info!("输入来源: {}", input);
      let request = ImageFileInput::from_url(&input)?.into_request(instruction);
      let image_output = SaveImageFileOutput::from_url(&output)?;
      let audio_output = audio
        .as_ref()
        .map(SaveAudioFileOutput::from_url)
        .transpose()?;

      let report = SessionTask::default()
        .with_questions(questions)
        .with_search(search)
        .with_narration(audio_output.is_some(), topic)
        .with_image_output(Some(image_output))
        .with_audio_output(audio_output)
        .run_task(request, &context)?;

      println!("{}", report.outcome.diagnostic());
      print!("{}", report.transcript);
      if let Some(narration) = &report.narration {
        println!("{}", narration.script.text);
      }
    }
  }

  Ok(())
}

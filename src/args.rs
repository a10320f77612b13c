// 该文件是 HiMa 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use hima::model::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

const DEFAULT_INSTRUCTION: &str = "Categorize and label nursing items.";

/// HiMa 母婴助手
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub service: ServiceArgs,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(clap::Args, Debug)]
pub struct ServiceArgs {
  /// Gemini API 密钥
  #[arg(long, env = "GEM_API_KEY", hide_env_values = true)]
  pub api_key: String,
  /// 模型名称
  #[arg(long, default_value = DEFAULT_MODEL)]
  pub model: String,
  /// 接口地址
  #[arg(long, default_value = DEFAULT_ENDPOINT)]
  pub endpoint: Url,
  /// 语音合成语言
  #[arg(long, default_value = "en")]
  pub language: String,
  /// 单次请求超时（秒）
  #[arg(long, default_value_t = 60)]
  pub timeout_secs: u64,
  /// 标签字体文件，缺省时查找系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 检测图像中的物体并保存标注图
  Detect {
    /// 输入图像，例如 image:///tmp/crib.jpg
    #[arg(long, value_name = "SOURCE")]
    input: Url,
    /// 标注图输出，例如 image:///tmp/labelled.png
    #[arg(long, value_name = "OUTPUT")]
    output: Url,
    #[arg(long, default_value = DEFAULT_INSTRUCTION)]
    instruction: String,
  },
  /// 基于检测上下文回答问题
  Ask {
    /// 可重复，按顺序提问
    #[arg(long = "question", required = true)]
    questions: Vec<String>,
    /// 检测输出文本
    #[arg(long, default_value = "")]
    context: String,
    /// 追加一次搜索增强回答
    #[arg(long)]
    search: bool,
  },
  /// 按话题生成播客音频
  Narrate {
    #[arg(long, value_parser = non_blank)]
    topic: String,
    /// 音频输出，例如 audio:///tmp/podcast.wav
    #[arg(long, value_name = "OUTPUT")]
    output: Url,
  },
  /// 检测后继续提问并生成播客
  Session {
    #[arg(long, value_name = "SOURCE")]
    input: Url,
    #[arg(long, value_name = "OUTPUT")]
    output: Url,
    #[arg(long, default_value = DEFAULT_INSTRUCTION)]
    instruction: String,
    #[arg(long = "question")]
    questions: Vec<String>,
    #[arg(long)]
    search: bool,
    /// 自定义播客话题，空白时使用检测输出
    #[arg(long)]
    topic: Option<String>,
    /// 给出时才生成播客
    #[arg(long, value_name = "OUTPUT")]
    audio: Option<Url>,
  },
}

fn non_blank(value: &str) -> Result<String, String> {
  if value.trim().is_empty() {
    return Err("话题不能为空".to_string());
  }
  Ok(value.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn narrate_rejects_blank_topic() {
    let parsed = Args::try_parse_from([
      "hima",
      "--api-key",
      "key",
      "narrate",
      "--topic",
      "   ",
      "--output",
      "audio:///tmp/podcast.wav",
    ]);
    assert!(parsed.is_err());
  }

  #[test]
  fn narrate_accepts_topic() {
    let parsed = Args::try_parse_from([
      "hima",
      "--api-key",
      "key",
      "narrate",
      "--topic",
      "Benefits of baby monitors",
      "--output",
      "audio:///tmp/podcast.wav",
    ])
    .unwrap();
    match parsed.command {
      Command::Narrate { topic, .. } => assert_eq!(topic, "Benefits of baby monitors"),
      other => panic!("unexpected command: {:?}", other),
    }
  }
}

// 该文件是 HiMa 项目的一部分。
// src/model/extract.rs - 模型输出解码
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

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::BoundingBox;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Error, Debug)]
pub enum MalformedPayload {
  #[error("model returned no text")]
  Empty,
  #[error("invalid JSON payload: {0}")]
  Json(#[from] serde_json::Error),
}

/// 去掉代码块包裹，取出其中的结构化内容
///
/// 找到恰为 ```` ```json ```` 的一行后，丢弃它及之前的内容，并在下一个 ```` ``` ```` 处截断。
/// 没有代码块标记时原样返回。
pub fn extract_payload(raw: &str) -> &str {
  let mut offset = 0;
  for line in raw.split_inclusive('\n') {
    let next = offset + line.len();
    if line.trim_end() == JSON_FENCE {
      let rest = &raw[next..];
      let end = rest.find(FENCE).unwrap_or(rest.len());
      return rest[..end].trim();
    }
    offset = next;
  }
  raw
}

/// 提取并解析检测框数组
pub fn decode_boxes(raw: &str) -> Result<Vec<BoundingBox>, MalformedPayload> {
  let payload = extract_payload(raw).trim();
  if payload.is_empty() {
    return Err(MalformedPayload::Empty);
  }

  match serde_json::from_str::<Vec<BoundingBox>>(payload) {
    Ok(boxes) => {
      debug!("解析得到 {} 个检测框", boxes.len());
      Ok(boxes)
    }
    Err(e) => {
      warn!("检测结果无法解析: {}", e);
      Err(MalformedPayload::Json(e))
    }
  }
}

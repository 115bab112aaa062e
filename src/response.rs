// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/response.rs - 检测响应
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

use serde::{Deserialize, Serialize};

use crate::labels::LabelTable;
use crate::model::DetectResult;

/// 检测响应：boxes、labels、scores 三个序列按下标对齐，长度始终相等。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
  pub boxes: Vec<[f32; 4]>,
  pub labels: Vec<String>,
  pub scores: Vec<f32>,
}

impl DetectResponse {
  pub fn empty() -> Self {
    DetectResponse {
      boxes: Vec::new(),
      labels: Vec::new(),
      scores: Vec::new(),
    }
  }

  /// 按输入顺序将检测结果映射为响应序列。
  ///
  /// 空结果直接给出三个空序列，不触发任何标签查询。
  pub fn from_result(result: &DetectResult, table: &LabelTable) -> Self {
    if result.is_empty() {
      return Self::empty();
    }

    let mut boxes = Vec::with_capacity(result.len());
    let mut labels = Vec::with_capacity(result.len());
    let mut scores = Vec::with_capacity(result.len());

    for item in &result.items {
      boxes.push(item.bbox);
      labels.push(table.name(item.class_id).to_string());
      scores.push(item.score);
    }

    DetectResponse {
      boxes,
      labels,
      scores,
    }
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }
}

// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/model.rs - 模型
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

/// 检测模型的统一契约。
///
/// `infer` 一次只接受一个输入；多图批处理不在本契约之内，
/// 调用方需要逐个提交。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测项。
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  /// 类别索引
  pub class_id: u32,
  /// 置信度
  pub score: f32,
  /// 边界框，原图像素坐标 [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
}

/// 一次推理的全部检测项，顺序即模型输出顺序，可以为空。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

mod yolo;
pub use self::yolo::{YoloBuilder, YoloError, YoloModel};

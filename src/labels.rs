// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/labels.rs - 类别标签表
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

use thiserror::Error;
use tracing::info;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签表为空")]
  Empty,
  #[error("无法读取标签文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("标签文件解析失败: {0}")]
  Parse(#[from] serde_json::Error),
}

/// 进程级只读的类别索引到名称映射。
///
/// 随模型一起在启动时构建一次，此后不可变，可被并发请求无锁共享。
#[derive(Debug, Clone)]
pub struct LabelTable {
  names: Box<[String]>,
}

impl LabelTable {
  /// 从名称列表构建标签表。
  pub fn from_names(names: Vec<String>) -> Result<Self, LabelError> {
    if names.is_empty() {
      return Err(LabelError::Empty);
    }

    Ok(Self {
      names: names.into_boxed_slice(),
    })
  }

  /// 从 JSON 字符串数组文件加载标签表。
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let data = std::fs::read(path)?;
    let names: Vec<String> = serde_json::from_slice(&data)?;
    let table = Self::from_names(names)?;
    info!("标签表加载完成, 共 {} 个类别", table.len());
    Ok(table)
  }

  /// 内置的 COCO 80 类标签表。
  pub fn coco() -> Self {
    Self {
      names: COCO_CLASSES
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>()
        .into_boxed_slice(),
    }
  }

  /// 按类别索引查询名称。
  ///
  /// 模型与标签表必须一致；索引越界说明二者装配不匹配，直接中止。
  pub fn name(&self, class_id: u32) -> &str {
    match self.names.get(class_id as usize) {
      Some(name) => name,
      None => panic!(
        "类别索引越界: 索引 {}, 标签表大小 {}",
        class_id,
        self.names.len()
      ),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

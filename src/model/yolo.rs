// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 模型
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

use std::sync::Mutex;

use image::RgbImage;
use ndarray::Array4;
use ort::{
  inputs,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DetectItem, DetectResult, Model};

const YOLO_INPUT_NAME: &str = "images";
const YOLO_INPUT_W: u32 = 640;
const YOLO_INPUT_H: u32 = 640;
/// 每个候选框的回归参数个数 (cx, cy, w, h)
const YOLO_BOX_PARAMS: usize = 4;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum YoloError {
  #[error("模型加载错误: {0}")]
  ModelLoad(#[from] std::io::Error),
  #[error("ONNX 运行时错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型输出形状不符合预期: {0:?}")]
  OutputShape(Vec<i64>),
  #[error("推理会话已损坏")]
  SessionPoisoned,
}

/// YOLO ONNX 模型构建器
pub struct YoloBuilder {
  model_path: String,
  confidence: f32,
  nms_threshold: f32,
  intra_threads: usize,
}

impl YoloBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    YoloBuilder {
      model_path: model_path.into(),
      confidence: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  /// 置信度阈值，低于该值的候选框被模型层丢弃
  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  /// NMS IOU 阈值
  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn intra_threads(mut self, intra_threads: usize) -> Self {
    self.intra_threads = intra_threads;
    self
  }

  pub fn build(self) -> Result<YoloModel, YoloError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX 推理会话");
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_memory(&model_data)?;

    if session.inputs.len() != 1 {
      return Err(YoloError::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }

    if session.outputs.len() != 1 {
      return Err(YoloError::ModelInvalid(format!(
        "预期模型输出数量为 1, 实际为 {}",
        session.outputs.len()
      )));
    }

    info!("模型加载完成");

    Ok(YoloModel {
      session: Mutex::new(session),
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
    })
  }
}

/// 基于 ONNX Runtime 的 YOLO 目标检测模型。
///
/// 会话在构建时创建一次；`ort` 的 `run` 需要独占会话，
/// 因此内部用互斥锁保护，对外保持 `&self` 的推理契约。
pub struct YoloModel {
  session: Mutex<Session>,
  confidence: f32,
  nms_threshold: f32,
}

impl Model for YoloModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = YoloError;

  fn infer(&self, input: &RgbImage) -> Result<DetectResult, YoloError> {
    let (original_width, original_height) = input.dimensions();
    debug!("预处理输入图像: {}x{}", original_width, original_height);
    let tensor = preprocess(input);

    let (data, _offset) = tensor.into_raw_vec_and_offset();
    let input_tensor = Tensor::from_array((
      [
        1usize,
        3,
        YOLO_INPUT_H as usize,
        YOLO_INPUT_W as usize,
      ],
      data,
    ))?;

    debug!("执行模型推理");
    let (dims, output_data) = {
      let mut session = self
        .session
        .lock()
        .map_err(|_| YoloError::SessionPoisoned)?;
      let outputs = session.run(inputs![YOLO_INPUT_NAME => input_tensor])?;
      let output = outputs[0].try_extract_tensor::<f32>()?;
      let shape = output.0.clone();
      let dims: Vec<i64> = (0..shape.len()).map(|i| shape[i]).collect();
      (dims, output.1.to_vec())
    };

    // 预测张量形状为 [1, 4 + 类别数, 候选框数]
    if dims.len() != 3 || dims[0] != 1 || dims[1] as usize <= YOLO_BOX_PARAMS {
      return Err(YoloError::OutputShape(dims));
    }

    let num_classes = dims[1] as usize - YOLO_BOX_PARAMS;
    let num_anchors = dims[2] as usize;

    let scale_x = original_width as f32 / YOLO_INPUT_W as f32;
    let scale_y = original_height as f32 / YOLO_INPUT_H as f32;

    let candidates = decode_predictions(
      &output_data,
      num_classes,
      num_anchors,
      self.confidence,
      scale_x,
      scale_y,
    );
    let items = nms(candidates, self.nms_threshold);

    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

/// 预处理图像：缩放到模型输入尺寸并转为 NCHW 浮点张量
fn preprocess(image: &RgbImage) -> Array4<f32> {
  let resized = image::imageops::resize(
    image,
    YOLO_INPUT_W,
    YOLO_INPUT_H,
    image::imageops::FilterType::Triangle,
  );

  let mut input = Array4::<f32>::zeros((
    1,
    3,
    YOLO_INPUT_H as usize,
    YOLO_INPUT_W as usize,
  ));
  for (x, y, pixel) in resized.enumerate_pixels() {
    for c in 0..3 {
      input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
    }
  }

  input
}

/// 解码预测张量。
///
/// 张量布局按属性行排列: 前 4 行为 cx, cy, w, h，其后每行对应一个类别的分数。
/// 候选框先在模型输入坐标系内裁剪，再缩放回原图像素坐标。
fn decode_predictions(
  data: &[f32],
  num_classes: usize,
  num_anchors: usize,
  confidence_threshold: f32,
  scale_x: f32,
  scale_y: f32,
) -> Vec<DetectItem> {
  let mut items = Vec::new();

  for anchor in 0..num_anchors {
    let mut max_score = 0.0f32;
    let mut max_class_id = 0usize;

    for class_id in 0..num_classes {
      let score = data[(YOLO_BOX_PARAMS + class_id) * num_anchors + anchor];
      if score > max_score {
        max_score = score;
        max_class_id = class_id;
      }
    }

    if max_score < confidence_threshold {
      continue;
    }

    let cx = data[anchor];
    let cy = data[num_anchors + anchor];
    let w = data[2 * num_anchors + anchor];
    let h = data[3 * num_anchors + anchor];

    let xmin = (cx - w / 2.0).clamp(0.0, YOLO_INPUT_W as f32);
    let ymin = (cy - h / 2.0).clamp(0.0, YOLO_INPUT_H as f32);
    let xmax = (cx + w / 2.0).clamp(0.0, YOLO_INPUT_W as f32);
    let ymax = (cy + h / 2.0).clamp(0.0, YOLO_INPUT_H as f32);

    if xmax <= xmin || ymax <= ymin {
      continue;
    }

    items.push(DetectItem {
      class_id: max_class_id as u32,
      score: max_score,
      bbox: [
        xmin * scale_x,
        ymin * scale_y,
        xmax * scale_x,
        ymax * scale_y,
      ],
    });
  }

  items
}

/// 非极大值抑制
fn nms(mut items: Vec<DetectItem>, nms_threshold: f32) -> Vec<DetectItem> {
  // 按置信度降序排序
  items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

  let mut result = Vec::new();

  while !items.is_empty() {
    let best = items.remove(0);

    items.retain(|item| {
      if item.class_id != best.class_id {
        return true;
      }
      iou(&best.bbox, &item.bbox) < nms_threshold
    });

    result.push(best);
  }

  result
}

/// 计算两个边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox,
    }
  }

  /// 构造单类别预测张量: 每个候选框 5 行 (cx, cy, w, h, cls0)
  fn prediction_tensor(anchors: &[(f32, f32, f32, f32, f32)]) -> Vec<f32> {
    let num_anchors = anchors.len();
    let mut data = vec![0.0f32; 5 * num_anchors];
    for (i, &(cx, cy, w, h, score)) in anchors.iter().enumerate() {
      data[i] = cx;
      data[num_anchors + i] = cy;
      data[2 * num_anchors + i] = w;
      data[3 * num_anchors + i] = h;
      data[4 * num_anchors + i] = score;
    }
    data
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let bbox = [10.0, 10.0, 50.0, 50.0];
    assert!((iou(&bbox, &bbox) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [20.0, 20.0, 30.0, 30.0];
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn decode_keeps_confident_anchor_and_drops_weak_one() {
    let data = prediction_tensor(&[
      (320.0, 320.0, 64.0, 64.0, 0.9),
      (100.0, 100.0, 32.0, 32.0, 0.1),
    ]);

    let items = decode_predictions(&data, 1, 2, 0.5, 1.0, 1.0);

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 0);
    assert_eq!(items[0].score, 0.9);
    assert_eq!(items[0].bbox, [288.0, 288.0, 352.0, 352.0]);
  }

  #[test]
  fn decode_scales_boxes_back_to_source_coordinates() {
    let data = prediction_tensor(&[(320.0, 320.0, 64.0, 64.0, 0.9)]);

    let items = decode_predictions(&data, 1, 1, 0.5, 0.5, 2.0);

    assert_eq!(items[0].bbox, [144.0, 576.0, 176.0, 704.0]);
  }

  #[test]
  fn decode_clamps_boxes_to_input_bounds() {
    let data = prediction_tensor(&[(0.0, 0.0, 100.0, 100.0, 0.9)]);

    let items = decode_predictions(&data, 1, 1, 0.5, 1.0, 1.0);

    assert_eq!(items[0].bbox, [0.0, 0.0, 50.0, 50.0]);
  }

  #[test]
  fn nms_suppresses_overlapping_same_class_boxes() {
    let items = vec![
      item(0, 0.8, [12.0, 12.0, 52.0, 52.0]),
      item(0, 0.9, [10.0, 10.0, 50.0, 50.0]),
    ];

    let kept = nms(items, 0.45);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.9);
  }

  #[test]
  fn nms_keeps_overlapping_boxes_of_different_classes() {
    let items = vec![
      item(0, 0.9, [10.0, 10.0, 50.0, 50.0]),
      item(1, 0.8, [12.0, 12.0, 52.0, 52.0]),
    ];

    let kept = nms(items, 0.45);

    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn nms_orders_results_by_score() {
    let items = vec![
      item(0, 0.6, [200.0, 200.0, 250.0, 250.0]),
      item(1, 0.9, [10.0, 10.0, 50.0, 50.0]),
      item(2, 0.7, [100.0, 100.0, 150.0, 150.0]),
    ];

    let kept = nms(items, 0.45);

    let scores: Vec<f32> = kept.iter().map(|item| item.score).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.6]);
  }

  #[test]
  fn preprocess_produces_unit_scaled_nchw_tensor() {
    let image = RgbImage::from_pixel(32, 32, image::Rgb([255, 0, 51]));

    let tensor = preprocess(&image);

    assert_eq!(
      tensor.shape(),
      [1, 3, YOLO_INPUT_H as usize, YOLO_INPUT_W as usize]
    );
    assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-4);
    assert!(tensor[[0, 1, 0, 0]].abs() < 1e-4);
    assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-3);
  }
}

// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/pipeline.rs - 推理流水线
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::decode::{DecodeError, decode_rgb};
use crate::labels::LabelTable;
use crate::model::{DetectResult, Model};
use crate::response::DetectResponse;

#[derive(Error, Debug)]
pub enum PipelineError {
  /// 客户端错误：输入字节无法解释为图像
  #[error("图像解码失败: {0}")]
  Decode(#[from] DecodeError),
  /// 服务端错误：模型协作方在推理中失败
  #[error("模型推理失败: {0}")]
  Inference(#[source] anyhow::Error),
}

/// 单次请求的推理流水线：解码 → 推理 → 格式化。
///
/// 模型与标签表在进程启动时构建一次，以只读句柄注入，
/// 请求之间不保留任何状态。
pub struct Pipeline<M> {
  model: M,
  labels: LabelTable,
}

impl<M> Pipeline<M>
where
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, labels: LabelTable) -> Self {
    Pipeline { model, labels }
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  /// 对一份编码图像字节执行完整流水线。
  ///
  /// 解码失败立即返回，不触达模型；推理失败同样无部分结果。
  pub fn run(&self, bytes: &[u8]) -> Result<DetectResponse, PipelineError> {
    let image = decode_rgb(bytes)?;
    debug!(
      "图像解码完成: {}x{}, {} 字节输入",
      image.width(),
      image.height(),
      bytes.len()
    );

    let result = self
      .model
      .infer(&image)
      .map_err(|e| PipelineError::Inference(anyhow::Error::new(e)))?;
    debug!("推理完成: {} 个检测项", result.len());

    Ok(DetectResponse::from_result(&result, &self.labels))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;
  use image::{ImageFormat, Rgb};
  use serde_json::json;
  use std::io::Cursor;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use thiserror::Error;

  /// 固定输出的模型桩，同时记录调用次数
  struct StubModel {
    items: Vec<DetectItem>,
    calls: Arc<AtomicUsize>,
  }

  impl StubModel {
    fn new(items: Vec<DetectItem>) -> (Self, Arc<AtomicUsize>) {
      let calls = Arc::new(AtomicUsize::new(0));
      (
        StubModel {
          items,
          calls: Arc::clone(&calls),
        },
        calls,
      )
    }
  }

  impl Model for StubModel {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = std::convert::Infallible;

    fn infer(&self, _input: &RgbImage) -> Result<DetectResult, Self::Error> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(DetectResult {
        items: self.items.clone().into_boxed_slice(),
      })
    }
  }

  #[derive(Error, Debug)]
  #[error("模型内部失败")]
  struct BrokenModelError;

  struct BrokenModel;

  impl Model for BrokenModel {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = BrokenModelError;

    fn infer(&self, _input: &RgbImage) -> Result<DetectResult, Self::Error> {
      Err(BrokenModelError)
    }
  }

  fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(64, 64, Rgb([10, 20, 30]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
  }

  fn cat_table() -> LabelTable {
    LabelTable::from_names(vec!["cat".to_string()]).unwrap()
  }

  fn cat_item() -> DetectItem {
    DetectItem {
      class_id: 0,
      score: 0.9,
      bbox: [10.0, 10.0, 50.0, 50.0],
    }
  }

  #[test]
  fn full_pipeline_produces_expected_response() {
    let (model, _) = StubModel::new(vec![cat_item()]);
    let pipeline = Pipeline::new(model, cat_table());

    let response = pipeline.run(&png_bytes()).unwrap();

    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      json!({
        "boxes": [[10.0, 10.0, 50.0, 50.0]],
        "labels": ["cat"],
        "scores": [f64::from(0.9f32)],
      })
    );
  }

  #[test]
  fn empty_detections_produce_empty_response() {
    let (model, _) = StubModel::new(Vec::new());
    let pipeline = Pipeline::new(model, cat_table());

    let response = pipeline.run(&png_bytes()).unwrap();

    assert_eq!(response, DetectResponse::empty());
  }

  #[test]
  fn malformed_bytes_never_reach_the_model() {
    let (model, calls) = StubModel::new(vec![cat_item()]);
    let pipeline = Pipeline::new(model, cat_table());

    for bytes in [&b""[..], &b"\x00\x01\x02\x03"[..], &b"not an image"[..]] {
      assert!(matches!(
        pipeline.run(bytes),
        Err(PipelineError::Decode(_))
      ));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn pipeline_is_idempotent_for_identical_input() {
    let (model, calls) = StubModel::new(vec![
      cat_item(),
      DetectItem {
        class_id: 0,
        score: 0.5,
        bbox: [0.0, 0.0, 8.0, 8.0],
      },
    ]);
    let pipeline = Pipeline::new(model, cat_table());
    let bytes = png_bytes();

    let first = pipeline.run(&bytes).unwrap();
    let second = pipeline.run(&bytes).unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn response_sequences_always_align() {
    let (model, _) = StubModel::new(vec![
      cat_item(),
      DetectItem {
        class_id: 0,
        score: 0.25,
        bbox: [1.0, 2.0, 3.0, 4.0],
      },
    ]);
    let pipeline = Pipeline::new(model, cat_table());

    let response = pipeline.run(&png_bytes()).unwrap();

    assert_eq!(response.boxes.len(), 2);
    assert_eq!(response.boxes.len(), response.labels.len());
    assert_eq!(response.labels.len(), response.scores.len());
  }

  #[test]
  fn model_failure_is_reported_as_inference_error() {
    let pipeline = Pipeline::new(BrokenModel, cat_table());

    assert!(matches!(
      pipeline.run(&png_bytes()),
      Err(PipelineError::Inference(_))
    ));
  }
}

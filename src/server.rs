// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::model::{DetectResult, Model};
use crate::pipeline::{Pipeline, PipelineError};
use crate::response::DetectResponse;

/// 请求体大小上限缺省值：10 MB
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ServeError {
  #[error("无效图像")]
  InvalidImage,
  #[error("推理失败: {0}")]
  Inference(anyhow::Error),
  #[error("工作线程失败: {0}")]
  Worker(tokio::task::JoinError),
}

impl From<PipelineError> for ServeError {
  fn from(err: PipelineError) -> Self {
    match err {
      PipelineError::Decode(_) => ServeError::InvalidImage,
      PipelineError::Inference(e) => ServeError::Inference(e),
    }
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
}

impl IntoResponse for ServeError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ServeError::InvalidImage => (StatusCode::BAD_REQUEST, "invalid image"),
      ServeError::Inference(e) => {
        error!("推理失败: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, "inference failed")
      }
      ServeError::Worker(e) => {
        error!("工作线程失败: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, "inference failed")
      }
    };

    (status, Json(ErrorBody { error: message })).into_response()
  }
}

/// 构建服务路由。
///
/// 流水线句柄随路由状态共享给所有请求；推理在阻塞线程池上执行，
/// 避免模型延迟拖住异步执行器。
pub fn router<M>(pipeline: Arc<Pipeline<M>>, body_limit: usize) -> Router
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/detect", post(detect::<M>))
    .route("/healthz", get(healthz))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(pipeline)
}

async fn detect<M>(
  State(pipeline): State<Arc<Pipeline<M>>>,
  body: Bytes,
) -> Result<Json<DetectResponse>, ServeError>
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let response = tokio::task::spawn_blocking(move || pipeline.run(&body))
    .await
    .map_err(ServeError::Worker)??;

  Ok(Json(response))
}

async fn healthz() -> Json<serde_json::Value> {
  Json(serde_json::json!({"status": "ok"}))
}

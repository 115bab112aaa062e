// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use saibei::labels::LabelTable;
use saibei::model::YoloBuilder;
use saibei::pipeline::Pipeline;
use saibei::server;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("监听地址: {}:{}", args.host, args.port);
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  let labels = match &args.labels {
    Some(path) => LabelTable::from_json_file(path)?,
    None => LabelTable::coco(),
  };
  info!("标签表就绪, 共 {} 个类别", labels.len());

  let model = YoloBuilder::new(&args.model)
    .confidence(args.confidence)
    .nms_threshold(args.nms_threshold)
    .build()?;

  let pipeline = Arc::new(Pipeline::new(model, labels));
  let app = server::router(pipeline, args.body_limit);

  let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("服务监听于 {}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}

async fn shutdown_signal() {
  tokio::signal::ctrl_c()
    .await
    .expect("无法安装 Ctrl-C 信号处理器");
  info!("收到中断信号，准备退出...");
}

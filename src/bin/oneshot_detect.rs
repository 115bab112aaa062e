// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/bin/oneshot_detect.rs - 单次推理工具
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use saibei::labels::LabelTable;
use saibei::model::YoloBuilder;
use saibei::pipeline::Pipeline;

/// Saibei 单次推理工具：对一张图片运行检测流水线并打印 JSON 结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: String,

  /// 输入图片文件路径
  #[arg(long, value_name = "IMAGE")]
  pub image: String,

  /// 标签表文件路径（JSON 字符串数组）
  #[arg(long, value_name = "LABELS")]
  pub labels: Option<String>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入图片: {}", args.image);

  let labels = match &args.labels {
    Some(path) => LabelTable::from_json_file(path)?,
    None => LabelTable::coco(),
  };

  let model = YoloBuilder::new(&args.model)
    .confidence(args.confidence)
    .build()?;
  let pipeline = Pipeline::new(model, labels);

  let bytes = std::fs::read(&args.image)?;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let response = pipeline.run(&bytes)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  println!("{}", serde_json::to_string_pretty(&response)?);

  Ok(())
}

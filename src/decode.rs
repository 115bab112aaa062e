// 该文件是 Saibei （塞北飞雪） 项目的一部分。
// src/decode.rs - 图像解码
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

use std::io::Cursor;

use image::{ImageReader, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输入字节为空")]
  EmptyInput,
  #[error("无法识别图像格式")]
  UnknownFormat,
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码失败: {0}")]
  Malformed(#[from] image::ImageError),
}

/// 将编码后的图像字节解码为 RGB 像素网格。
///
/// 图像格式通过内容自动识别。灰度、索引色或带透明通道的来源
/// 统一转换为 3 通道 RGB；解码失败不产生部分结果。
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
  if bytes.is_empty() {
    return Err(DecodeError::EmptyInput);
  }

  let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
  if reader.format().is_none() {
    return Err(DecodeError::UnknownFormat);
  }

  let image = reader.decode()?;
  Ok(image.to_rgb8())
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::domain_repository::RepositoryError;
use crate::engines::traits::EngineError;
use thiserror::Error;

/// Worker错误类型
///
/// 只有无法继续运行的情况才会返回给调用方，单次抓取或写入失败在工作器内部记录
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("会话创建失败: {0}")]
    Session(#[from] EngineError),

    #[error("配置错误: {0}")]
    Configuration(String),
}

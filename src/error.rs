use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 服装库的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 模型无法处理输入，比如图片损坏或格式不支持
    #[error("模型推理失败: {0}")]
    Provider(String),
    #[error("读写文件失败 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON 格式错误 {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("索引文件无效 {}: {message}", path.display())]
    Index { path: PathBuf, message: String },
    /// 向量索引与元数据的条目数不一致
    #[error("索引与元数据不一致：索引 {index} 条，元数据 {metadata} 条")]
    ConsistencyDrift { index: usize, metadata: usize },
    /// 元数据中的条目在服装库中不存在
    #[error("索引中的 {0} 不在服装库中")]
    Orphaned(String),
    #[error("条目不存在: {0}")]
    NotFound(String),
    #[error("无效的参数: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::Provider(err.to_string())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json { path: path.as_ref().to_path_buf(), source }
    }

    /// 是否为存储层（文件、JSON、索引文件）的错误
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Json { .. } | Self::Index { .. })
    }
}

impl From<opencv::Error> for Error {
    fn from(err: opencv::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

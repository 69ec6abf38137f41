use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("超出配置上限: {0}")]
    LimitExceeded(String),

    #[error("虚拟化错误: {0}")]
    Hypervisor(String),

    /// 多步扩容流程中途失败，`stage` 为失败前最后到达的状态
    #[error("磁盘扩容在 {stage} 之后中断: {source}")]
    ResizeInterrupted {
        stage: String,
        #[source]
        source: Box<Error>,
    },

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

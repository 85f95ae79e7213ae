//! 错误处理模块
//!
//! 该模块提供 Operator 的统一错误类型。变体与协调过程中的各个阶段一一对应：
//! 平台检测、拓扑缓存、镜像加载、配置单例解析、渲染、应用以及状态上报，
//! 方便在日志中定位失败的环节。

use std::io;
use thiserror::Error;

/// 任意可跨线程传递的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Operator 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 进程配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 无法读取集群基础设施元数据
    #[error("无法确定平台类型: {0}")]
    Platform(#[source] Box<Error>),

    /// 拓扑信息（VIP）获取失败
    #[error("拓扑信息错误: {message}")]
    Topology {
        message: String,
        source: Option<Box<Error>>,
    },

    /// 镜像清单加载失败或内容无效
    #[error("镜像清单无效: {message}")]
    Images {
        message: String,
        source: Option<Box<Error>>,
    },

    /// 配置单例读取或创建失败
    #[error("配置单例解析失败: {0}")]
    Resolver(#[source] Box<Error>),

    /// 模板目录渲染失败
    #[error("渲染模板目录 {dir} 失败: {source}")]
    Render {
        dir: String,
        #[source]
        source: BoxError,
    },

    /// 模板目录没有渲染出任何资源
    #[error("No manifests rendered from {dir}")]
    NoManifests { dir: String },

    /// 资源应用失败
    #[error("应用资源 {resource} 失败: {source}")]
    Apply {
        resource: String,
        #[source]
        source: Box<Error>,
    },

    /// 子系统同步失败
    #[error("同步子系统 {subsystem} 失败: {source}")]
    Sync {
        subsystem: String,
        #[source]
        source: Box<Error>,
    },

    /// 写入 ClusterOperator 状态失败
    #[error("更新 ClusterOperator 状态失败: {0}")]
    Status(#[source] Box<Error>),

    /// Kubernetes API 错误
    #[error("Kubernetes API 错误: {0}")]
    Kube(#[from] kube::Error),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

/// 统一结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 构造不带底层原因的拓扑错误
    pub fn topology(message: impl Into<String>) -> Self {
        Error::Topology {
            message: message.into(),
            source: None,
        }
    }

    /// 构造不带底层原因的镜像清单错误
    pub fn images(message: impl Into<String>) -> Self {
        Error::Images {
            message: message.into(),
            source: None,
        }
    }

    /// 是否为“模板目录未渲染出资源”错误（可能被包装在 `Sync` 中）
    pub fn is_no_manifests(&self) -> bool {
        match self {
            Error::NoManifests { .. } => true,
            Error::Sync { source, .. } => source.is_no_manifests(),
            _ => false,
        }
    }

    /// 失败的子系统名称（仅 `Sync` 错误）
    pub fn failed_subsystem(&self) -> Option<&str> {
        match self {
            Error::Sync { subsystem, .. } => Some(subsystem.as_str()),
            _ => None,
        }
    }

    /// 是否为 Kubernetes API 的 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(resp)) if resp.code == 404)
    }
}

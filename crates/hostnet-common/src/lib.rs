//! HostNet Common - 跨模块共享工具与数据结构
//!
//! 该模块提供集群托管网络服务 Operator 所有组件共享的常量、数据模型和统一的错误处理机制。
//! 命名空间、清单根目录等常量只在 `names` 模块中定义一次。

pub mod error;
pub mod models;
pub mod names;

/// 重新导出常用类型，方便使用
pub use error::Error;
pub use error::Result;
pub use models::images::*;
pub use models::platform::*;

//! 数据模型模块
//!
//! 平台类型与镜像清单，供 Operator 与测试共用。

pub mod images;
pub mod platform;

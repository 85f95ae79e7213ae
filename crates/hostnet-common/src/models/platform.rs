//! 平台类型模型
//!
//! 对应 `Infrastructure.status.platform` 的取值。只有本地部署（on-prem）平台
//! 需要由本 Operator 托管负载均衡与 DNS 服务。

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// 集群平台类型
///
/// 序列化与 [`FromStr`]/[`fmt::Display`] 共用同一套集群拼写（如 `oVirt`、`AWS`）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformType {
    /// 裸金属
    BareMetal,
    /// OpenStack
    OpenStack,
    /// vSphere
    VSphere,
    /// oVirt
    Ovirt,
    /// AWS
    Aws,
    /// Azure
    Azure,
    /// GCP
    Gcp,
    /// 无平台集成
    None,
    /// 其他未知平台，保留原始取值
    Other(String),
}

/// 启用 Operator 的平台白名单
pub const SUPPORTED_PLATFORMS: [PlatformType; 4] = [
    PlatformType::BareMetal,
    PlatformType::OpenStack,
    PlatformType::VSphere,
    PlatformType::Ovirt,
];

impl PlatformType {
    /// 是否属于本地部署平台白名单
    pub fn is_on_prem(&self) -> bool {
        SUPPORTED_PLATFORMS.contains(self)
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformType::BareMetal => write!(f, "BareMetal"),
            PlatformType::OpenStack => write!(f, "OpenStack"),
            PlatformType::VSphere => write!(f, "VSphere"),
            PlatformType::Ovirt => write!(f, "oVirt"),
            PlatformType::Aws => write!(f, "AWS"),
            PlatformType::Azure => write!(f, "Azure"),
            PlatformType::Gcp => write!(f, "GCP"),
            PlatformType::None => write!(f, "None"),
            PlatformType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for PlatformType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "BareMetal" => PlatformType::BareMetal,
            "OpenStack" => PlatformType::OpenStack,
            "VSphere" => PlatformType::VSphere,
            "oVirt" => PlatformType::Ovirt,
            "AWS" => PlatformType::Aws,
            "Azure" => PlatformType::Azure,
            "GCP" => PlatformType::Gcp,
            "None" => PlatformType::None,
            other => PlatformType::Other(other.to_string()),
        })
    }
}

impl From<String> for PlatformType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(platform) => platform,
            Err(never) => match never {},
        }
    }
}

impl From<PlatformType> for String {
    fn from(platform: PlatformType) -> Self {
        platform.to_string()
    }
}

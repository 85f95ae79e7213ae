//! 镜像清单模型
//!
//! 镜像清单由挂载的 JSON 文件提供，把各组件的逻辑名称映射到容器镜像引用。

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 各托管组件使用的容器镜像
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Images {
    /// 运行时配置辅助工具（渲染 keepalived/haproxy/coredns 配置）
    #[serde(default)]
    pub baremetal_runtime_cfg: String,
    /// keepalived
    #[serde(default)]
    pub keepalived_ipfailover: String,
    /// HAProxy
    #[serde(default)]
    pub haproxy_router: String,
    /// CoreDNS
    #[serde(default)]
    pub coredns: String,
    /// mDNS 发布器
    #[serde(default)]
    pub mdns_publisher: String,
}

impl Images {
    /// 从 JSON 文本解析并校验镜像清单
    pub fn from_json(content: &str) -> Result<Self> {
        let images: Images = serde_json::from_str(content).map_err(|e| Error::Images {
            message: "无法解析镜像清单".to_string(),
            source: Some(Box::new(Error::Json(e))),
        })?;
        images.validate()?;
        Ok(images)
    }

    /// 所有镜像引用都必须非空
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("baremetalRuntimeCfg", &self.baremetal_runtime_cfg),
            ("keepalivedIpfailover", &self.keepalived_ipfailover),
            ("haproxyRouter", &self.haproxy_router),
            ("coredns", &self.coredns),
            ("mdnsPublisher", &self.mdns_publisher),
        ]
        .iter()
        .filter(|(_, image)| image.trim().is_empty())
        .map(|(key, _)| *key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::images(format!("缺少镜像: {}", missing.join(", "))))
        }
    }
}

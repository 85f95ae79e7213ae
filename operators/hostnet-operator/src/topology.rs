//! 拓扑与镜像缓存
//!
//! VIP 在 Operator 运行期间不会变化，因此只在缓存为空时查询一次 Infrastructure；
//! 镜像清单同样只加载一次。两个缓存都只缓存成功结果，失败后保持为空，
//! 由下一次协调重新获取。缓存归协调器实例所有，不使用全局变量。

use hostnet_common::{Error, Images, Result};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::images::ImageLoader;

/// 集群拓扑信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// API 服务器内部 VIP
    pub api_server_internal_ip: String,
    /// Ingress VIP
    pub ingress_ip: String,
}

impl Topology {
    fn is_empty(&self) -> bool {
        self.api_server_internal_ip.is_empty() && self.ingress_ip.is_empty()
    }
}

/// VIP 缓存
#[derive(Debug, Default)]
pub struct TopologyCache {
    inner: Mutex<Topology>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 确保 VIP 已加载，返回当前缓存内容
    pub async fn ensure(&self, client: &dyn ClusterClient) -> Result<Topology> {
        let mut cached = self.inner.lock().await;
        if !cached.is_empty() {
            return Ok(cached.clone());
        }

        let topology = fetch_topology(client).await?;
        info!(
            api_vip = %topology.api_server_internal_ip,
            ingress_vip = %topology.ingress_ip,
            "已获取 VIP 信息"
        );
        *cached = topology.clone();
        Ok(topology)
    }

    /// 当前缓存内容（可能为空）
    pub async fn get(&self) -> Topology {
        self.inner.lock().await.clone()
    }

    /// 清空缓存，下一次 `ensure` 会重新查询
    pub async fn clear(&self) {
        *self.inner.lock().await = Topology::default();
    }
}

async fn fetch_topology(client: &dyn ClusterClient) -> Result<Topology> {
    let infra = client.get_infrastructure().await.map_err(|e| Error::Topology {
        message: "获取 VIP 信息失败".to_string(),
        source: Some(Box::new(e)),
    })?;

    let status = infra.on_prem_status().ok_or_else(|| {
        Error::topology(format!(
            "Infrastructure 中缺少平台 {:?} 的 VIP 状态",
            infra.platform_type()
        ))
    })?;

    let api_server_internal_ip = status.api_server_internal_ip.clone().unwrap_or_default();
    let ingress_ip = status.ingress_ip.clone().unwrap_or_default();
    if api_server_internal_ip.is_empty() || ingress_ip.is_empty() {
        return Err(Error::topology(format!(
            "VIP 不完整: apiServerInternalIP={:?}, ingressIP={:?}",
            api_server_internal_ip, ingress_ip
        )));
    }

    Ok(Topology {
        api_server_internal_ip,
        ingress_ip,
    })
}

/// 镜像清单缓存
#[derive(Debug, Default)]
pub struct ImageCache {
    inner: Mutex<Option<Images>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 确保镜像清单已加载。加载失败时缓存保持未加载状态
    pub async fn ensure(&self, loader: &dyn ImageLoader, path: &Path) -> Result<Images> {
        let mut cached = self.inner.lock().await;
        if let Some(images) = cached.as_ref() {
            return Ok(images.clone());
        }

        match loader.load(path) {
            Ok(images) => {
                debug!(path = %path.display(), "镜像清单已缓存");
                *cached = Some(images.clone());
                Ok(images)
            }
            Err(e) => {
                *cached = None;
                Err(e)
            }
        }
    }

    pub async fn get(&self) -> Option<Images> {
        self.inner.lock().await.clone()
    }

    pub async fn clear(&self) {
        *self.inner.lock().await = None;
    }
}

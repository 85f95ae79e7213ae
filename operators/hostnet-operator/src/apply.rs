//! 资源应用
//!
//! 通过服务端应用（server-side apply）创建或更新渲染出的资源。应用本身是 upsert，
//! 可以安全地重复执行。

use async_trait::async_trait;
use hostnet_common::names::CONTROLLER_COMPONENT_NAME;
use hostnet_common::{Error, Result};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource, Scope};
use kube::{Client, ResourceExt};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 资源应用器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectApplier: Send + Sync {
    /// 创建或更新一个资源
    async fn apply(&self, obj: &DynamicObject) -> Result<()>;
}

/// 资源的可读标识，形如 `apps/v1/DaemonSet hostnet/keepalived`
pub fn describe(obj: &DynamicObject) -> String {
    let (api_version, kind) = obj
        .types
        .as_ref()
        .map(|t| (t.api_version.as_str(), t.kind.as_str()))
        .unwrap_or(("", ""));
    match obj.namespace() {
        Some(ns) => format!("{}/{} {}/{}", api_version, kind, ns, obj.name_any()),
        None => format!("{}/{} {}", api_version, kind, obj.name_any()),
    }
}

/// 解析 apiVersion/kind
pub fn gvk_of(obj: &DynamicObject) -> Result<GroupVersionKind> {
    let types = obj
        .types
        .as_ref()
        .ok_or_else(|| Error::Unknown(format!("资源 {} 缺少 apiVersion/kind", obj.name_any())))?;

    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    if version.is_empty() || types.kind.is_empty() {
        return Err(Error::Unknown(format!(
            "资源 {} 的 apiVersion/kind 无效",
            obj.name_any()
        )));
    }

    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

/// 基于服务端应用的实现，按 GVK 缓存发现结果
pub struct ServerSideApplier {
    client: Client,
    resources: RwLock<HashMap<GroupVersionKind, (ApiResource, bool)>>,
}

impl ServerSideApplier {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
        if let Some(found) = self.resources.read().await.get(gvk) {
            return Ok(found.clone());
        }

        let (resource, caps) = discovery::pinned_kind(&self.client, gvk).await?;
        let namespaced = caps.scope == Scope::Namespaced;
        self.resources
            .write()
            .await
            .insert(gvk.clone(), (resource.clone(), namespaced));
        Ok((resource, namespaced))
    }
}

#[async_trait]
impl ObjectApplier for ServerSideApplier {
    async fn apply(&self, obj: &DynamicObject) -> Result<()> {
        let gvk = gvk_of(obj)?;
        let (resource, namespaced) = self.resolve(&gvk).await?;

        let api: Api<DynamicObject> = match (namespaced, obj.namespace()) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), &ns, &resource),
            (true, None) => Api::default_namespaced_with(self.client.clone(), &resource),
            (false, _) => Api::all_with(self.client.clone(), &resource),
        };

        let params = PatchParams::apply(CONTROLLER_COMPONENT_NAME).force();
        api.patch(&obj.name_any(), &params, &Patch::Apply(obj)).await?;

        debug!(resource = %describe(obj), "资源已应用");
        Ok(())
    }
}

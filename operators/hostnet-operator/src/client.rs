//! 集群 API 客户端抽象
//!
//! 协调核心只通过 [`ClusterClient`] 访问集群：读取 `Infrastructure`、读取/创建 `Config`
//! 单例、读写 `ClusterOperator`。生产实现基于 kube-rs，测试使用 mock 或记录型替身。

use async_trait::async_trait;
use hostnet_common::names::{CONTROLLER_COMPONENT_NAME, INFRASTRUCTURE_NAME};
use hostnet_common::Result;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

use crate::crd::Config;
use crate::openshift::{ClusterOperator, ClusterOperatorStatus, Infrastructure};

/// 协调核心使用的集群操作
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// 读取名为 `cluster` 的 Infrastructure
    async fn get_infrastructure(&self) -> Result<Infrastructure>;

    /// 读取配置单例，不存在时返回 `None`
    async fn get_config(&self, name: &str, namespace: &str) -> Result<Option<Config>>;

    /// 创建配置单例
    async fn create_config(&self, config: &Config) -> Result<Config>;

    /// 读取 ClusterOperator，不存在时返回 `None`
    async fn get_cluster_operator(&self, name: &str) -> Result<Option<ClusterOperator>>;

    /// 创建 ClusterOperator
    async fn create_cluster_operator(&self, operator: &ClusterOperator) -> Result<ClusterOperator>;

    /// 整体覆盖 ClusterOperator 的 status
    async fn update_cluster_operator_status(
        &self,
        name: &str,
        status: &ClusterOperatorStatus,
    ) -> Result<()>;
}

/// 基于 kube-rs 的客户端实现
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_infrastructure(&self) -> Result<Infrastructure> {
        let api: Api<Infrastructure> = Api::all(self.client.clone());
        Ok(api.get(INFRASTRUCTURE_NAME).await?)
    }

    async fn get_config(&self, name: &str, namespace: &str) -> Result<Option<Config>> {
        let api: Api<Config> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_config(&self, config: &Config) -> Result<Config> {
        let namespace = config.metadata.namespace.as_deref().unwrap_or_default();
        let api: Api<Config> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), config).await?)
    }

    async fn get_cluster_operator(&self, name: &str) -> Result<Option<ClusterOperator>> {
        let api: Api<ClusterOperator> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_cluster_operator(&self, operator: &ClusterOperator) -> Result<ClusterOperator> {
        let api: Api<ClusterOperator> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), operator).await?)
    }

    async fn update_cluster_operator_status(
        &self,
        name: &str,
        status: &ClusterOperatorStatus,
    ) -> Result<()> {
        let api: Api<ClusterOperator> = Api::all(self.client.clone());

        // Merge 补丁会整体替换 conditions 等数组字段
        let patch = serde_json::json!({ "status": status });
        let params = PatchParams::apply(CONTROLLER_COMPONENT_NAME);
        api.patch_status(name, &params, &Patch::Merge(&patch)).await?;

        debug!(name, "已更新 ClusterOperator 状态");
        Ok(())
    }
}

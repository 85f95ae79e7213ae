//! 资源协调模块
//!
//! 每个触发事件执行一次完整协调：
//! 平台检测 → 请求过滤 → VIP 缓存 → 配置单例 → 镜像缓存 → 状态 Syncing →
//! 同步流水线 → 状态 Complete。
//!
//! 协调器不做内部重试，所有错误交给控制器的 `error_policy` 按退避策略重新入队。

use hostnet_common::names::CONFIG_SINGLETON_NAME;
use hostnet_common::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::client::ClusterClient;
use crate::images::ImageLoader;
use crate::platform;
use crate::resolver;
use crate::status::{StatusReason, StatusReporter};
use crate::sync::{Subsystem, SyncContext, SyncPipeline};
use crate::topology::{ImageCache, TopologyCache};

/// 协调请求，以资源标识作为退避计数的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    pub name: String,
    pub namespace: String,
}

impl ReconcileRequest {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// 一次协调的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 平台不受支持，已上报 Unsupported
    Disabled,
    /// 请求不是发给配置单例的
    Ignored,
    /// 刚创建了默认配置单例，同步留给创建触发的下一次事件
    Created,
    /// 全部子系统同步完成
    Synced,
}

/// 协调器配置
#[derive(Debug, Clone, Default)]
pub struct ReconcilerSettings {
    /// Operator 所在命名空间（配置单例所在位置）
    pub operator_namespace: String,
    /// 工作负载命名空间
    pub handler_namespace: String,
    /// DNS 基础域名
    pub dns_base_domain: String,
    /// 镜像清单文件
    pub images_path: PathBuf,
}

/// 协调器
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    image_loader: Arc<dyn ImageLoader>,
    pipeline: SyncPipeline,
    status: StatusReporter,
    topology: TopologyCache,
    images: ImageCache,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        image_loader: Arc<dyn ImageLoader>,
        pipeline: SyncPipeline,
        status: StatusReporter,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            client,
            image_loader,
            pipeline,
            status,
            topology: TopologyCache::new(),
            images: ImageCache::new(),
            settings,
        }
    }

    /// 配置单例的标识
    pub fn singleton_request(&self) -> ReconcileRequest {
        ReconcileRequest::new(CONFIG_SINGLETON_NAME, &self.settings.operator_namespace)
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// 协调一次请求
    #[instrument(skip(self, request), fields(request = %request))]
    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        if !platform::is_enabled(self.client.as_ref()).await? {
            self.status
                .set_status(StatusReason::Unsupported, "Nothing to do on this Platform", "")
                .await?;
            info!("当前平台不受支持，Operator 处于禁用状态");
            return Ok(ReconcileOutcome::Disabled);
        }

        if *request != self.singleton_request() {
            debug!("忽略非配置单例的请求");
            return Ok(ReconcileOutcome::Ignored);
        }

        let topology = self.topology.ensure(self.client.as_ref()).await?;

        let (config, created) = resolver::ensure_singleton(
            self.client.as_ref(),
            &request.name,
            &request.namespace,
        )
        .await?;
        if created {
            // 创建本身会触发新的事件，由那次协调完成同步
            return Ok(ReconcileOutcome::Created);
        }

        let images = match self
            .images
            .ensure(self.image_loader.as_ref(), &self.settings.images_path)
            .await
        {
            Ok(images) => images,
            Err(e) => {
                error!(error = %e, "镜像清单内容无效");
                self.report_failure(StatusReason::InvalidConfiguration, &e).await;
                return Err(e);
            }
        };

        self.status
            .set_status(
                StatusReason::Syncing,
                "",
                "Applying Cluster hosted net services resources",
            )
            .await?;

        let ctx = SyncContext {
            handler_namespace: self.settings.handler_namespace.clone(),
            dns_base_domain: self.settings.dns_base_domain.clone(),
            topology: Some(topology),
            images: Some(images),
        };

        if let Err(e) = self.pipeline.run(&config, &ctx).await {
            error!(error = %e, "同步失败");
            let subsystem = e
                .failed_subsystem()
                .and_then(|name| Subsystem::ORDERED.into_iter().find(|s| s.name() == name));
            if let Some(subsystem) = subsystem {
                self.report_failure(StatusReason::SyncFailed(subsystem), &e).await;
            }
            return Err(e);
        }

        self.status
            .set_status(
                StatusReason::Complete,
                "Applying Cluster hosted net services resources completed",
                "",
            )
            .await?;

        info!("集群托管网络服务资源已全部应用");
        Ok(ReconcileOutcome::Synced)
    }

    /// 上报 Degraded。写入失败只记录日志，不掩盖原始错误
    async fn report_failure(&self, reason: StatusReason, cause: &Error) {
        if let Err(status_err) = self
            .status
            .set_status(reason, &cause.to_string(), "Applying Cluster hosted net services resources")
            .await
        {
            warn!(error = %status_err, %reason, "无法将 ClusterOperator 置为 Degraded");
        }
    }
}

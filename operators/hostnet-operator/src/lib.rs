//! HostNet Operator - 集群托管网络服务 Operator
//!
//! 把配置单例 `Config` 协调为一组本地部署网络支撑工作负载（keepalived、HAProxy、
//! CoreDNS、mDNS 发布器），并通过 `ClusterOperator` 状态上报整体健康度。

pub mod apply;
pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod event_handler;
pub mod images;
pub mod leader_election;
pub mod metrics;
pub mod openshift;
pub mod platform;
pub mod reconcile;
pub mod render;
pub mod resolver;
pub mod status;
pub mod sync;
pub mod topology;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use hostnet_common::names::CONFIG_SINGLETON_NAME;
use kube::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use crate::apply::ServerSideApplier;
use crate::client::{ClusterClient, KubeClusterClient};
use crate::config::OperatorConfig;
use crate::images::FileImageLoader;
use crate::metrics::OperatorMetrics;
use crate::reconcile::{Reconciler, ReconcilerSettings};
use crate::render::TemplateRenderer;
use crate::status::{StatusReason, StatusReporter};
use crate::sync::SyncPipeline;

/// Operator 主结构体
pub struct HostNetOperator {
    /// 集群客户端
    cluster: Arc<dyn ClusterClient>,
    /// 协调器配置
    settings: ReconcilerSettings,
    /// 状态上报器（启动阶段使用）
    status: Arc<StatusReporter>,
    /// 指标
    metrics: Arc<OperatorMetrics>,
    /// 指标服务器任务
    metrics_server: Option<JoinHandle<()>>,
    /// 控制器
    controller: Arc<RwLock<controller::Controller>>,
}

impl HostNetOperator {
    /// 创建新的 Operator 实例
    pub async fn new(config: &OperatorConfig, client: Client) -> Result<Self> {
        let settings = config.settings()?;
        let metrics = Arc::new(OperatorMetrics::new()?);

        let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(client.clone()));
        let new_reporter = || {
            StatusReporter::new(
                cluster.clone(),
                &config.release_version,
                &settings.operator_namespace,
                &settings.handler_namespace,
            )
            .with_metrics(metrics.clone())
        };

        let pipeline = SyncPipeline::new(
            Arc::new(TemplateRenderer::new()),
            Arc::new(ServerSideApplier::new(client.clone())),
            config.manifest_dir.clone(),
        );
        let reconciler = Arc::new(Reconciler::new(
            cluster.clone(),
            Arc::new(FileImageLoader),
            pipeline,
            new_reporter(),
            settings.clone(),
        ));
        let status = Arc::new(new_reporter());

        let controller = Arc::new(RwLock::new(controller::Controller::new(
            client,
            reconciler,
            Some(metrics.clone()),
        )));

        Ok(Self {
            cluster,
            settings,
            status,
            metrics,
            metrics_server: None,
            controller,
        })
    }

    /// 启动指标服务器
    pub fn serve_metrics(&mut self, addr: std::net::SocketAddr) -> Result<()> {
        self.metrics_server = Some(self.metrics.serve(addr)?);
        Ok(())
    }

    /// 启动 Operator：平台检测、创建默认配置单例、启动控制器
    pub async fn start(&self) -> Result<()> {
        let enabled = platform::is_enabled(self.cluster.as_ref())
            .await
            .context("无法检测集群平台类型")?;

        if enabled {
            let (_, created) = resolver::ensure_singleton(
                self.cluster.as_ref(),
                CONFIG_SINGLETON_NAME,
                &self.settings.operator_namespace,
            )
            .await
            .context("无法创建默认配置单例")?;
            if created {
                info!("已在启动时创建默认配置单例");
            }
        } else {
            self.status
                .set_status(StatusReason::Unsupported, "Nothing to do on this Platform", "")
                .await
                .context("无法上报 Unsupported 状态")?;
            info!("当前平台不受支持，Operator 以禁用状态运行");
        }

        self.controller.write().await.start();
        Ok(())
    }

    /// 停止 Operator
    pub async fn stop(&mut self) -> Result<()> {
        self.controller.write().await.stop().await;

        if let Some(server) = self.metrics_server.take() {
            server.abort();
        }
        Ok(())
    }
}

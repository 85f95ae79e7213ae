//! 同步流水线
//!
//! 按固定顺序为每个托管子系统执行“渲染并应用”：
//! namespace → RBAC → keepalived → HAProxy → mDNS → CoreDNS。
//! 命名空间和 RBAC 必须先于守护进程存在；keepalived/HAProxy 管理 VIP，
//! 名称解析相关的 mDNS/CoreDNS 依赖这些 VIP，因此排在最后。
//!
//! 流水线在第一个失败的子系统处停止，不回滚也不重排；下一次协调会完整重跑，
//! 渲染是确定性的，应用是 upsert，重跑是安全的。

use hostnet_common::names::MANIFEST_SUBDIR;
use hostnet_common::{Error, Images, Result};
use kube::ResourceExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::apply::{describe, ObjectApplier};
use crate::crd::Config;
use crate::render::{ManifestRenderer, RenderData};
use crate::topology::Topology;

/// 托管子系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Namespace,
    Rbac,
    Keepalived,
    Haproxy,
    Mdns,
    CoreDns,
}

impl Subsystem {
    /// 同步顺序
    pub const ORDERED: [Subsystem; 6] = [
        Subsystem::Namespace,
        Subsystem::Rbac,
        Subsystem::Keepalived,
        Subsystem::Haproxy,
        Subsystem::Mdns,
        Subsystem::CoreDns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Namespace => "namespace",
            Subsystem::Rbac => "rbac",
            Subsystem::Keepalived => "keepalived",
            Subsystem::Haproxy => "haproxy",
            Subsystem::Mdns => "mdns",
            Subsystem::CoreDns => "coredns",
        }
    }

    /// 状态原因前缀，例如 `KeepalivedSyncFailed`
    pub fn reason_prefix(self) -> &'static str {
        match self {
            Subsystem::Namespace => "Namespace",
            Subsystem::Rbac => "Rbac",
            Subsystem::Keepalived => "Keepalived",
            Subsystem::Haproxy => "Haproxy",
            Subsystem::Mdns => "Mdns",
            Subsystem::CoreDns => "CoreDns",
        }
    }

    /// 模板目录，按顺序渲染（ConfigMap 先于 DaemonSet）
    pub fn template_dirs(self) -> &'static [&'static str] {
        match self {
            Subsystem::Namespace => &["namespace"],
            Subsystem::Rbac => &["rbac"],
            Subsystem::Keepalived => &["keepalived-configmap", "keepalived-daemonset"],
            Subsystem::Haproxy => &["haproxy-configmap", "haproxy-daemonset"],
            Subsystem::Mdns => &["mdns-configmap", "mdns-daemonset"],
            Subsystem::CoreDns => &["coredns-configmap", "coredns-daemonset"],
        }
    }

    /// 守护进程子系统需要 VIP 与镜像，命名空间与 RBAC 不需要
    fn needs_workload_inputs(self) -> bool {
        !matches!(self, Subsystem::Namespace | Subsystem::Rbac)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 构建渲染上下文所需的输入
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    /// 工作负载命名空间
    pub handler_namespace: String,
    /// CoreDNS 使用的基础域名
    pub dns_base_domain: String,
    /// VIP，命名空间与 RBAC 之外的子系统必需
    pub topology: Option<Topology>,
    /// 镜像，命名空间与 RBAC 之外的子系统必需
    pub images: Option<Images>,
}

/// 为子系统构建渲染上下文
pub fn render_data(subsystem: Subsystem, config: &Config, ctx: &SyncContext) -> Result<RenderData> {
    let mut data = RenderData::new();
    data.insert("HandlerNamespace", ctx.handler_namespace.as_str());

    let spec = &config.spec;
    data.insert("ApiLoadbalance", spec.load_balancer.api_loadbalance.is_enabled())
        .insert("DefaultIngressHA", spec.load_balancer.default_ingress_ha.is_enabled())
        .insert("NodesResolution", spec.dns.nodes_resolution.is_enabled())
        .insert("ApiResolution", spec.dns.api_resolution.is_enabled())
        .insert("AppsResolution", spec.dns.apps_resolution.is_enabled());

    if !subsystem.needs_workload_inputs() {
        return Ok(data);
    }

    let topology = ctx.topology.as_ref().ok_or_else(|| {
        Error::topology(format!("子系统 {} 需要 VIP 信息", subsystem))
    })?;
    data.insert(
        "OnPremPlatformAPIServerInternalIP",
        topology.api_server_internal_ip.as_str(),
    )
    .insert("OnPremPlatformIngressIP", topology.ingress_ip.as_str());

    let images = ctx
        .images
        .as_ref()
        .ok_or_else(|| Error::images(format!("子系统 {} 需要镜像清单", subsystem)))?;
    data.insert("BaremetalRuntimeCfgImage", images.baremetal_runtime_cfg.as_str());

    match subsystem {
        Subsystem::Keepalived => {
            data.insert("KeepalivedImage", images.keepalived_ipfailover.as_str());
        }
        Subsystem::Haproxy => {
            data.insert("HaproxyImage", images.haproxy_router.as_str());
        }
        Subsystem::Mdns => {
            data.insert("MdnsPublisherImage", images.mdns_publisher.as_str());
        }
        Subsystem::CoreDns => {
            data.insert("CorednsImage", images.coredns.as_str())
                .insert("DnsBaseDomain", ctx.dns_base_domain.as_str());
        }
        Subsystem::Namespace | Subsystem::Rbac => {}
    }

    Ok(data)
}

/// 渲染并应用流水线
pub struct SyncPipeline {
    renderer: Arc<dyn ManifestRenderer>,
    applier: Arc<dyn ObjectApplier>,
    manifest_root: PathBuf,
}

impl SyncPipeline {
    pub fn new(
        renderer: Arc<dyn ManifestRenderer>,
        applier: Arc<dyn ObjectApplier>,
        manifest_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            applier,
            manifest_root: manifest_root.into(),
        }
    }

    /// 模板目录的完整路径
    pub fn template_dir(&self, dir: &str) -> PathBuf {
        self.manifest_root.join(MANIFEST_SUBDIR).join(dir)
    }

    /// 按固定顺序同步全部子系统，遇到第一个错误即停止
    pub async fn run(&self, config: &Config, ctx: &SyncContext) -> Result<()> {
        for subsystem in Subsystem::ORDERED {
            self.sync(subsystem, config, ctx).await?;
        }
        Ok(())
    }

    /// 同步单个子系统，错误包装为 [`Error::Sync`]
    pub async fn sync(&self, subsystem: Subsystem, config: &Config, ctx: &SyncContext) -> Result<()> {
        info!(%subsystem, "同步子系统");
        self.sync_inner(subsystem, config, ctx)
            .await
            .map_err(|e| Error::Sync {
                subsystem: subsystem.name().to_string(),
                source: Box::new(e),
            })
    }

    async fn sync_inner(&self, subsystem: Subsystem, config: &Config, ctx: &SyncContext) -> Result<()> {
        let data = render_data(subsystem, config, ctx)?;
        for dir in subsystem.template_dirs() {
            self.render_and_apply(&data, &self.template_dir(dir)).await?;
        }
        Ok(())
    }

    async fn render_and_apply(&self, data: &RenderData, dir: &Path) -> Result<()> {
        let objects = self.renderer.render_dir(dir, data)?;
        if objects.is_empty() {
            return Err(Error::NoManifests {
                dir: dir.display().to_string(),
            });
        }

        for obj in &objects {
            // 嵌套模板可能产生空对象，跳过没有名称的资源
            if obj.name_any().is_empty() {
                debug!(dir = %dir.display(), "跳过空资源");
                continue;
            }

            self.applier.apply(obj).await.map_err(|e| Error::Apply {
                resource: describe(obj),
                source: Box::new(e),
            })?;
        }

        Ok(())
    }
}

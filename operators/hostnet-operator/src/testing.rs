//! 测试替身
//!
//! 记录型的集群客户端、渲染器与应用器，便于断言调用顺序和次数。

use async_trait::async_trait;
use hostnet_common::{Error, Images, PlatformType, Result};
use kube::api::DynamicObject;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::apply::{describe, ObjectApplier};
use crate::client::ClusterClient;
use crate::crd::Config;
use crate::openshift::{
    ClusterOperator, ClusterOperatorStatus, Infrastructure, InfrastructureSpec,
    InfrastructureStatus, OnPremPlatformStatus, PlatformStatus,
};
use crate::render::{ManifestRenderer, RenderData};

/// 构造 Infrastructure，VIP 写入对应平台的状态块
pub fn infrastructure(platform: &str, api_vip: &str, ingress_vip: &str) -> Infrastructure {
    let platform: PlatformType = platform.parse().unwrap();
    let vips = OnPremPlatformStatus {
        api_server_internal_ip: Some(api_vip.to_string()),
        ingress_ip: Some(ingress_vip.to_string()),
    };

    let mut platform_status = PlatformStatus {
        type_: Some(platform.clone()),
        ..Default::default()
    };
    match platform {
        PlatformType::BareMetal => platform_status.bare_metal = Some(vips),
        PlatformType::OpenStack => platform_status.openstack = Some(vips),
        PlatformType::VSphere => platform_status.vsphere = Some(vips),
        PlatformType::Ovirt => platform_status.ovirt = Some(vips),
        _ => {}
    }

    let mut infra = Infrastructure::new("cluster", InfrastructureSpec::default());
    infra.status = Some(InfrastructureStatus {
        platform: Some(platform),
        platform_status: Some(platform_status),
    });
    infra
}

pub fn test_images() -> Images {
    Images {
        baremetal_runtime_cfg: "registry/runtimecfg:1".to_string(),
        keepalived_ipfailover: "registry/keepalived:1".to_string(),
        haproxy_router: "registry/haproxy:1".to_string(),
        coredns: "registry/coredns:1".to_string(),
        mdns_publisher: "registry/mdns:1".to_string(),
    }
}

pub fn dynamic_object(api_version: &str, kind: &str, name: &str, namespace: Option<&str>) -> DynamicObject {
    let mut metadata = serde_json::json!({});
    if !name.is_empty() {
        metadata["name"] = name.into();
    }
    if let Some(ns) = namespace {
        metadata["namespace"] = ns.into();
    }
    serde_json::from_value(serde_json::json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": metadata,
    }))
    .unwrap()
}

/// 内存中的集群
pub struct FakeCluster {
    infrastructure: Infrastructure,
    configs: Mutex<HashMap<(String, String), Config>>,
    operator: Mutex<Option<ClusterOperator>>,
    statuses: Mutex<Vec<ClusterOperatorStatus>>,
    infrastructure_reads: AtomicUsize,
    config_reads: AtomicUsize,
    configs_created: AtomicUsize,
    operators_created: AtomicUsize,
    fail_infrastructure: AtomicBool,
    fail_status: AtomicBool,
}

impl FakeCluster {
    pub fn new(platform: &str, api_vip: &str, ingress_vip: &str) -> Self {
        Self {
            infrastructure: infrastructure(platform, api_vip, ingress_vip),
            configs: Mutex::new(HashMap::new()),
            operator: Mutex::new(None),
            statuses: Mutex::new(Vec::new()),
            infrastructure_reads: AtomicUsize::new(0),
            config_reads: AtomicUsize::new(0),
            configs_created: AtomicUsize::new(0),
            operators_created: AtomicUsize::new(0),
            fail_infrastructure: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
        }
    }

    /// 预置默认配置单例
    pub fn with_config(self, namespace: &str) -> Self {
        let config = Config::default_singleton(namespace);
        self.configs
            .lock()
            .unwrap()
            .insert((namespace.to_string(), config.name_any()), config);
        self
    }

    pub fn fail_status_writes(&self) {
        self.fail_status.store(true, Ordering::SeqCst);
    }

    pub fn fail_infrastructure_reads(&self) {
        self.fail_infrastructure.store(true, Ordering::SeqCst);
    }

    pub fn infrastructure_reads(&self) -> usize {
        self.infrastructure_reads.load(Ordering::SeqCst)
    }

    pub fn config_reads(&self) -> usize {
        self.config_reads.load(Ordering::SeqCst)
    }

    pub fn configs_created(&self) -> usize {
        self.configs_created.load(Ordering::SeqCst)
    }

    pub fn cluster_operators_created(&self) -> usize {
        self.operators_created.load(Ordering::SeqCst)
    }

    pub fn last_status(&self) -> Option<ClusterOperatorStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }

    /// 每次写入状态时第一个带原因的条件的原因
    pub fn status_reasons(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| s.conditions.iter().find_map(|c| c.reason.clone()))
            .collect()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_infrastructure(&self) -> Result<Infrastructure> {
        self.infrastructure_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_infrastructure.load(Ordering::SeqCst) {
            return Err(Error::Unknown("infrastructure unavailable".to_string()));
        }
        Ok(self.infrastructure.clone())
    }

    async fn get_config(&self, name: &str, namespace: &str) -> Result<Option<Config>> {
        self.config_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .configs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_config(&self, config: &Config) -> Result<Config> {
        self.configs_created.fetch_add(1, Ordering::SeqCst);
        let key = (config.namespace().unwrap_or_default(), config.name_any());
        self.configs.lock().unwrap().insert(key, config.clone());
        Ok(config.clone())
    }

    async fn get_cluster_operator(&self, _name: &str) -> Result<Option<ClusterOperator>> {
        Ok(self.operator.lock().unwrap().clone())
    }

    async fn create_cluster_operator(&self, operator: &ClusterOperator) -> Result<ClusterOperator> {
        self.operators_created.fetch_add(1, Ordering::SeqCst);
        *self.operator.lock().unwrap() = Some(operator.clone());
        Ok(operator.clone())
    }

    async fn update_cluster_operator_status(
        &self,
        _name: &str,
        status: &ClusterOperatorStatus,
    ) -> Result<()> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Error::Unknown("status write rejected".to_string()));
        }
        if let Some(operator) = self.operator.lock().unwrap().as_mut() {
            operator.status = Some(status.clone());
        }
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// 记录渲染过的目录名，每个目录产出一个名为 `<dir>-0` 的 ConfigMap
#[derive(Default)]
pub struct RecordingRenderer {
    dirs: Mutex<Vec<String>>,
    empty: HashSet<String>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定目录渲染出零个资源
    pub fn with_empty(mut self, dir: &str) -> Self {
        self.empty.insert(dir.to_string());
        self
    }

    pub fn dirs(&self) -> Vec<String> {
        self.dirs.lock().unwrap().clone()
    }
}

impl ManifestRenderer for RecordingRenderer {
    fn render_dir(&self, dir: &Path, _data: &RenderData) -> Result<Vec<DynamicObject>> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dirs.lock().unwrap().push(name.clone());

        if self.empty.contains(&name) {
            return Ok(Vec::new());
        }
        Ok(vec![dynamic_object(
            "v1",
            "ConfigMap",
            &format!("{}-0", name),
            Some("hostnet-workloads"),
        )])
    }
}

/// 记录应用过的资源名称，可指定某个资源应用失败
#[derive(Default)]
pub struct RecordingApplier {
    applied: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, name: &str) -> Self {
        self.fail_on = Some(name.to_string());
        self
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectApplier for RecordingApplier {
    async fn apply(&self, obj: &DynamicObject) -> Result<()> {
        let name = obj.name_any();
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(Error::Unknown(format!("apply rejected: {}", describe(obj))));
        }
        self.applied.lock().unwrap().push(name);
        Ok(())
    }
}

//! OpenShift 配置 API 类型
//!
//! Operator 只读取 `Infrastructure`，只写入 `ClusterOperator`。这里仅定义用到的字段，
//! 其余字段在反序列化时忽略。两者都是集群级资源，由平台自身注册 CRD。

use hostnet_common::PlatformType;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// 集群基础设施规范（Operator 不关心其内容）
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Infrastructure",
    status = "InfrastructureStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_spec: Option<serde_json::Value>,
}

/// 集群基础设施状态
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// 旧版平台字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformType>,

    /// 平台相关状态
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_status: Option<PlatformStatus>,
}

/// 各平台的状态块
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<PlatformType>,

    #[serde(default, rename = "baremetal", skip_serializing_if = "Option::is_none")]
    pub bare_metal: Option<OnPremPlatformStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OnPremPlatformStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<OnPremPlatformStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovirt: Option<OnPremPlatformStatus>,
}

/// 本地部署平台共有的 VIP 字段
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct OnPremPlatformStatus {
    #[serde(default, rename = "apiServerInternalIP", skip_serializing_if = "Option::is_none")]
    pub api_server_internal_ip: Option<String>,

    #[serde(default, rename = "ingressIP", skip_serializing_if = "Option::is_none")]
    pub ingress_ip: Option<String>,
}

impl Infrastructure {
    /// 集群平台类型。优先使用 `status.platform`，其次 `status.platformStatus.type`
    pub fn platform_type(&self) -> Option<PlatformType> {
        let status = self.status.as_ref()?;
        status
            .platform
            .clone()
            .or_else(|| status.platform_status.as_ref()?.type_.clone())
    }

    /// 当前平台对应的 VIP 状态块
    pub fn on_prem_status(&self) -> Option<&OnPremPlatformStatus> {
        let platform_status = self.status.as_ref()?.platform_status.as_ref()?;
        match self.platform_type()? {
            PlatformType::BareMetal => platform_status.bare_metal.as_ref(),
            PlatformType::OpenStack => platform_status.openstack.as_ref(),
            PlatformType::VSphere => platform_status.vsphere.as_ref(),
            PlatformType::Ovirt => platform_status.ovirt.as_ref(),
            _ => None,
        }
    }
}

/// ClusterOperator 规范为空
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "ClusterOperator",
    status = "ClusterOperatorStatus",
    schema = "disabled"
)]
pub struct ClusterOperatorSpec {}

/// Operator 健康状态
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterOperatorStatusCondition>,

    #[serde(default)]
    pub versions: Vec<OperandVersion>,

    #[serde(default)]
    pub related_objects: Vec<ObjectReference>,
}

/// 状态条件
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatusCondition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 条件取值
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// 组件版本
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}

/// 相关对象引用
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectReference {
    pub group: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

//! 自定义资源定义模块
//!
//! 定义 Operator 监听的 `Config` 单例资源。每个集群只有一个有意义的实例，
//! 名称固定为 `net-configuration`，位于 Operator 所在命名空间。

use hostnet_common::names::CONFIG_SINGLETON_NAME;
use kube::core::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 集群托管网络服务配置规范
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[kube(
    group = "cluster-hosted-net-services.openshift.io",
    version = "v1beta1",
    kind = "Config",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// 负载均衡配置
    #[serde(default)]
    pub load_balancer: HaLoadBalanceConfig,

    /// DNS 解析配置
    #[serde(default)]
    pub dns: DnsConfig,
}

/// 负载均衡开关
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HaLoadBalanceConfig {
    /// 默认 Ingress 的高可用 VIP
    #[serde(default, rename = "defaultIngressHA")]
    pub default_ingress_ha: Toggle,

    /// API 服务器负载均衡
    #[serde(default)]
    pub api_loadbalance: Toggle,
}

/// DNS 解析开关
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// 节点名称解析
    #[serde(default)]
    pub nodes_resolution: Toggle,

    /// API 域名解析
    #[serde(default)]
    pub api_resolution: Toggle,

    /// 应用（*.apps）域名解析
    #[serde(default)]
    pub apps_resolution: Toggle,
}

/// 功能开关
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum Toggle {
    #[default]
    Enable,
    Disable,
}

impl Toggle {
    pub fn is_enabled(self) -> bool {
        self == Toggle::Enable
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toggle::Enable => write!(f, "Enable"),
            Toggle::Disable => write!(f, "Disable"),
        }
    }
}

impl ConfigSpec {
    /// 所有负载均衡与 DNS 功能全部开启的默认规范
    pub fn enabled() -> Self {
        Self {
            load_balancer: HaLoadBalanceConfig {
                default_ingress_ha: Toggle::Enable,
                api_loadbalance: Toggle::Enable,
            },
            dns: DnsConfig {
                nodes_resolution: Toggle::Enable,
                api_resolution: Toggle::Enable,
                apps_resolution: Toggle::Enable,
            },
        }
    }
}

impl Config {
    /// 构造位于指定命名空间的默认配置单例
    pub fn default_singleton(namespace: &str) -> Self {
        Config {
            metadata: ObjectMeta {
                name: Some(CONFIG_SINGLETON_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: ConfigSpec::enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::ResourceExt;

    #[test]
    fn test_default_singleton() {
        let config = Config::default_singleton("openshift-cluster-hosted");
        assert_eq!(config.name_any(), "net-configuration");
        assert_eq!(config.namespace().as_deref(), Some("openshift-cluster-hosted"));
        assert!(config.spec.load_balancer.api_loadbalance.is_enabled());
        assert!(config.spec.load_balancer.default_ingress_ha.is_enabled());
        assert!(config.spec.dns.nodes_resolution.is_enabled());
        assert!(config.spec.dns.api_resolution.is_enabled());
        assert!(config.spec.dns.apps_resolution.is_enabled());
    }

    #[test]
    fn test_spec_wire_format() {
        let value = serde_json::to_value(ConfigSpec::enabled()).unwrap();
        assert_eq!(value["loadBalancer"]["defaultIngressHA"], "Enable");
        assert_eq!(value["loadBalancer"]["apiLoadbalance"], "Enable");
        assert_eq!(value["dns"]["appsResolution"], "Enable");

        let spec: ConfigSpec =
            serde_json::from_value(serde_json::json!({"dns": {"apiResolution": "Disable"}})).unwrap();
        assert!(!spec.dns.api_resolution.is_enabled());
        assert!(spec.dns.nodes_resolution.is_enabled());
    }
}

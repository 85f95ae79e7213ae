//! 配置管理模块
//!
//! 命令行参数与环境变量（同名大写）共同构成进程配置，校验后生成协调器配置。

use clap::{Parser, ValueEnum};
use hostnet_common::names::{env, DEFAULT_IMAGES_JSON, MANIFEST_DIR};
use hostnet_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::reconcile::ReconcilerSettings;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Operator 配置
#[derive(Debug, Clone, Parser)]
#[command(name = "cluster-hosted-net-services-operator", version, about)]
pub struct OperatorConfig {
    /// 指标服务器监听地址
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,

    /// 是否启用主节点选举
    #[arg(long, env = "ENABLE_LEADER_ELECTION", default_value_t = false)]
    pub enable_leader_election: bool,

    /// 镜像清单文件
    #[arg(long, env = "IMAGES_JSON", default_value = DEFAULT_IMAGES_JSON)]
    pub images_json: PathBuf,

    /// 清单模板根目录
    #[arg(long, env = "MANIFEST_DIR", default_value = MANIFEST_DIR)]
    pub manifest_dir: PathBuf,

    /// Operator 所在命名空间
    #[arg(long, env = env::COMPONENT_NAMESPACE, default_value = "")]
    pub component_namespace: String,

    /// 工作负载命名空间
    #[arg(long, env = env::HANDLER_NAMESPACE, default_value = "")]
    pub handler_namespace: String,

    /// DNS 基础域名
    #[arg(long, env = env::DNS_BASE_DOMAIN, default_value = "")]
    pub dns_base_domain: String,

    /// 发布版本，写入 ClusterOperator 的 versions
    #[arg(long, env = env::RELEASE_VERSION, default_value = "")]
    pub release_version: String,

    /// 日志格式
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// 校验并生成协调器配置
    pub fn settings(&self) -> Result<ReconcilerSettings> {
        if self.component_namespace.trim().is_empty() {
            return Err(Error::Config(format!(
                "必须通过 --component-namespace 或 {} 指定 Operator 所在命名空间",
                env::COMPONENT_NAMESPACE
            )));
        }

        Ok(ReconcilerSettings {
            operator_namespace: self.component_namespace.clone(),
            handler_namespace: self.handler_namespace.clone(),
            dns_base_domain: self.dns_base_domain.clone(),
            images_path: self.images_json.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> OperatorConfig {
        let mut argv = vec!["operator"];
        argv.extend_from_slice(args);
        OperatorConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&["--component-namespace", "hostnet"]);
        assert_eq!(cfg.metrics_addr, "0.0.0.0:8080".parse().unwrap());
        assert!(!cfg.enable_leader_election);
        assert_eq!(cfg.manifest_dir, PathBuf::from("./bindata"));
        assert_eq!(cfg.images_json, PathBuf::from(DEFAULT_IMAGES_JSON));
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn test_settings() {
        let cfg = parse(&[
            "--component-namespace",
            "hostnet",
            "--handler-namespace",
            "hostnet-workloads",
            "--dns-base-domain",
            "example.com",
            "--images-json",
            "/tmp/images.json",
            "--log-format",
            "json",
        ]);
        let settings = cfg.settings().unwrap();
        assert_eq!(settings.operator_namespace, "hostnet");
        assert_eq!(settings.handler_namespace, "hostnet-workloads");
        assert_eq!(settings.dns_base_domain, "example.com");
        assert_eq!(settings.images_path, PathBuf::from("/tmp/images.json"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_namespace_is_config_error() {
        let cfg = parse(&["--component-namespace", ""]);
        assert!(matches!(cfg.settings(), Err(Error::Config(_))));
    }
}

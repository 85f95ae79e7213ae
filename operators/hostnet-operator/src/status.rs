//! ClusterOperator 状态上报
//!
//! 每次写入都从默认条件重新计算整份状态，不保留任何本地状态机。
//! 只有条件取值发生变化时才更新 `lastTransitionTime`。

use chrono::Utc;
use hostnet_common::names::{CLUSTER_OPERATOR_NAME, CONFIG_SINGLETON_NAME};
use hostnet_common::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ObjectMeta;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::metrics::OperatorMetrics;
use crate::openshift::{
    ClusterOperator, ClusterOperatorSpec, ClusterOperatorStatus, ClusterOperatorStatusCondition,
    ConditionStatus, ObjectReference, OperandVersion,
};
use crate::sync::Subsystem;

/// 条件类型
pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_DEGRADED: &str = "Degraded";
pub const CONDITION_UPGRADEABLE: &str = "Upgradeable";
pub const CONDITION_DISABLED: &str = "Disabled";

/// 状态原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    /// 当前平台不需要本 Operator
    Unsupported,
    /// 正在应用资源
    Syncing,
    /// 全部资源应用完成
    Complete,
    /// 配置（如镜像清单）无效
    InvalidConfiguration,
    /// 某个子系统同步失败
    SyncFailed(Subsystem),
}

impl StatusReason {
    fn is_failure(self) -> bool {
        matches!(
            self,
            StatusReason::InvalidConfiguration | StatusReason::SyncFailed(_)
        )
    }
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReason::Unsupported => write!(f, "Unsupported"),
            StatusReason::Syncing => write!(f, "Syncing"),
            StatusReason::Complete => write!(f, "Complete"),
            StatusReason::InvalidConfiguration => write!(f, "InvalidConfiguration"),
            StatusReason::SyncFailed(subsystem) => write!(f, "{}SyncFailed", subsystem.reason_prefix()),
        }
    }
}

/// ClusterOperator 状态上报器
pub struct StatusReporter {
    client: Arc<dyn ClusterClient>,
    release_version: String,
    related_objects: Vec<ObjectReference>,
    metrics: Option<Arc<OperatorMetrics>>,
}

impl StatusReporter {
    /// `operator_namespace` 与 `handler_namespace` 会出现在 relatedObjects 中
    pub fn new(
        client: Arc<dyn ClusterClient>,
        release_version: &str,
        operator_namespace: &str,
        handler_namespace: &str,
    ) -> Self {
        let mut related_objects = vec![ObjectReference {
            group: String::new(),
            resource: "namespaces".to_string(),
            namespace: String::new(),
            name: operator_namespace.to_string(),
        }];
        if !handler_namespace.is_empty() && handler_namespace != operator_namespace {
            related_objects.push(ObjectReference {
                group: String::new(),
                resource: "namespaces".to_string(),
                namespace: String::new(),
                name: handler_namespace.to_string(),
            });
        }
        related_objects.push(ObjectReference {
            group: "cluster-hosted-net-services.openshift.io".to_string(),
            resource: "configs".to_string(),
            namespace: operator_namespace.to_string(),
            name: CONFIG_SINGLETON_NAME.to_string(),
        });

        Self {
            client,
            release_version: release_version.to_string(),
            related_objects,
            metrics: None,
        }
    }

    /// 按原因统计状态写入
    pub fn with_metrics(mut self, metrics: Arc<OperatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 写入状态。`message` 用于 Available/Degraded/Disabled，`detail` 用于 Progressing
    pub async fn set_status(&self, reason: StatusReason, message: &str, detail: &str) -> Result<()> {
        self.write(reason, message, detail)
            .await
            .map_err(|e| Error::Status(Box::new(e)))
    }

    async fn write(&self, reason: StatusReason, message: &str, detail: &str) -> Result<()> {
        let operator = self.get_or_create().await?;
        let previous = operator.status.unwrap_or_default();

        let mut conditions = compute_conditions(reason, message, detail);
        carry_transition_times(&mut conditions, &previous.conditions);

        let mut versions = Vec::new();
        if !self.release_version.is_empty() {
            versions.push(OperandVersion {
                name: "operator".to_string(),
                version: self.release_version.clone(),
            });
        }

        let status = ClusterOperatorStatus {
            conditions,
            versions,
            related_objects: self.related_objects.clone(),
        };

        if status == previous {
            debug!(%reason, "ClusterOperator 状态未变化，跳过写入");
            return Ok(());
        }
        self.client
            .update_cluster_operator_status(CLUSTER_OPERATOR_NAME, &status)
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.observe_status_write(&reason.to_string());
        }
        info!(%reason, message, detail, "已更新 ClusterOperator 状态");
        Ok(())
    }

    async fn get_or_create(&self) -> Result<ClusterOperator> {
        if let Some(existing) = self.client.get_cluster_operator(CLUSTER_OPERATOR_NAME).await? {
            return Ok(existing);
        }

        let operator = ClusterOperator {
            metadata: ObjectMeta {
                name: Some(CLUSTER_OPERATOR_NAME.to_string()),
                ..Default::default()
            },
            spec: ClusterOperatorSpec {},
            status: None,
        };
        info!(name = CLUSTER_OPERATOR_NAME, "创建 ClusterOperator");
        self.client.create_cluster_operator(&operator).await
    }
}

fn condition(type_: &str, status: bool, reason: &str, message: &str) -> ClusterOperatorStatusCondition {
    ClusterOperatorStatusCondition {
        type_: type_.to_string(),
        status: status.into(),
        last_transition_time: None,
        reason: (!reason.is_empty()).then(|| reason.to_string()),
        message: (!message.is_empty()).then(|| message.to_string()),
    }
}

fn default_conditions() -> Vec<ClusterOperatorStatusCondition> {
    vec![
        condition(CONDITION_AVAILABLE, false, "", ""),
        condition(CONDITION_PROGRESSING, false, "", ""),
        condition(CONDITION_DEGRADED, false, "", ""),
        condition(CONDITION_UPGRADEABLE, true, "", ""),
        condition(CONDITION_DISABLED, false, "", ""),
    ]
}

fn set_condition(
    conditions: &mut [ClusterOperatorStatusCondition],
    type_: &str,
    status: bool,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        *existing = condition(type_, status, reason, message);
    }
}

/// 根据原因计算完整的条件列表
pub fn compute_conditions(
    reason: StatusReason,
    message: &str,
    detail: &str,
) -> Vec<ClusterOperatorStatusCondition> {
    let mut conditions = default_conditions();
    let reason_str = reason.to_string();

    match reason {
        StatusReason::Unsupported => {
            set_condition(&mut conditions, CONDITION_DISABLED, true, &reason_str, message);
            set_condition(&mut conditions, CONDITION_AVAILABLE, true, &reason_str, message);
        }
        StatusReason::Syncing => {
            set_condition(&mut conditions, CONDITION_PROGRESSING, true, &reason_str, detail);
        }
        StatusReason::Complete => {
            set_condition(&mut conditions, CONDITION_AVAILABLE, true, &reason_str, message);
            set_condition(&mut conditions, CONDITION_PROGRESSING, false, &reason_str, message);
        }
        _ if reason.is_failure() => {
            set_condition(&mut conditions, CONDITION_DEGRADED, true, &reason_str, message);
            set_condition(&mut conditions, CONDITION_PROGRESSING, true, &reason_str, detail);
        }
        _ => {}
    }

    conditions
}

/// 条件取值未变化时沿用原来的 lastTransitionTime
fn carry_transition_times(
    conditions: &mut [ClusterOperatorStatusCondition],
    previous: &[ClusterOperatorStatusCondition],
) {
    let now = Time(Utc::now());
    for cond in conditions.iter_mut() {
        cond.last_transition_time = previous
            .iter()
            .find(|p| p.type_ == cond.type_ && p.status == cond.status)
            .and_then(|p| p.last_transition_time.clone())
            .or_else(|| Some(now.clone()));
    }
}

/// 便于测试与日志：取出指定条件
pub fn find_condition<'a>(
    conditions: &'a [ClusterOperatorStatusCondition],
    type_: &str,
) -> Option<&'a ClusterOperatorStatusCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

impl ClusterOperatorStatus {
    /// 指定条件是否为 True
    pub fn is_true(&self, type_: &str) -> bool {
        find_condition(&self.conditions, type_)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;
    use chrono::TimeZone;

    fn status_of(conditions: &[ClusterOperatorStatusCondition], type_: &str) -> ConditionStatus {
        find_condition(conditions, type_).unwrap().status
    }

    #[test]
    fn test_unsupported_is_disabled_and_available() {
        let conds = compute_conditions(StatusReason::Unsupported, "Nothing to do on this Platform", "");
        assert_eq!(status_of(&conds, CONDITION_DISABLED), ConditionStatus::True);
        assert_eq!(status_of(&conds, CONDITION_AVAILABLE), ConditionStatus::True);
        assert_eq!(status_of(&conds, CONDITION_DEGRADED), ConditionStatus::False);
        assert_eq!(
            find_condition(&conds, CONDITION_DISABLED).unwrap().reason.as_deref(),
            Some("Unsupported")
        );
    }

    #[test]
    fn test_syncing_then_complete() {
        let conds = compute_conditions(StatusReason::Syncing, "", "Applying resources");
        assert_eq!(status_of(&conds, CONDITION_PROGRESSING), ConditionStatus::True);
        assert_eq!(status_of(&conds, CONDITION_AVAILABLE), ConditionStatus::False);
        assert_eq!(
            find_condition(&conds, CONDITION_PROGRESSING).unwrap().message.as_deref(),
            Some("Applying resources")
        );

        let conds = compute_conditions(StatusReason::Complete, "done", "");
        assert_eq!(status_of(&conds, CONDITION_AVAILABLE), ConditionStatus::True);
        assert_eq!(status_of(&conds, CONDITION_PROGRESSING), ConditionStatus::False);
        assert_eq!(status_of(&conds, CONDITION_UPGRADEABLE), ConditionStatus::True);
    }

    #[test]
    fn test_failure_reasons_are_degraded() {
        let conds = compute_conditions(
            StatusReason::SyncFailed(Subsystem::Haproxy),
            "apply failed",
            "Applying resources",
        );
        let degraded = find_condition(&conds, CONDITION_DEGRADED).unwrap();
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason.as_deref(), Some("HaproxySyncFailed"));
        assert_eq!(status_of(&conds, CONDITION_PROGRESSING), ConditionStatus::True);

        let conds = compute_conditions(StatusReason::InvalidConfiguration, "bad images", "");
        assert_eq!(status_of(&conds, CONDITION_DEGRADED), ConditionStatus::True);
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let earlier = Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut previous = compute_conditions(StatusReason::Syncing, "", "x");
        for c in previous.iter_mut() {
            c.last_transition_time = Some(earlier.clone());
        }

        let mut next = compute_conditions(StatusReason::Complete, "done", "");
        carry_transition_times(&mut next, &previous);

        // Upgradeable 没有变化
        assert_eq!(
            find_condition(&next, CONDITION_UPGRADEABLE).unwrap().last_transition_time,
            Some(earlier.clone())
        );
        // Available 从 False 变为 True
        assert_ne!(
            find_condition(&next, CONDITION_AVAILABLE).unwrap().last_transition_time,
            Some(earlier)
        );
    }

    #[tokio::test]
    async fn test_set_status_creates_cluster_operator() {
        let cluster = Arc::new(FakeCluster::new("BareMetal", "10.0.0.5", "10.0.0.6"));
        let reporter = StatusReporter::new(cluster.clone(), "4.6.0", "hostnet", "hostnet-workloads");

        reporter
            .set_status(StatusReason::Syncing, "", "Applying resources")
            .await
            .unwrap();

        let status = cluster.last_status().unwrap();
        assert!(status.is_true(CONDITION_PROGRESSING));
        assert_eq!(status.versions[0].version, "4.6.0");
        assert_eq!(status.related_objects.len(), 3);
        assert_eq!(cluster.cluster_operators_created(), 1);

        reporter
            .set_status(StatusReason::Complete, "done", "")
            .await
            .unwrap();
        assert_eq!(cluster.cluster_operators_created(), 1);
        assert!(cluster.last_status().unwrap().is_true(CONDITION_AVAILABLE));
    }

    #[test_log::test(tokio::test)]
    async fn test_unchanged_status_is_not_rewritten() {
        let cluster = Arc::new(FakeCluster::new("BareMetal", "10.0.0.5", "10.0.0.6"));
        let metrics = Arc::new(OperatorMetrics::new().unwrap());
        let reporter = StatusReporter::new(cluster.clone(), "4.6.0", "hostnet", "hostnet-workloads")
            .with_metrics(metrics.clone());

        for _ in 0..2 {
            reporter
                .set_status(StatusReason::InvalidConfiguration, "bad images", "")
                .await
                .unwrap();
        }
        assert_eq!(cluster.status_reasons(), vec!["InvalidConfiguration"]);
        assert!(metrics
            .encode()
            .unwrap()
            .contains("hostnet_status_writes_total{reason=\"InvalidConfiguration\"} 1"));

        // 消息变化仍然写入
        reporter
            .set_status(StatusReason::InvalidConfiguration, "still bad", "")
            .await
            .unwrap();
        assert_eq!(cluster.status_reasons().len(), 2);
    }

    #[tokio::test]
    async fn test_write_failure_is_status_error() {
        let cluster = Arc::new(FakeCluster::new("BareMetal", "10.0.0.5", "10.0.0.6"));
        cluster.fail_status_writes();
        let reporter = StatusReporter::new(cluster, "", "hostnet", "");

        let err = reporter
            .set_status(StatusReason::Complete, "done", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status(_)));
    }

    #[tokio::test]
    async fn test_status_writes_are_counted() {
        let cluster = Arc::new(FakeCluster::new("BareMetal", "10.0.0.5", "10.0.0.6"));
        let metrics = Arc::new(OperatorMetrics::new().unwrap());
        let reporter = StatusReporter::new(cluster, "", "hostnet", "hostnet-workloads")
            .with_metrics(metrics.clone());

        reporter
            .set_status(StatusReason::SyncFailed(Subsystem::Mdns), "boom", "")
            .await
            .unwrap();
        assert!(metrics
            .encode()
            .unwrap()
            .contains("hostnet_status_writes_total{reason=\"MdnsSyncFailed\"} 1"));
    }
}

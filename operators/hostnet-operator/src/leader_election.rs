//! 基于 Lease 的主节点选举
//!
//! 使用 `coordination.k8s.io/v1` Lease，以 `resourceVersion` 做比较并交换：
//! 读取与写入之间 Lease 被修改时写入返回 409，本轮视为未获得。
//! 只有持有 Lease 的副本启动控制器，失去 Lease 后进程退出，由编排系统重启。

use chrono::{DateTime, Utc};
use hostnet_common::{Error, Result};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LEASE_DURATION: Duration = Duration::from_secs(30);
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// 对 Lease 的一次决策
#[derive(Debug, Clone, PartialEq, Eq)]
enum LeaseAction {
    /// Lease 不存在，创建
    Create,
    /// 自己持有，续约
    Renew,
    /// 他人持有但已过期，接管
    TakeOver { transitions: i32 },
    /// 他人持有且未过期
    Wait,
}

fn decide(lease: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> LeaseAction {
    let Some(lease) = lease else {
        return LeaseAction::Create;
    };
    let spec = lease.spec.as_ref();

    if spec.and_then(|s| s.holder_identity.as_deref()) == Some(identity) {
        return LeaseAction::Renew;
    }

    let renew_time = spec.and_then(|s| s.renew_time.as_ref());
    let duration = spec.and_then(|s| s.lease_duration_seconds);
    let expired = match (renew_time, duration) {
        (Some(rt), Some(secs)) => now > rt.0 + chrono::Duration::seconds(secs as i64),
        _ => true,
    };

    if expired {
        LeaseAction::TakeOver {
            transitions: spec.and_then(|s| s.lease_transitions).unwrap_or(0),
        }
    } else {
        LeaseAction::Wait
    }
}

fn is_conflict(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(resp) if resp.code == 409)
}

/// 主节点选举器
pub struct LeaderElector {
    client: Client,
    lease_name: String,
    namespace: String,
    identity: String,
}

impl LeaderElector {
    pub fn new(client: Client, lease_name: &str, namespace: &str, identity: &str) -> Self {
        Self {
            client,
            lease_name: lease_name.to_string(),
            namespace: namespace.to_string(),
            identity: identity.to_string(),
        }
    }

    /// 阻塞直到获得 Lease，返回维持续约的守卫
    pub async fn acquire(self: Arc<Self>) -> LeaderGuard {
        info!(identity = %self.identity, lease = %self.lease_name, "等待成为主节点");

        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.identity, "已成为主节点");
                    return self.guard();
                }
                Ok(false) => {
                    debug!(identity = %self.identity, "Lease 由其他副本持有");
                }
                Err(e) => {
                    warn!(identity = %self.identity, error = %e, "获取 Lease 失败，稍后重试");
                }
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    fn guard(self: &Arc<Self>) -> LeaderGuard {
        let (lost_tx, lost_rx) = oneshot::channel();
        let elector = Arc::clone(self);
        let renewal_task = tokio::spawn(async move {
            elector.renewal_loop(lost_tx).await;
        });
        LeaderGuard {
            renewal_task,
            lost_rx: Some(lost_rx),
        }
    }

    async fn renewal_loop(&self, lost_tx: oneshot::Sender<()>) {
        loop {
            tokio::time::sleep(RENEW_INTERVAL).await;
            match self.try_acquire_or_renew().await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    warn!(identity = %self.identity, "失去主节点身份");
                    let _ = lost_tx.send(());
                    return;
                }
            }
        }
    }

    async fn try_acquire_or_renew(&self) -> Result<bool> {
        let api: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let now = Utc::now();
        let existing = api.get_opt(&self.lease_name).await?;

        let lease = match decide(existing.as_ref(), &self.identity, now) {
            LeaseAction::Wait => return Ok(false),
            LeaseAction::Create => self.desired(None, now, 0),
            LeaseAction::Renew => {
                let mut lease = existing.ok_or_else(|| Error::Unknown("Lease 已消失".to_string()))?;
                if let Some(spec) = lease.spec.as_mut() {
                    spec.renew_time = Some(MicroTime(now));
                }
                lease
            }
            LeaseAction::TakeOver { transitions } => {
                let rv = existing.and_then(|l| l.metadata.resource_version);
                self.desired(rv, now, transitions + 1)
            }
        };

        let result = if lease.metadata.resource_version.is_none() {
            api.create(&PostParams::default(), &lease).await
        } else {
            api.replace(&self.lease_name, &PostParams::default(), &lease).await
        };

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_conflict(&e) => {
                debug!(identity = %self.identity, "Lease 写入冲突");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn desired(&self, resource_version: Option<String>, now: DateTime<Utc>, transitions: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version,
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(LEASE_DURATION.as_secs() as i32),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(transitions),
                ..Default::default()
            }),
        }
    }
}

/// 持有 Lease 期间存在的守卫，丢弃时停止续约
pub struct LeaderGuard {
    renewal_task: JoinHandle<()>,
    lost_rx: Option<oneshot::Receiver<()>>,
}

impl LeaderGuard {
    /// 等待失去主节点身份
    pub async fn lost(&mut self) {
        if let Some(rx) = self.lost_rx.take() {
            let _ = rx.await;
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lease(holder: &str, renewed: DateTime<Utc>, transitions: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some("lease".to_string()),
                resource_version: Some("7".to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(holder.to_string()),
                lease_duration_seconds: Some(30),
                renew_time: Some(MicroTime(renewed)),
                lease_transitions: Some(transitions),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_decide() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let soon = t0 + chrono::Duration::seconds(10);
        let later = t0 + chrono::Duration::seconds(31);

        assert_eq!(decide(None, "me", t0), LeaseAction::Create);
        assert_eq!(decide(Some(&lease("me", t0, 0)), "me", later), LeaseAction::Renew);
        assert_eq!(decide(Some(&lease("other", t0, 0)), "me", soon), LeaseAction::Wait);
        assert_eq!(
            decide(Some(&lease("other", t0, 2)), "me", later),
            LeaseAction::TakeOver { transitions: 2 }
        );
    }

    #[test]
    fn test_lease_without_renew_time_is_expired() {
        let mut l = lease("other", Utc::now(), 0);
        l.spec.as_mut().unwrap().renew_time = None;
        assert!(matches!(decide(Some(&l), "me", Utc::now()), LeaseAction::TakeOver { .. }));
    }
}

//! 事件映射模块
//!
//! `Config` 资源（所有命名空间）是控制器的主监听对象，每个对象以自身标识作为键。
//! 工作负载命名空间归配置单例所有，它的事件统一映射为单例的键，
//! 命名空间被删除后会由下一次协调重新创建。

use k8s_openapi::api::core::v1::Namespace;
use kube::{
    runtime::{reflector::ObjectRef, watcher},
    ResourceExt,
};

use crate::crd::Config;
use crate::reconcile::ReconcileRequest;

/// `Config` 事件对应的请求
pub fn request_for_config(config: &Config) -> ReconcileRequest {
    ReconcileRequest::new(&config.name_any(), &config.namespace().unwrap_or_default())
}

/// 请求对应的控制器键
pub fn object_ref(request: &ReconcileRequest) -> ObjectRef<Config> {
    ObjectRef::new(&request.name).within(&request.namespace)
}

/// 工作负载命名空间的事件一律映射到配置单例
pub fn singleton_for_namespace(_ns: &Namespace, singleton: &ObjectRef<Config>) -> Option<ObjectRef<Config>> {
    Some(singleton.clone())
}

/// 工作负载命名空间的监听配置，只关注这一个命名空间
///
/// 未设置工作负载命名空间时返回 `None`，不建立命名空间监听。
pub fn namespace_watcher_config(handler_namespace: &str) -> Option<watcher::Config> {
    if handler_namespace.is_empty() {
        return None;
    }
    Some(watcher::Config::default().fields(&format!("metadata.name={}", handler_namespace)))
}

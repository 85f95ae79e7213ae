//! 配置单例解析
//!
//! 保证集群中存在且只存在一个 `Config` 单例：不存在时以默认规范创建。

use hostnet_common::{Error, Result};
use tracing::info;

use crate::client::ClusterClient;
use crate::crd::Config;

/// 读取配置单例，不存在时创建默认实例。
///
/// 返回 `(config, created)`。除“不存在”之外的读取错误原样向上传递，由调用方重新入队。
pub async fn ensure_singleton(
    client: &dyn ClusterClient,
    name: &str,
    namespace: &str,
) -> Result<(Config, bool)> {
    if let Some(config) = client
        .get_config(name, namespace)
        .await
        .map_err(|e| Error::Resolver(Box::new(e)))?
    {
        return Ok((config, false));
    }

    let mut desired = Config::default_singleton(namespace);
    desired.metadata.name = Some(name.to_string());

    let created = client
        .create_config(&desired)
        .await
        .map_err(|e| Error::Resolver(Box::new(e)))?;

    info!(name, namespace, "已创建默认配置单例");
    Ok((created, true))
}

//! 平台检测
//!
//! 根据 Infrastructure 中的平台类型决定 Operator 是否应当工作。

use hostnet_common::{Error, Result};
use tracing::debug;

use crate::client::ClusterClient;

/// 仅在本地部署平台（裸金属、OpenStack、vSphere、oVirt）上启用。
///
/// 其他平台返回 `Ok(false)`；读取 Infrastructure 失败时返回错误，而不是视为禁用。
pub async fn is_enabled(client: &dyn ClusterClient) -> Result<bool> {
    let infra = client
        .get_infrastructure()
        .await
        .map_err(|e| Error::Platform(Box::new(e)))?;

    let enabled = infra
        .platform_type()
        .map(|platform| platform.is_on_prem())
        .unwrap_or(false);

    debug!(platform = ?infra.platform_type(), enabled, "平台检测完成");
    Ok(enabled)
}

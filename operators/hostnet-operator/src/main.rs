//! cluster-hosted-net-services-operator 入口

use anyhow::{Context, Result};
use clap::Parser;
use hostnet_common::names::{CONTROLLER_COMPONENT_NAME, LEADER_LEASE_NAME};
use hostnet_operator::config::{LogFormat, OperatorConfig};
use hostnet_operator::leader_election::{LeaderElector, LeaderGuard};
use hostnet_operator::HostNetOperator;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// 等待失去主节点身份；未启用选举时永不返回
async fn leadership_lost(guard: &mut Option<LeaderGuard>) {
    match guard {
        Some(guard) => guard.lost().await,
        None => std::future::pending::<()>().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = OperatorConfig::parse();
    init_logging(config.log_format);

    info!(
        version = %config.release_version,
        namespace = %config.component_namespace,
        handler_namespace = %config.handler_namespace,
        "启动 {}",
        CONTROLLER_COMPONENT_NAME
    );
    if config.release_version.is_empty() {
        warn!("未设置 RELEASE_VERSION，ClusterOperator 将不上报版本");
    }

    let client = Client::try_default()
        .await
        .context("无法创建 Kubernetes 客户端")?;

    let mut operator = HostNetOperator::new(&config, client.clone()).await?;
    operator.serve_metrics(config.metrics_addr)?;

    let mut guard = if config.enable_leader_election {
        let identity = std::env::var("POD_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| CONTROLLER_COMPONENT_NAME.to_string());
        let elector = Arc::new(LeaderElector::new(
            client,
            LEADER_LEASE_NAME,
            &config.component_namespace,
            &identity,
        ));
        Some(elector.acquire().await)
    } else {
        warn!("未启用主节点选举");
        None
    };

    operator.start().await?;

    let lost = tokio::select! {
        result = shutdown_signal() => {
            result?;
            info!("收到退出信号，正在停止");
            false
        }
        _ = leadership_lost(&mut guard) => true,
    };

    operator.stop().await?;
    if lost {
        anyhow::bail!("失去主节点身份，退出以便重新参与选举");
    }
    Ok(())
}

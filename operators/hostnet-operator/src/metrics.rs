//! 指标收集与导出模块
//!
//! 记录协调次数、失败次数、耗时以及按原因统计的状态写入，
//! 并通过 HTTP 以 Prometheus 文本格式导出（`/metrics`），同时提供 `/healthz`。

use hostnet_common::{Error, Result};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Operator 指标
pub struct OperatorMetrics {
    /// Prometheus 注册表
    registry: Registry,
    /// 按结果统计的协调次数
    reconcile_total: IntCounterVec,
    /// 协调失败次数
    reconcile_errors_total: IntCounter,
    /// 协调耗时
    reconcile_duration: Histogram,
    /// 按原因统计的状态写入次数
    status_writes_total: IntCounterVec,
}

fn metrics_err(e: prometheus::Error) -> Error {
    Error::Config(format!("指标注册失败: {}", e))
}

impl OperatorMetrics {
    /// 创建并注册全部指标
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new(
                "hostnet_reconcile_total",
                "Total number of reconciliations by outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_err)?;

        let reconcile_errors_total = IntCounter::new(
            "hostnet_reconcile_errors_total",
            "Total number of failed reconciliations",
        )
        .map_err(metrics_err)?;

        let reconcile_duration = Histogram::with_opts(HistogramOpts::new(
            "hostnet_reconcile_duration_seconds",
            "Duration of a reconciliation in seconds",
        ))
        .map_err(metrics_err)?;

        let status_writes_total = IntCounterVec::new(
            Opts::new(
                "hostnet_status_writes_total",
                "Total number of ClusterOperator status writes by reason",
            ),
            &["reason"],
        )
        .map_err(metrics_err)?;

        registry
            .register(Box::new(reconcile_total.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(reconcile_errors_total.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(reconcile_duration.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(status_writes_total.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            registry,
            reconcile_total,
            reconcile_errors_total,
            reconcile_duration,
            status_writes_total,
        })
    }

    /// 记录一次成功的协调
    pub fn observe_success(&self, outcome: &str, elapsed: Duration) {
        self.reconcile_total.with_label_values(&[outcome]).inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    /// 记录一次失败的协调
    pub fn observe_failure(&self, elapsed: Duration) {
        self.reconcile_total.with_label_values(&["error"]).inc();
        self.reconcile_errors_total.inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    /// 记录一次状态写入
    pub fn observe_status_write(&self, reason: &str) {
        self.status_writes_total.with_label_values(&[reason]).inc();
    }

    /// 获取 Prometheus 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 以文本格式编码当前指标
    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }

    /// 在指定地址启动指标服务器
    pub fn serve(&self, addr: SocketAddr) -> Result<JoinHandle<()>> {
        let registry = self.registry.clone();
        let server = Server::try_bind(&addr)
            .map_err(|e| Error::Config(format!("无法监听指标地址 {}: {}", addr, e)))?;

        let make_svc = make_service_fn(move |_| {
            let registry = registry.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let registry = registry.clone();
                    async move { Ok::<_, Infallible>(route(&registry, &req)) }
                }))
            }
        });

        info!("指标服务器启动在 {}", addr);
        Ok(tokio::spawn(async move {
            if let Err(e) = server.serve(make_svc).await {
                error!("指标服务器错误: {}", e);
            }
        }))
    }
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| Error::Unknown(format!("指标编码失败: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Unknown(format!("指标编码失败: {}", e)))
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

fn route(registry: &Registry, req: &Request<Body>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => match encode_registry(registry) {
            Ok(body) => text_response(StatusCode::OK, body),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok".to_string()),
        _ => text_response(StatusCode::NOT_FOUND, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_exported() {
        let metrics = OperatorMetrics::new().unwrap();
        metrics.observe_success("synced", Duration::from_millis(120));
        metrics.observe_failure(Duration::from_millis(5));
        metrics.observe_status_write("Complete");

        let text = metrics.encode().unwrap();
        assert!(text.contains("hostnet_reconcile_total{outcome=\"synced\"} 1"));
        assert!(text.contains("hostnet_reconcile_errors_total 1"));
        assert!(text.contains("hostnet_status_writes_total{reason=\"Complete\"} 1"));
        assert!(text.contains("hostnet_reconcile_duration_seconds_count 2"));
    }

    #[test]
    fn test_routes() {
        let metrics = OperatorMetrics::new().unwrap();
        let request = |path: &str| Request::get(path).body(Body::empty()).unwrap();

        assert_eq!(route(metrics.registry(), &request("/healthz")).status(), StatusCode::OK);
        assert_eq!(route(metrics.registry(), &request("/metrics")).status(), StatusCode::OK);
        assert_eq!(
            route(metrics.registry(), &request("/nope")).status(),
            StatusCode::NOT_FOUND
        );
    }
}

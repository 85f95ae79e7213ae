//! 控制器模块
//!
//! 基于 kube-runtime 的 `Controller`：以 `Config` 为主监听对象，工作负载命名空间为
//! 次级监听对象。运行时调度器负责按键去重并保证同一个键同时只有一次协调，
//! 失败的键由 [`error_policy`] 按键指数退避后重新入队。

use futures::StreamExt;
use hostnet_common::Error;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller as KubeController},
        watcher,
    },
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::crd::Config;
use crate::event_handler::{namespace_watcher_config, object_ref, request_for_config, singleton_for_namespace};
use crate::metrics::OperatorMetrics;
use crate::reconcile::{ReconcileOutcome, ReconcileRequest, Reconciler};

/// 默认退避起点
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// 默认退避上限
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// 按键指数退避
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// 第 `failures` 次失败后的等待时间：base * 2^(failures-1)，不超过 max
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// 控制器共享上下文
pub struct ControllerContext {
    reconciler: Arc<Reconciler>,
    metrics: Option<Arc<OperatorMetrics>>,
    backoff: BackoffPolicy,
    /// 每个键连续失败的次数，成功后清零
    failures: Mutex<HashMap<ReconcileRequest, u32>>,
}

impl ControllerContext {
    pub fn new(reconciler: Arc<Reconciler>, metrics: Option<Arc<OperatorMetrics>>) -> Self {
        Self {
            reconciler,
            metrics,
            backoff: BackoffPolicy::default(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ReconcileRequest, u32>> {
        // 锁内没有会 panic 的操作，中毒时直接沿用内部状态
        self.failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前连续失败次数
    pub fn failures(&self, request: &ReconcileRequest) -> u32 {
        self.lock().get(request).copied().unwrap_or(0)
    }

    fn record_failure(&self, request: &ReconcileRequest) -> u32 {
        let mut failures = self.lock();
        let count = failures.entry(request.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    fn forget(&self, request: &ReconcileRequest) {
        self.lock().remove(request);
    }
}

/// 协调入口：调用协调器，成功时清零退避，并记录指标
pub async fn reconcile(config: Arc<Config>, ctx: Arc<ControllerContext>) -> Result<Action, Error> {
    let request = request_for_config(&config);
    let started = Instant::now();

    match ctx.reconciler.reconcile(&request).await {
        Ok(outcome) => {
            ctx.forget(&request);
            debug!(%request, ?outcome, "协调成功");
            if let Some(metrics) = &ctx.metrics {
                metrics.observe_success(outcome_label(outcome), started.elapsed());
            }
            Ok(Action::await_change())
        }
        Err(e) => {
            if let Some(metrics) = &ctx.metrics {
                metrics.observe_failure(started.elapsed());
            }
            Err(e)
        }
    }
}

/// 失败处理：累加该键的失败次数，按退避策略重新入队
pub fn error_policy(config: Arc<Config>, error: &Error, ctx: Arc<ControllerContext>) -> Action {
    let request = request_for_config(&config);
    let failures = ctx.record_failure(&request);
    let delay = ctx.backoff.delay(failures);
    error!(
        %request,
        %error,
        retries = failures,
        delay_ms = delay.as_millis() as u64,
        "协调失败，稍后重试"
    );
    Action::requeue(delay)
}

fn outcome_label(outcome: ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Disabled => "disabled",
        ReconcileOutcome::Ignored => "ignored",
        ReconcileOutcome::Created => "created",
        ReconcileOutcome::Synced => "synced",
    }
}

/// 控制器结构体
pub struct Controller {
    /// Kubernetes 客户端
    client: Client,
    /// 共享上下文
    context: Arc<ControllerContext>,
    /// 配置单例的标识
    singleton: ReconcileRequest,
    /// 工作负载命名空间
    handler_namespace: String,
    /// 运行中的控制器任务
    task: Option<JoinHandle<()>>,
    /// 优雅停止信号
    shutdown: Option<oneshot::Sender<()>>,
}

impl Controller {
    /// 创建新的控制器
    pub fn new(
        client: Client,
        reconciler: Arc<Reconciler>,
        metrics: Option<Arc<OperatorMetrics>>,
    ) -> Self {
        let singleton = reconciler.singleton_request();
        let handler_namespace = reconciler.settings().handler_namespace.clone();
        Self {
            client,
            context: Arc::new(ControllerContext::new(reconciler, metrics)),
            singleton,
            handler_namespace,
            task: None,
            shutdown: None,
        }
    }

    /// 启动控制器
    pub fn start(&mut self) {
        let configs: Api<Config> = Api::all(self.client.clone());
        let mut controller = KubeController::new(configs, watcher::Config::default());

        match namespace_watcher_config(&self.handler_namespace) {
            Some(watch_config) => {
                let namespaces: Api<Namespace> = Api::all(self.client.clone());
                let owner = object_ref(&self.singleton);
                controller = controller.watches(namespaces, watch_config, move |ns: Namespace| {
                    singleton_for_namespace(&ns, &owner)
                });
                info!(namespace = %self.handler_namespace, "监听工作负载命名空间");
            }
            None => warn!("未设置工作负载命名空间，跳过命名空间监听"),
        }

        let (tx, rx) = oneshot::channel::<()>();
        let run = controller
            .graceful_shutdown_on(async move {
                let _ = rx.await;
            })
            .run(reconcile, error_policy, self.context.clone())
            .for_each(|result| async move {
                match result {
                    Ok((obj, action)) => debug!(config = %obj.name, ?action, "协调完成"),
                    Err(e) => warn!("控制器错误: {}", e),
                }
            });

        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(run));
        info!("HostNet Operator 控制器已启动");
    }

    /// 停止控制器，等待正在执行的协调结束
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("控制器任务异常退出: {}", e);
            }
        }
        info!("HostNet Operator 控制器已停止");
    }
}

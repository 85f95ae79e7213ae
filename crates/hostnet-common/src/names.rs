//! 名称与常量
//!
//! Operator 使用的资源名称、环境变量名和清单目录。

/// 清单模板根目录（相对于进程工作目录）
pub const MANIFEST_DIR: &str = "./bindata";

/// 清单根目录下存放集群托管服务模板的子目录
pub const MANIFEST_SUBDIR: &str = "cluster-hosted";

/// 配置单例资源名称
pub const CONFIG_SINGLETON_NAME: &str = "net-configuration";

/// 控制器组件名称，同时用作 User-Agent 与服务端应用的字段管理者
pub const CONTROLLER_COMPONENT_NAME: &str = "cluster-hosted-net-services-operator";

/// ClusterOperator 资源名称
pub const CLUSTER_OPERATOR_NAME: &str = "cluster-hosted-net-services";

/// Infrastructure 资源名称
pub const INFRASTRUCTURE_NAME: &str = "cluster";

/// 领导者选举使用的 Lease 名称
pub const LEADER_LEASE_NAME: &str = "cluster-hosted-net-services-operator-leader";

/// 默认镜像清单文件路径
pub const DEFAULT_IMAGES_JSON: &str =
    "/etc/cluster-hosted-net-services-operator/images/images.json";

/// 环境变量
pub mod env {
    /// Operator 所在命名空间
    pub const COMPONENT_NAMESPACE: &str = "COMPONENT_NAMESPACE";
    /// 工作负载（守护进程）命名空间
    pub const HANDLER_NAMESPACE: &str = "HANDLER_NAMESPACE";
    /// DNS 基础域名
    pub const DNS_BASE_DOMAIN: &str = "DNS_BASE_DOMAIN";
    /// 发布版本
    pub const RELEASE_VERSION: &str = "RELEASE_VERSION";
}

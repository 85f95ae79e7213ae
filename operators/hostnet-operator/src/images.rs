//! 镜像清单加载
//!
//! 从挂载的 JSON 文件读取各组件的容器镜像。

use hostnet_common::{Error, Images, Result};
use std::path::Path;
use tracing::debug;

/// 镜像清单加载器
#[cfg_attr(test, mockall::automock)]
pub trait ImageLoader: Send + Sync {
    /// 从指定路径加载并校验镜像清单
    fn load(&self, path: &Path) -> Result<Images>;
}

/// 从本地文件读取镜像清单
#[derive(Debug, Default, Clone)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<Images> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Images {
            message: format!("无法读取镜像清单 {}", path.display()),
            source: Some(Box::new(Error::Io(e))),
        })?;

        let images = Images::from_json(&content)?;
        debug!(path = %path.display(), "镜像清单加载成功");
        Ok(images)
    }
}

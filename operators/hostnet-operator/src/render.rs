//! 清单模板渲染
//!
//! 把一个模板目录和键值上下文渲染为结构化资源列表。目录中的文件按文件名排序，
//! 每个文件用 minijinja 渲染后按 YAML 多文档拆分，每个文档对应一个资源。

use hostnet_common::error::BoxError;
use hostnet_common::{Error, Result};
use kube::api::DynamicObject;
use minijinja::{Environment, UndefinedBehavior};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 渲染上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderData {
    data: BTreeMap<String, Value>,
}

impl RenderData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// 模板渲染器
#[cfg_attr(test, mockall::automock)]
pub trait ManifestRenderer: Send + Sync {
    /// 渲染目录下的全部模板
    fn render_dir(&self, dir: &Path, data: &RenderData) -> Result<Vec<DynamicObject>>;
}

/// 基于 minijinja 的渲染器
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // 上下文缺少键时直接报错，避免渲染出空字段
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    fn template_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml") | Some("json")
                )
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn render_file(&self, path: &Path, data: &RenderData) -> std::result::Result<Vec<DynamicObject>, BoxError> {
        let source = std::fs::read_to_string(path)?;
        let rendered = self.env.render_str(&source, &data.data)?;

        let mut objects = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&rendered) {
            let value = serde_yaml::Value::deserialize(document)?;
            if let Some(obj) = to_object(value)? {
                objects.push(obj);
            }
        }
        Ok(objects)
    }
}

/// 空文档返回 `None`；缺少 metadata 的文档补一个空的 metadata，由调用方按空名称跳过
fn to_object(value: serde_yaml::Value) -> std::result::Result<Option<DynamicObject>, BoxError> {
    if value.is_null() {
        return Ok(None);
    }

    let mut json = serde_json::to_value(value)?;
    let map = json
        .as_object_mut()
        .ok_or("清单文档必须是一个映射（mapping）")?;
    map.entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));

    Ok(Some(serde_json::from_value(json)?))
}

impl ManifestRenderer for TemplateRenderer {
    fn render_dir(&self, dir: &Path, data: &RenderData) -> Result<Vec<DynamicObject>> {
        let render_err = |source: BoxError| Error::Render {
            dir: dir.display().to_string(),
            source,
        };

        let files = Self::template_files(dir).map_err(|e| render_err(Box::new(e)))?;

        let mut objects = Vec::new();
        for file in files {
            let rendered = self.render_file(&file, data).map_err(|e| {
                render_err(format!("{}: {}", file.display(), e).into())
            })?;
            debug!(file = %file.display(), count = rendered.len(), "模板渲染完成");
            objects.extend(rendered);
        }

        Ok(objects)
    }
}

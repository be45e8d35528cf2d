//! 模板存储管理
//!
//! 使用 DashMap 按名称缓存编译后的模板，支持模板的加载、更新、删除、批量操作和并发渲染。

use crate::compiler::{CompiledTemplate, TemplateCompiler};
use crate::error::{FormatError, Result};
use crate::evaluator::RenderOptions;
use crate::renderer::{RenderResult, TemplateRenderer};
use dashmap::DashMap;
use format_shared::config::EngineConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 模板存储
#[derive(Clone)]
pub struct TemplateStore {
    /// 编译后的模板缓存
    templates: Arc<DashMap<String, Arc<CompiledTemplate>>>,
    /// 模板编译器
    compiler: Arc<parking_lot::Mutex<TemplateCompiler>>,
    renderer: TemplateRenderer,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            templates: Arc::new(DashMap::new()),
            compiler: Arc::new(parking_lot::Mutex::new(TemplateCompiler::new())),
            renderer: TemplateRenderer::with_options(options),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_options(RenderOptions::from(config))
    }

    /// 获取当前存储的模板数量
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 编译并加载模板，同名模板会被替换
    #[instrument(skip(self, source))]
    pub fn load(&self, name: &str, source: &str) -> Result<()> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(source)?
        };

        let version = compiled.compile_version;
        self.templates.insert(name.to_string(), Arc::new(compiled));

        info!("模板已加载: {} (版本 {})", name, version);
        Ok(())
    }

    /// 更新已存在的模板
    #[instrument(skip(self, source))]
    pub fn update(&self, name: &str, source: &str) -> Result<()> {
        if !self.templates.contains_key(name) {
            warn!("更新不存在的模板: {}", name);
            return Err(FormatError::TemplateNotFound(name.to_string()));
        }

        self.load(name, source)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.templates.remove(name).is_some() {
            info!("模板已删除: {}", name);
            Ok(())
        } else {
            warn!("删除不存在的模板: {}", name);
            Err(FormatError::TemplateNotFound(name.to_string()))
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledTemplate>> {
        self.templates.get(name).map(|t| Arc::clone(t.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// 获取所有模板名称
    pub fn list_names(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.key().clone()).collect()
    }

    /// 批量加载模板，返回加载成功的名称
    #[instrument(skip(self, templates))]
    pub fn load_batch(&self, templates: Vec<(String, String)>) -> Result<Vec<String>> {
        let mut loaded = Vec::with_capacity(templates.len());
        let mut errors = Vec::new();

        for (name, source) in templates {
            match self.load(&name, &source) {
                Ok(()) => loaded.push(name),
                Err(e) => errors.push((name, e)),
            }
        }

        if !errors.is_empty() {
            warn!("批量加载部分失败: {:?}", errors);
        }

        info!("批量加载完成: {} 成功, {} 失败", loaded.len(), errors.len());
        Ok(loaded)
    }

    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.templates.len();
        self.templates.clear();
        info!("已清空 {} 个模板", count);
    }

    /// 按名称渲染模板
    pub fn render(&self, name: &str, args: &[Value]) -> Result<String> {
        let template = self.lookup(name)?;
        self.renderer.render(&template, args)
    }

    /// 按名称渲染模板，并返回选中分支与追踪信息
    pub fn render_traced(&self, name: &str, args: &[Value]) -> Result<RenderResult> {
        let template = self.lookup(name)?;
        self.renderer.render_traced(&template, args)
    }

    // 渲染期间不持有分片锁
    fn lookup(&self, name: &str) -> Result<Arc<CompiledTemplate>> {
        self.get(name).ok_or_else(|| {
            warn!("渲染不存在的模板: {}", name);
            FormatError::TemplateNotFound(name.to_string())
        })
    }

    /// 获取模板统计信息
    pub fn stats(&self) -> TemplateStoreStats {
        let templates_count = self.templates.len();
        let total_conditions: usize = self
            .templates
            .iter()
            .map(|t| t.conditions().len())
            .sum();

        TemplateStoreStats {
            templates_count,
            total_conditions,
            avg_conditions_per_template: if templates_count > 0 {
                total_conditions as f64 / templates_count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 模板存储统计信息
#[derive(Debug, Clone)]
pub struct TemplateStoreStats {
    pub templates_count: usize,
    /// 所有模板中的条件总数
    pub total_conditions: usize,
    pub avg_conditions_per_template: f64,
}

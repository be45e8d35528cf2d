//! 模板编译器
//!
//! 将模板字符串解析为可重复渲染的 [`CompiledTemplate`]，并预先提取模板引用的
//! 所有参数下标。

use crate::error::{FormatError, Result};
use crate::models::{Condition, Operand};
use crate::parser;
use crate::placeholder;
use crate::renderer::TemplateRenderer;
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

/// 编译后的模板
///
/// 编译后只读，可在多个线程间共享并无限次渲染。
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    source: String,
    conditions: Vec<Condition>,
    tail: String,
    /// 模板引用的所有参数下标（分支目标、指针比较对象和 `{i}` 占位符）
    pub referenced_indices: BTreeSet<usize>,
    /// 编译版本号（用于缓存失效）
    pub compile_version: u64,
}

impl CompiledTemplate {
    /// 原始模板字符串
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 按出现顺序排列的条件
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// 最后一个条件之后的纯文本；没有条件时为整个模板
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// 渲染所需的最少参数个数
    pub fn required_args(&self) -> usize {
        self.referenced_indices
            .last()
            .map_or(0, |max| max.saturating_add(1))
    }

    /// 使用默认选项渲染
    pub fn render(&self, args: &[Value]) -> Result<String> {
        TemplateRenderer::new().render(self, args)
    }
}

impl FromStr for CompiledTemplate {
    type Err = FormatError;

    fn from_str(source: &str) -> Result<Self> {
        compile(source)
    }
}

/// 编译模板
pub fn compile(source: &str) -> Result<CompiledTemplate> {
    TemplateCompiler::new().compile(source)
}

/// 模板编译器
pub struct TemplateCompiler {
    compile_version: u64,
}

impl TemplateCompiler {
    pub fn new() -> Self {
        Self { compile_version: 0 }
    }

    /// 编译模板
    ///
    /// 语法错误立即返回，不会产生部分编译的模板。
    pub fn compile(&mut self, source: &str) -> Result<CompiledTemplate> {
        let parsed = parser::parse(source)?;
        let referenced_indices = Self::extract_indices(&parsed.conditions, &parsed.tail);

        self.compile_version += 1;

        debug!(
            conditions = parsed.conditions.len(),
            required_args = referenced_indices.last().map_or(0, |max| max + 1),
            compile_version = self.compile_version,
            "模板编译完成"
        );

        Ok(CompiledTemplate {
            source: source.to_string(),
            conditions: parsed.conditions,
            tail: parsed.tail,
            referenced_indices,
            compile_version: self.compile_version,
        })
    }

    /// 提取模板中使用的所有参数下标
    fn extract_indices(conditions: &[Condition], tail: &str) -> BTreeSet<usize> {
        let mut indices = BTreeSet::new();

        for condition in conditions {
            indices.extend(placeholder::indices(condition.prefix()));

            for branch in condition.branches() {
                indices.insert(branch.target);
                if let Operand::Pointer(index) = branch.operand {
                    indices.insert(index);
                }
                indices.extend(placeholder::indices(&branch.result));
            }

            if let Some(else_branch) = condition.else_branch() {
                indices.extend(placeholder::indices(&else_branch.result));
            }
        }

        indices.extend(placeholder::indices(tail));
        indices
    }
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile() {
        let compiled = compile("'{0}>5:big|*:small' - {1} items").unwrap();

        assert_eq!(compiled.source(), "'{0}>5:big|*:small' - {1} items");
        assert_eq!(compiled.conditions().len(), 1);
        assert_eq!(compiled.tail(), " - {1} items");
        assert_eq!(compiled.compile_version, 1);
    }

    #[test]
    fn test_compile_version() {
        let mut compiler = TemplateCompiler::new();

        let compiled1 = compiler.compile("a").unwrap();
        let compiled2 = compiler.compile("b").unwrap();

        assert_eq!(compiled1.compile_version, 1);
        assert_eq!(compiled2.compile_version, 2);
    }

    #[test]
    fn test_failed_compile_does_not_bump_version() {
        let mut compiler = TemplateCompiler::new();

        assert!(compiler.compile("'unterminated").is_err());
        let compiled = compiler.compile("ok").unwrap();

        assert_eq!(compiled.compile_version, 1);
    }

    #[test]
    fn test_referenced_indices() {
        let compiled =
            compile("{4} '{0}<{2}:lo {5}|*:hi' mid '{1}=x:yes|*:no {3}' end {6}").unwrap();

        let indices: Vec<_> = compiled.referenced_indices.iter().copied().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(compiled.required_args(), 7);
    }

    #[test]
    fn test_plain_template_without_placeholders() {
        let compiled = compile("no placeholders here").unwrap();
        assert!(compiled.conditions().is_empty());
        assert_eq!(compiled.tail(), "no placeholders here");
        assert_eq!(compiled.required_args(), 0);
    }

    #[test]
    fn test_from_str() {
        let compiled: CompiledTemplate = "'{0}=1:one|*:other'".parse().unwrap();
        assert_eq!(compiled.conditions().len(), 1);

        let err = "'{0}=1:one'".parse::<CompiledTemplate>().unwrap_err();
        assert!(err.is_syntax());
    }
}

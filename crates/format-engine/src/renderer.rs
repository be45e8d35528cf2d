//! 模板渲染器
//!
//! 按出现顺序评估每个条件，拼接输出后统一执行 `{i}` 占位符替换。
//! 任一条件评估失败时整个渲染失败，不会返回部分结果。

use crate::compiler::CompiledTemplate;
use crate::error::Result;
use crate::evaluator::{ConditionEvaluator, RenderOptions, Selected};
use crate::placeholder;
use format_shared::config::EngineConfig;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// 渲染结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderResult {
    /// 渲染后的字符串
    pub output: String,
    /// 每个条件选中的分支，与 `conditions()` 一一对应
    pub selected: Vec<Selected>,
    /// 评估追踪（仅在启用追踪时记录）
    pub evaluation_trace: Vec<String>,
    pub render_time_us: u64,
}

/// 模板渲染器
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    options: RenderOptions,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_options(RenderOptions::from(config))
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.options.trace = true;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// 渲染模板，返回输出字符串
    pub fn render(&self, template: &CompiledTemplate, args: &[Value]) -> Result<String> {
        Ok(self.render_traced(template, args)?.output)
    }

    /// 渲染模板，返回选中分支与追踪信息
    pub fn render_traced(&self, template: &CompiledTemplate, args: &[Value]) -> Result<RenderResult> {
        let start = Instant::now();
        let mut result = RenderResult {
            selected: Vec::with_capacity(template.conditions().len()),
            ..Default::default()
        };

        let mut formatted = String::with_capacity(template.source().len());

        for (i, condition) in template.conditions().iter().enumerate() {
            let selected = if self.options.trace {
                result.evaluation_trace.push(format!(
                    "conditions[{}]: 开始评估 {} (共 {} 个分支)",
                    i,
                    condition,
                    condition.branches().len()
                ));
                ConditionEvaluator::select_traced(
                    condition,
                    args,
                    &self.options,
                    Some(&mut result.evaluation_trace),
                )?
            } else {
                ConditionEvaluator::select(condition, args, &self.options)?
            };

            formatted.push_str(&ConditionEvaluator::output(condition, selected));
            result.selected.push(selected);
        }

        formatted.push_str(template.tail());

        result.output = placeholder::substitute(&formatted, args)?;
        result.render_time_us = start.elapsed().as_micros() as u64;

        debug!(
            conditions = template.conditions().len(),
            render_time_us = result.render_time_us,
            "模板渲染完成"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::error::FormatError;
    use serde_json::json;

    #[test]
    fn test_render_selects_branch() {
        let template = compile("'{0}>5:big|*:small' - {1} items").unwrap();
        let renderer = TemplateRenderer::new();

        let out = renderer.render(&template, &[json!(10), json!("x")]).unwrap();
        assert_eq!(out, "big - x items");

        let out = renderer.render(&template, &[json!(3), json!("y")]).unwrap();
        assert_eq!(out, "small - y items");
    }

    #[test]
    fn test_render_range_and_negation() {
        let template = compile("'{0}~1..10:in|*:out' / '{1}!=ok:bad|*:good'").unwrap();
        let renderer = TemplateRenderer::new();

        let out = renderer
            .render(&template, &[json!(10), json!("ok")])
            .unwrap();
        assert_eq!(out, "in / good");

        let out = renderer
            .render(&template, &[json!(11), json!("nope")])
            .unwrap();
        assert_eq!(out, "out / bad");
    }

    #[test]
    fn test_prefix_and_result_placeholders() {
        let template = compile("Hi {0}, you have {1} '{1}=1:message|*:messages'").unwrap();

        let out = template.render(&[json!("Ann"), json!(1)]).unwrap();
        assert_eq!(out, "Hi Ann, you have 1 message");

        let out = template.render(&[json!("Bob"), json!(4)]).unwrap();
        assert_eq!(out, "Hi Bob, you have 4 messages");
    }

    #[test]
    fn test_placeholder_inside_result_uses_arguments() {
        let template = compile("'{0}<0:minus {1}|*:{1}'").unwrap();

        let out = template.render(&[json!(-1), json!("five")]).unwrap();
        assert_eq!(out, "minus five");
    }

    #[test]
    fn test_render_without_conditions() {
        let template = compile("plain {0} text").unwrap();
        assert_eq!(template.render(&[json!(7)]).unwrap(), "plain 7 text");

        let template = compile("").unwrap();
        assert_eq!(template.render(&[]).unwrap(), "");
    }

    #[test]
    fn test_render_fails_on_missing_argument() {
        let template = compile("'{1}=1:one|*:other'").unwrap();
        let err = template.render(&[json!(1)]).unwrap_err();

        assert_eq!(err, FormatError::PointerOutOfRange { index: 1, len: 1 });
    }

    #[test]
    fn test_render_fails_on_unused_branch_only_when_reached() {
        // 第一个分支命中时，后续分支不会被评估
        let template = compile("'{0}=1:one|{5}=2:two|*:other'").unwrap();

        assert_eq!(template.render(&[json!(1)]).unwrap(), "one");
        assert!(template.render(&[json!(2)]).is_err());
    }

    #[test]
    fn test_render_fails_on_type_mismatch() {
        let template = compile("'{0}>5:big|*:small'").unwrap();
        let err = template.render(&[json!("ten")]).unwrap_err();

        assert!(matches!(err, FormatError::TypeMismatch { .. }));
    }

    #[test]
    fn test_render_traced() {
        let template = compile("'{0}=1:one|{0}=2:two|*:other'").unwrap();
        let renderer = TemplateRenderer::new().with_trace();

        let result = renderer.render_traced(&template, &[json!(2)]).unwrap();

        assert_eq!(result.output, "two");
        assert_eq!(result.selected, vec![Selected::Branch(1)]);
        assert_eq!(result.evaluation_trace.len(), 3);
        assert!(result.evaluation_trace[1].ends_with("NOT_MATCHED"));
        assert!(result.evaluation_trace[2].ends_with("=> MATCHED"));
    }

    #[test]
    fn test_render_traced_else() {
        let template = compile("'{0}=1:one|*:other'").unwrap();
        let renderer = TemplateRenderer::new().with_trace();

        let result = renderer.render_traced(&template, &[json!(9)]).unwrap();

        assert_eq!(result.selected, vec![Selected::Else]);
        assert_eq!(result.evaluation_trace.last().unwrap(), "else => SELECTED");
    }

    #[test]
    fn test_trace_disabled_by_default() {
        let template = compile("'{0}=1:one|*:other'").unwrap();
        let result = TemplateRenderer::new()
            .render_traced(&template, &[json!(1)])
            .unwrap();

        assert!(result.evaluation_trace.is_empty());
        assert_eq!(result.selected, vec![Selected::Branch(0)]);
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            strict_numeric_kinds: false,
            trace_enabled: true,
        };
        let renderer = TemplateRenderer::from_config(&config);
        let template = compile("'{0}=5:five|*:other'").unwrap();

        // 非严格模式下浮点参数可以与整数比较对象比较
        let result = renderer.render_traced(&template, &[json!(5.0)]).unwrap();
        assert_eq!(result.output, "five");
        assert!(!result.evaluation_trace.is_empty());
    }

    #[test]
    fn test_concurrent_rendering() {
        let template = compile("'{0}>50:high|{0}>10:mid|*:low' #{0}").unwrap();
        let renderer = TemplateRenderer::new();

        std::thread::scope(|s| {
            for i in 0..8 {
                let template = &template;
                let renderer = &renderer;
                s.spawn(move || {
                    for n in 0..100i64 {
                        let value = n * (i + 1);
                        let expected = if value > 50 {
                            "high"
                        } else if value > 10 {
                            "mid"
                        } else {
                            "low"
                        };
                        let out = renderer.render(template, &[json!(value)]).unwrap();
                        assert_eq!(out, format!("{} #{}", expected, value));
                    }
                });
            }
        });
    }
}

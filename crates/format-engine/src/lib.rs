//! 条件格式化引擎
//!
//! 将带有内联条件表达式和 `{i}` 位置占位符的模板编译为可重复渲染的结构，支持：
//! - 单引号包裹的条件：`'{0}>5:big|*:small'`
//! - 比较操作符 `=`、`<`、`<=`、`>`、`>=`、闭区间 `~low..high` 和取反 `!`
//! - 首个命中分支优先，必须以 else 分支 `*:` 结尾
//! - 按名称缓存模板的线程安全存储

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
mod parser;
pub mod placeholder;
pub mod renderer;
pub mod store;

pub use compiler::{CompiledTemplate, TemplateCompiler, compile};
pub use error::{FormatError, Result};
pub use evaluator::{BranchEvaluator, ConditionEvaluator, RenderOptions, Selected, ValueKind};
pub use models::{Branch, Condition, ElseBranch, Operand};
pub use operators::Operator;
pub use renderer::{RenderResult, TemplateRenderer};
pub use store::{TemplateStore, TemplateStoreStats};

use serde_json::Value;

/// 使用默认选项渲染已编译的模板
pub fn render(template: &CompiledTemplate, args: &[Value]) -> Result<String> {
    template.render(args)
}

/// 编译并立即渲染一次
pub fn format(source: &str, args: &[Value]) -> Result<String> {
    compile(source)?.render(args)
}

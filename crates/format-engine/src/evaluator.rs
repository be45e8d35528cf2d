//! 条件评估器
//!
//! 判断单个分支是否命中，并按声明顺序为条件选出输出分支。
//! 渲染参数使用 `serde_json::Value`，`Value::Null` 视为空参数。

use crate::error::{FormatError, Result};
use crate::models::{Branch, Condition, Operand};
use crate::operators::Operator;
use format_shared::config::EngineConfig;
use serde::Serialize;
use serde_json::Value;

/// 渲染选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// 整数与浮点数是否视为不同类型（如 `5` 与 `5.0` 不可比较）
    pub strict_numeric_kinds: bool,
    /// 是否记录评估追踪
    pub trace: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict_numeric_kinds: true,
            trace: false,
        }
    }
}

impl From<&EngineConfig> for RenderOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            strict_numeric_kinds: config.strict_numeric_kinds,
            trace: config.trace_enabled,
        }
    }
}

/// 参数的运行时类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Float,
    Text,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    /// 获取值的类型，null 返回 None
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Float),
            Value::String(_) => Some(Self::Text),
            Value::Array(_) => Some(Self::Array),
            Value::Object(_) => Some(Self::Object),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "string",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// 解析指针：越界或为 null 时报错
pub(crate) fn resolve_argument(args: &[Value], index: usize) -> Result<&Value> {
    let value = args.get(index).ok_or(FormatError::PointerOutOfRange {
        index,
        len: args.len(),
    })?;

    if value.is_null() {
        return Err(FormatError::NullArgument { index });
    }

    Ok(value)
}

/// 参与比较的值
#[derive(Debug)]
enum Comparand<'a> {
    Number { value: f64, kind: ValueKind },
    Text(&'a str),
    Other { value: &'a Value, kind: ValueKind },
}

impl<'a> Comparand<'a> {
    /// 由非 null 参数构造
    fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Number(n) => Self::Number {
                value: n.as_f64().unwrap_or(f64::NAN),
                kind: ValueKind::of(value).unwrap_or(ValueKind::Float),
            },
            Value::String(s) => Self::Text(s),
            // null 已在 resolve_argument 中排除
            _ => Self::Other {
                value,
                kind: ValueKind::of(value).unwrap_or(ValueKind::Object),
            },
        }
    }

    fn from_operand(operand: &'a Operand, args: &'a [Value]) -> Result<Self> {
        match operand {
            Operand::Pointer(index) => Ok(Self::from_value(resolve_argument(args, *index)?)),
            Operand::Integer(value) => Ok(Self::Number {
                value: *value as f64,
                kind: ValueKind::Integer,
            }),
            Operand::Float(value) => Ok(Self::Number {
                value: *value,
                kind: ValueKind::Float,
            }),
            Operand::Text(value) => Ok(Self::Text(value)),
            Operand::Range { .. } => Err(FormatError::InvalidCondition(
                "范围比较对象只能与 ~ 操作符搭配".to_string(),
            )),
        }
    }

    fn kind(&self) -> ValueKind {
        match self {
            Self::Number { kind, .. } | Self::Other { kind, .. } => *kind,
            Self::Text(_) => ValueKind::Text,
        }
    }
}

/// 分支评估器
pub struct BranchEvaluator;

impl BranchEvaluator {
    /// 评估分支：返回 `negate XOR 匹配结果`
    pub fn evaluate(branch: &Branch, args: &[Value], options: &RenderOptions) -> Result<bool> {
        let target = Comparand::from_value(resolve_argument(args, branch.target)?);

        let matched = match (&branch.operator, &branch.operand) {
            (Operator::Range, Operand::Range { low, high }) => {
                Self::in_range(&target, *low, *high)?
            }
            (Operator::Range, operand) => {
                return Err(FormatError::InvalidCondition(format!(
                    "范围操作符需要 low..high 比较对象, 实际为 {}",
                    operand
                )));
            }
            (operator, operand) => {
                let operand = Comparand::from_operand(operand, args)?;
                Self::check_kinds(&target, &operand, options)?;
                Self::compare(&target, &operand, *operator)?
            }
        };

        Ok(branch.negate != matched)
    }

    /// 闭区间检查，两端均包含
    fn in_range(target: &Comparand<'_>, low: f64, high: f64) -> Result<bool> {
        let Comparand::Number { value, .. } = target else {
            return Err(FormatError::TypeMismatch {
                target: target.kind().name(),
                operand: "range",
            });
        };

        if low >= high {
            return Err(FormatError::InvalidRangeBounds { low, high });
        }

        Ok(*value >= low && *value <= high)
    }

    /// 类型兼容性检查
    fn check_kinds(
        target: &Comparand<'_>,
        operand: &Comparand<'_>,
        options: &RenderOptions,
    ) -> Result<()> {
        let (target_kind, operand_kind) = (target.kind(), operand.kind());

        let compatible = target_kind == operand_kind
            || (!options.strict_numeric_kinds
                && target_kind.is_number()
                && operand_kind.is_number());

        if compatible {
            Ok(())
        } else {
            Err(FormatError::TypeMismatch {
                target: target_kind.name(),
                operand: operand_kind.name(),
            })
        }
    }

    fn compare(target: &Comparand<'_>, operand: &Comparand<'_>, operator: Operator) -> Result<bool> {
        match (target, operand) {
            (Comparand::Number { value: a, .. }, Comparand::Number { value: b, .. }) => {
                Ok(operator.compare_numbers(*a, *b))
            }
            (Comparand::Text(a), Comparand::Text(b)) => {
                Self::equality_only(operator, ValueKind::Text)?;
                Ok(a == b)
            }
            (Comparand::Other { value: a, kind }, Comparand::Other { value: b, .. }) => {
                Self::equality_only(operator, *kind)?;
                Ok(a == b)
            }
            _ => Err(FormatError::TypeMismatch {
                target: target.kind().name(),
                operand: operand.kind().name(),
            }),
        }
    }

    /// 非数值类型只支持 `=`
    fn equality_only(operator: Operator, kind: ValueKind) -> Result<()> {
        if operator == Operator::Equal {
            Ok(())
        } else {
            Err(FormatError::UnsupportedOperator {
                operator: operator.to_string(),
                value_type: kind.name(),
            })
        }
    }
}

/// 条件选中的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum Selected {
    /// 第 n 个有序分支
    Branch(usize),
    Else,
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 选出首个命中的分支，全部未命中时选择 else 分支
    ///
    /// 条件需通过结构校验；指纹未变化时跳过重复校验。
    pub fn select(condition: &Condition, args: &[Value], options: &RenderOptions) -> Result<Selected> {
        Self::select_traced(condition, args, options, None)
    }

    /// 同 [`select`](Self::select)，并将每个被评估分支的结果写入 `trace`
    pub(crate) fn select_traced(
        condition: &Condition,
        args: &[Value],
        options: &RenderOptions,
        mut trace: Option<&mut Vec<String>>,
    ) -> Result<Selected> {
        condition.validate()?;

        for (i, branch) in condition.branches().iter().enumerate() {
            let matched = BranchEvaluator::evaluate(branch, args, options)?;

            if let Some(trace) = trace.as_deref_mut() {
                trace.push(format!(
                    "branches[{}]: {} => {}",
                    i,
                    branch,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));
            }

            if matched {
                return Ok(Selected::Branch(i));
            }
        }

        if let Some(trace) = trace {
            trace.push("else => SELECTED".to_string());
        }

        Ok(Selected::Else)
    }

    /// 应用条件：输出 `前缀 + 选中分支的结果`
    pub fn apply(condition: &Condition, args: &[Value], options: &RenderOptions) -> Result<String> {
        let selected = Self::select(condition, args, options)?;
        Ok(Self::output(condition, selected))
    }

    pub(crate) fn output(condition: &Condition, selected: Selected) -> String {
        let result = match selected {
            Selected::Branch(i) => condition.branches().get(i).map(|b| b.result.as_str()),
            Selected::Else => condition.else_branch().map(|e| e.result.as_str()),
        };

        let mut output = String::with_capacity(condition.prefix().len() + 16);
        output.push_str(condition.prefix());
        output.push_str(result.unwrap_or_default());
        output
    }
}

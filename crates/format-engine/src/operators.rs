//! 比较操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 分支比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// 闭区间范围检查，比较对象必须是 `low..high`
    Range,
}

impl Operator {
    /// 模板中允许出现在操作符位置的字符
    pub const CHARS: &'static str = "~<>=";

    /// 从模板中的操作符记号解析
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Equal),
            "<" => Some(Self::Less),
            "<=" => Some(Self::LessOrEqual),
            ">" => Some(Self::Greater),
            ">=" => Some(Self::GreaterOrEqual),
            "~" => Some(Self::Range),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Range => "~",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range)
    }

    /// 数值比较
    pub(crate) fn compare_numbers(&self, target: f64, operand: f64) -> bool {
        match self {
            Self::Equal => target == operand,
            Self::Less => target < operand,
            Self::LessOrEqual => target <= operand,
            Self::Greater => target > operand,
            Self::GreaterOrEqual => target >= operand,
            // 范围检查由评估器单独处理
            Self::Range => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

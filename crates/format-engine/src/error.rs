//! 条件格式化引擎错误类型
//!
//! 编译期错误（语法错误）携带出错字符在模板中的偏移量（从 0 开始，按字符计数）；
//! 渲染期错误携带指针下标、操作符和值类型，便于定位有问题的模板或调用参数。

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    // ==================== 编译期错误 ====================
    #[error("语法错误: 引号未闭合 (位置 {offset})")]
    UnterminatedQuote { offset: usize },

    #[error("语法错误: 条件体为空 (位置 {offset})")]
    EmptyCondition { offset: usize },

    #[error("语法错误: 意外的字符 '{found}', 期望 {expected} (位置 {offset})")]
    UnexpectedChar {
        offset: usize,
        found: char,
        expected: &'static str,
    },

    #[error("语法错误: 条件意外结束, 期望 {expected} (位置 {offset})")]
    UnexpectedEnd {
        offset: usize,
        expected: &'static str,
    },

    #[error("语法错误: 空指针 {{}} (位置 {offset})")]
    EmptyPointer { offset: usize },

    #[error("语法错误: 无效的指针 '{pointer}' (位置 {offset})")]
    InvalidPointer { offset: usize, pointer: String },

    #[error("语法错误: 缺少比较操作符 (位置 {offset})")]
    MissingOperator { offset: usize },

    #[error("语法错误: 无效的比较操作符 '{operator}' (位置 {offset})")]
    InvalidOperator { offset: usize, operator: String },

    #[error("语法错误: 缺少比较对象 (位置 {offset})")]
    MissingOperand { offset: usize },

    #[error("语法错误: 无效的范围定义: {reason} (位置 {offset})")]
    InvalidRange { offset: usize, reason: &'static str },

    #[error("语法错误: 分支结果为空 (位置 {offset})")]
    MissingResult { offset: usize },

    #[error("语法错误: 缺少 else 分支 (位置 {offset})")]
    MissingElseBranch { offset: usize },

    #[error("语法错误: else 分支必须是条件的最后一个分支 (位置 {offset})")]
    ElseBranchNotLast { offset: usize },

    #[error("条件结构无效: {0}")]
    InvalidCondition(String),

    // ==================== 渲染期错误 ====================
    #[error("参数不足: 指针 {{{index}}} 超出范围, 共 {len} 个参数")]
    PointerOutOfRange { index: usize, len: usize },

    #[error("参数为空: 下标 {index} 处的参数不能为 null")]
    NullArgument { index: usize },

    #[error("类型不匹配: 无法比较 {target} 与 {operand}")]
    TypeMismatch {
        target: &'static str,
        operand: &'static str,
    },

    #[error("无效的操作符: {operator} 不支持类型 {value_type}")]
    UnsupportedOperator {
        operator: String,
        value_type: &'static str,
    },

    #[error("无效的范围: 下限 {low} 必须小于上限 {high}")]
    InvalidRangeBounds { low: f64, high: f64 },

    // ==================== 存储错误 ====================
    #[error("模板未找到: {0}")]
    TemplateNotFound(String),
}

impl FormatError {
    /// 是否为编译期（语法或结构）错误
    pub fn is_syntax(&self) -> bool {
        self.offset().is_some() || matches!(self, Self::InvalidCondition(_))
    }

    /// 语法错误在模板中的字符偏移量
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::UnterminatedQuote { offset }
            | Self::EmptyCondition { offset }
            | Self::UnexpectedChar { offset, .. }
            | Self::UnexpectedEnd { offset, .. }
            | Self::EmptyPointer { offset }
            | Self::InvalidPointer { offset, .. }
            | Self::MissingOperator { offset }
            | Self::InvalidOperator { offset, .. }
            | Self::MissingOperand { offset }
            | Self::InvalidRange { offset, .. }
            | Self::MissingResult { offset }
            | Self::MissingElseBranch { offset }
            | Self::ElseBranchNotLast { offset } => Some(*offset),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_classification() {
        let err = FormatError::UnterminatedQuote { offset: 3 };
        assert!(err.is_syntax());
        assert_eq!(err.offset(), Some(3));

        let err = FormatError::InvalidCondition("缺少条件分支".to_string());
        assert!(err.is_syntax());
        assert_eq!(err.offset(), None);

        let err = FormatError::NullArgument { index: 0 };
        assert!(!err.is_syntax());
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = FormatError::PointerOutOfRange { index: 2, len: 1 };
        assert_eq!(err.to_string(), "参数不足: 指针 {2} 超出范围, 共 1 个参数");

        let err = FormatError::EmptyPointer { offset: 5 };
        assert!(err.to_string().contains("{}"));
        assert!(err.to_string().contains("位置 5"));
    }
}

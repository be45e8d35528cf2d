//! 条件格式化领域模型
//!
//! 一个 [`Condition`] 由若干有序的 [`Branch`]、一个必需的 [`ElseBranch`] 以及
//! 条件之前的纯文本前缀组成。分支的顺序决定匹配优先级（首个匹配者胜出）。

use crate::error::{FormatError, Result};
use crate::operators::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// 比较对象
///
/// 比较类型在编译期由字面量语法确定：整数、浮点数、文本或范围。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// 指向另一个渲染参数，如 `{1}`
    Pointer(usize),
    Integer(i64),
    Float(f64),
    Text(String),
    /// 闭区间 `low..high`，仅与 `~` 操作符搭配
    Range { low: f64, high: f64 },
}

impl Operand {
    fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Pointer(index) => {
                0u8.hash(state);
                index.hash(state);
            }
            Self::Integer(value) => {
                1u8.hash(state);
                value.hash(state);
            }
            Self::Float(value) => {
                2u8.hash(state);
                value.to_bits().hash(state);
            }
            Self::Text(value) => {
                3u8.hash(state);
                value.hash(state);
            }
            Self::Range { low, high } => {
                4u8.hash(state);
                low.to_bits().hash(state);
                high.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pointer(index) => write!(f, "{{{}}}", index),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Text(value) => write!(f, "{}", value),
            Self::Range { low, high } => write!(f, "{}..{}", low, high),
        }
    }
}

/// 条件分支
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// 被检查的参数下标
    pub target: usize,
    pub operator: Operator,
    /// 是否对比较结果取反（`!`）
    #[serde(default)]
    pub negate: bool,
    pub operand: Operand,
    /// 分支命中时输出的文本（已去除首尾空白）
    pub result: String,
}

impl Branch {
    pub fn new(
        target: usize,
        operator: Operator,
        operand: Operand,
        result: impl Into<String>,
    ) -> Self {
        Self {
            target,
            operator,
            negate: false,
            operand,
            result: result.into(),
        }
    }

    /// 取反
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// 分支结构指纹，结果为空时返回 0（结构不完整）
    pub fn structural_hash(&self) -> u64 {
        if self.result.trim().is_empty() {
            return 0;
        }

        let mut hasher = DefaultHasher::new();
        self.target.hash(&mut hasher);
        self.operator.hash(&mut hasher);
        self.negate.hash(&mut hasher);
        self.operand.hash_into(&mut hasher);
        self.result.hash(&mut hasher);
        hasher.finish().max(1)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}{}{}{}:{}",
            self.target,
            if self.negate { "!" } else { "" },
            self.operator,
            self.operand,
            self.result
        )
    }
}

/// else 分支：无条件兜底，只有结果文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElseBranch {
    pub result: String,
}

impl ElseBranch {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

/// 条件语句
///
/// 解析过程中逐步构建，校验通过后不再修改。`validated_hash` 缓存最近一次
/// 成功校验时的结构指纹（0 表示未校验），任何修改都会清空该缓存。
#[derive(Debug, Default)]
pub struct Condition {
    prefix: String,
    branches: Vec<Branch>,
    else_branch: Option<ElseBranch>,
    validated_hash: AtomicU64,
}

impl Condition {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// 追加一个条件分支
    pub fn push_branch(&mut self, branch: Branch) {
        self.branches.push(branch);
        *self.validated_hash.get_mut() = 0;
    }

    /// 设置 else 分支
    pub fn set_else_branch(&mut self, else_branch: ElseBranch) {
        self.else_branch = Some(else_branch);
        *self.validated_hash.get_mut() = 0;
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.push_branch(branch);
        self
    }

    pub fn with_else(mut self, result: impl Into<String>) -> Self {
        self.set_else_branch(ElseBranch::new(result));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn else_branch(&self) -> Option<&ElseBranch> {
        self.else_branch.as_ref()
    }

    /// 计算结构指纹
    ///
    /// 按顺序组合各分支指纹、else 分支结果和前缀。缺少 else 分支或存在不完整的
    /// 分支时返回 0。
    pub fn structural_hash(&self) -> u64 {
        let Some(else_branch) = &self.else_branch else {
            return 0;
        };
        if else_branch.result.trim().is_empty() {
            return 0;
        }

        let mut hasher = DefaultHasher::new();
        self.branches.len().hash(&mut hasher);
        for branch in &self.branches {
            let branch_hash = branch.structural_hash();
            if branch_hash == 0 {
                return 0;
            }
            branch_hash.hash(&mut hasher);
        }
        else_branch.result.hash(&mut hasher);
        self.prefix.hash(&mut hasher);
        hasher.finish().max(1)
    }

    /// 是否已通过校验且此后未被修改
    pub fn is_validated(&self) -> bool {
        let cached = self.validated_hash.load(Ordering::Acquire);
        cached != 0 && cached == self.structural_hash()
    }

    /// 校验条件结构
    ///
    /// 若当前指纹与缓存一致则直接返回。并发调用是安全的：重复计算同一指纹
    /// 不会产生可观察的差异。
    pub fn validate(&self) -> Result<()> {
        let hash = self.structural_hash();
        if hash != 0 && self.validated_hash.load(Ordering::Acquire) == hash {
            return Ok(());
        }

        self.check_structure()?;
        self.validated_hash.store(hash, Ordering::Release);
        Ok(())
    }

    fn check_structure(&self) -> Result<()> {
        if self.branches.is_empty() {
            return Err(FormatError::InvalidCondition("缺少条件分支".to_string()));
        }

        let else_branch = self
            .else_branch
            .as_ref()
            .ok_or_else(|| FormatError::InvalidCondition("缺少 else 分支".to_string()))?;

        if else_branch.result.trim().is_empty() {
            return Err(FormatError::InvalidCondition(
                "else 分支结果为空".to_string(),
            ));
        }

        for (i, branch) in self.branches.iter().enumerate() {
            if branch.result.trim().is_empty() {
                return Err(FormatError::InvalidCondition(format!(
                    "分支 {} 结果为空",
                    i
                )));
            }

            let range_operand = matches!(branch.operand, Operand::Range { .. });
            if branch.operator.is_range() != range_operand {
                return Err(FormatError::InvalidCondition(format!(
                    "分支 {} 的操作符 {} 与比较对象 {} 不匹配",
                    i, branch.operator, branch.operand
                )));
            }
        }

        Ok(())
    }
}

impl Clone for Condition {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            branches: self.branches.clone(),
            else_branch: self.else_branch.clone(),
            validated_hash: AtomicU64::new(self.validated_hash.load(Ordering::Acquire)),
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && self.branches == other.branches
            && self.else_branch == other.else_branch
    }
}

/// 以模板语法输出条件，如 `prefix'{0}>5:big|*:small'`
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'", self.prefix)?;
        for branch in &self.branches {
            write!(f, "{}|", branch)?;
        }
        match &self.else_branch {
            Some(else_branch) => write!(f, "*:{}'", else_branch.result),
            None => write!(f, "'"),
        }
    }
}

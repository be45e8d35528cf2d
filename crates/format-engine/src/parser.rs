//! 模板解析器
//!
//! 逐字符扫描模板，`'` 在“纯文本”和“条件”两种模式之间切换。进入条件模式后，
//! 由 [`ParseContext`] 独立消费一个完整的条件表达式，并返回消费的字符数，
//! 外层扫描从闭合引号之后继续。
//!
//! 条件语法：
//!
//! ```text
//! '{0}>5:big|{0}~1..3:few|*:other'
//! ```
//!
//! 每个分支依次经历三个状态：期望目标指针（或 else 标记 `*`）、期望比较条件、
//! 期望结果文本。

use crate::error::{FormatError, Result};
use crate::models::{Branch, Condition, ElseBranch, Operand};
use crate::operators::Operator;

const QUOTE: char = '\'';
const BRANCH_SEPARATOR: char = '|';
const RESULT_SEPARATOR: char = ':';
const ELSE_MARK: char = '*';
const NEGATE: char = '!';

/// 解析结果：按出现顺序排列的条件，以及最后一个条件之后的纯文本
#[derive(Debug)]
pub(crate) struct ParsedTemplate {
    pub conditions: Vec<Condition>,
    pub tail: String,
}

/// 解析完整模板，每个条件在接受前都会经过结构校验
pub(crate) fn parse(source: &str) -> Result<ParsedTemplate> {
    let chars: Vec<char> = source.chars().collect();
    let mut conditions = Vec::new();
    let mut plain = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c == QUOTE {
            let prefix = std::mem::take(&mut plain);
            let (condition, consumed) = parse_condition(&chars, pos, prefix)?;
            condition.validate()?;
            conditions.push(condition);
            pos += consumed;
        } else {
            plain.push(c);
            pos += 1;
        }
    }

    Ok(ParsedTemplate {
        conditions,
        tail: plain,
    })
}

/// 解析从 `open` 处引号开始的一个条件，返回条件及消费的字符数（含两端引号）
fn parse_condition(chars: &[char], open: usize, prefix: String) -> Result<(Condition, usize)> {
    let body_start = open + 1;
    let close = chars[body_start..]
        .iter()
        .position(|&c| c == QUOTE)
        .map(|i| body_start + i)
        .ok_or(FormatError::UnterminatedQuote { offset: open })?;

    if close == body_start {
        return Err(FormatError::EmptyCondition { offset: open });
    }

    let mut ctx = ParseContext::new(prefix);
    for (i, &c) in chars[body_start..close].iter().enumerate() {
        ctx.feed(c, body_start + i)?;
    }

    let condition = ctx.finish(close)?;
    Ok((condition, close - open + 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// 期望 `{i}` 或 `*`
    ExpectTarget,
    /// `*` 之后期望 `:`
    ExpectElseSeparator,
    /// 期望 `!`、操作符和比较对象
    ExpectCondition,
    /// 累积结果文本，直到 `|` 或闭合引号
    ExpectResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RangePhase {
    #[default]
    Low,
    /// 已读到第一个 `.`
    Dot,
    High,
}

#[derive(Debug, Default)]
struct RangeContext {
    phase: RangePhase,
    low: String,
    high: String,
}

/// 正在解析的分支
#[derive(Debug, Default)]
struct BranchContext {
    target: Option<usize>,
    /// 位于 `{...}` 内部时收集的数字
    pointer_digits: Option<String>,
    negate: bool,
    operator_token: String,
    operator: Option<Operator>,
    range: Option<RangeContext>,
    operand_text: String,
    operand_offset: usize,
    operand: Option<Operand>,
    is_else: bool,
    result: String,
}

impl BranchContext {
    fn into_branch(self, result: String) -> Option<Branch> {
        Some(Branch {
            target: self.target?,
            operator: self.operator?,
            negate: self.negate,
            operand: self.operand?,
            result,
        })
    }
}

/// 单个条件的解析上下文
#[derive(Debug)]
struct ParseContext {
    condition: Condition,
    state: State,
    branch: BranchContext,
}

impl ParseContext {
    fn new(prefix: String) -> Self {
        Self {
            condition: Condition::new(prefix),
            state: State::ExpectTarget,
            branch: BranchContext::default(),
        }
    }

    fn feed(&mut self, c: char, offset: usize) -> Result<()> {
        if c.is_whitespace() && self.state != State::ExpectResult {
            return Ok(());
        }

        match self.state {
            State::ExpectTarget => self.expect_target(c, offset),
            State::ExpectElseSeparator => {
                if c == RESULT_SEPARATOR {
                    self.state = State::ExpectResult;
                    Ok(())
                } else {
                    Err(FormatError::UnexpectedChar {
                        offset,
                        found: c,
                        expected: "':'",
                    })
                }
            }
            State::ExpectCondition => self.expect_condition(c, offset),
            State::ExpectResult => self.expect_result(c, offset),
        }
    }

    fn expect_target(&mut self, c: char, offset: usize) -> Result<()> {
        if self.branch.pointer_digits.is_some() {
            return self.pointer_char(c, offset);
        }

        match c {
            '{' => {
                self.branch.pointer_digits = Some(String::new());
                Ok(())
            }
            ELSE_MARK => {
                self.branch.is_else = true;
                self.state = State::ExpectElseSeparator;
                Ok(())
            }
            _ => Err(FormatError::UnexpectedChar {
                offset,
                found: c,
                expected: "指针 '{i}' 或 else 标记 '*'",
            }),
        }
    }

    fn pointer_char(&mut self, c: char, offset: usize) -> Result<()> {
        let digits = self.branch.pointer_digits.get_or_insert_with(String::new);

        if c.is_ascii_digit() {
            digits.push(c);
            return Ok(());
        }

        if c != '}' {
            return Err(FormatError::InvalidPointer {
                offset,
                pointer: format!("{{{}{}", digits, c),
            });
        }

        let digits = self.branch.pointer_digits.take().unwrap_or_default();
        if digits.is_empty() {
            return Err(FormatError::EmptyPointer { offset });
        }

        let target = digits.parse().map_err(|_| FormatError::InvalidPointer {
            offset,
            pointer: format!("{{{}}}", digits),
        })?;

        self.branch.target = Some(target);
        self.state = State::ExpectCondition;
        Ok(())
    }

    fn expect_condition(&mut self, c: char, offset: usize) -> Result<()> {
        if self.branch.range.is_some() {
            return self.range_char(c, offset);
        }

        if self.branch.operator.is_none() {
            let token = &mut self.branch.operator_token;

            if c == NEGATE && token.is_empty() {
                if self.branch.negate {
                    return Err(FormatError::UnexpectedChar {
                        offset,
                        found: c,
                        expected: "比较操作符",
                    });
                }
                self.branch.negate = true;
                return Ok(());
            }

            if Operator::CHARS.contains(c) {
                token.push(c);
                let operator =
                    Operator::from_token(token).ok_or_else(|| FormatError::InvalidOperator {
                        offset,
                        operator: token.clone(),
                    })?;

                if operator.is_range() {
                    self.branch.operator = Some(operator);
                    self.branch.range = Some(RangeContext::default());
                }
                return Ok(());
            }

            // 第一个非操作符字符确定操作符，并作为比较对象的开头
            self.branch.operator = Some(
                Operator::from_token(token).ok_or(FormatError::MissingOperator { offset })?,
            );
        }

        if c != RESULT_SEPARATOR {
            if self.branch.operand_text.is_empty() {
                self.branch.operand_offset = offset;
            }
            self.branch.operand_text.push(c);
            return Ok(());
        }

        if self.branch.operand_text.is_empty() {
            return Err(FormatError::MissingOperand { offset });
        }

        let operand = interpret_operand(&self.branch.operand_text, self.branch.operand_offset)?;
        self.branch.operand = Some(operand);
        self.state = State::ExpectResult;
        Ok(())
    }

    fn range_char(&mut self, c: char, offset: usize) -> Result<()> {
        let invalid = |reason| FormatError::InvalidRange { offset, reason };
        let Some(range) = self.branch.range.as_mut() else {
            return Err(invalid("范围定义缺失"));
        };

        match (range.phase, c) {
            (RangePhase::Low, d) if d.is_ascii_digit() => range.low.push(d),
            (RangePhase::Low, '.') if range.low.is_empty() => {
                return Err(invalid("缺少范围起始值"));
            }
            (RangePhase::Low, '.') => range.phase = RangePhase::Dot,
            (RangePhase::Low, RESULT_SEPARATOR) if range.low.is_empty() => {
                return Err(invalid("缺少范围起始值"));
            }
            (RangePhase::Low, RESULT_SEPARATOR) => return Err(invalid("缺少范围分隔符 '..'")),
            (RangePhase::Dot, '.') => range.phase = RangePhase::High,
            (RangePhase::Dot, _) => return Err(invalid("期望范围分隔符 '..'")),
            (RangePhase::High, d) if d.is_ascii_digit() => range.high.push(d),
            (RangePhase::High, '.') => return Err(invalid("范围结束值之后期望 ':'")),
            (RangePhase::High, RESULT_SEPARATOR) if range.high.is_empty() => {
                return Err(invalid("缺少范围结束值"));
            }
            (RangePhase::High, RESULT_SEPARATOR) => {
                let low = range.low.parse().map_err(|_| invalid("无效的范围起始值"))?;
                let high = range.high.parse().map_err(|_| invalid("无效的范围结束值"))?;
                self.branch.range = None;
                self.branch.operand = Some(Operand::Range { low, high });
                self.state = State::ExpectResult;
            }
            _ => return Err(invalid("范围定义中只允许数字和 '..'")),
        }

        Ok(())
    }

    fn expect_result(&mut self, c: char, offset: usize) -> Result<()> {
        if c != BRANCH_SEPARATOR {
            self.branch.result.push(c);
            return Ok(());
        }

        if self.branch.is_else {
            return Err(FormatError::ElseBranchNotLast { offset });
        }

        let result = self.branch.result.trim().to_string();
        if result.is_empty() {
            return Err(FormatError::MissingResult { offset });
        }

        let branch = std::mem::take(&mut self.branch)
            .into_branch(result)
            .ok_or_else(|| FormatError::InvalidCondition("分支不完整".to_string()))?;
        self.condition.push_branch(branch);
        self.state = State::ExpectTarget;
        Ok(())
    }

    /// 到达闭合引号
    fn finish(mut self, close: usize) -> Result<Condition> {
        match self.state {
            State::ExpectResult if self.branch.is_else => {
                let result = self.branch.result.trim();
                if result.is_empty() {
                    return Err(FormatError::MissingResult { offset: close });
                }
                self.condition.set_else_branch(ElseBranch::new(result));
                Ok(self.condition)
            }
            State::ExpectTarget if self.branch.pointer_digits.is_some() => {
                Err(FormatError::UnexpectedEnd {
                    offset: close,
                    expected: "'}'",
                })
            }
            State::ExpectResult | State::ExpectTarget => {
                Err(FormatError::MissingElseBranch { offset: close })
            }
            State::ExpectElseSeparator => Err(FormatError::UnexpectedEnd {
                offset: close,
                expected: "':'",
            }),
            State::ExpectCondition => Err(FormatError::UnexpectedEnd {
                offset: close,
                expected: "比较操作符、比较对象和 ':'",
            }),
        }
    }
}

/// 按顺序尝试：指针、整数、浮点数，最后作为原始文本
fn interpret_operand(text: &str, offset: usize) -> Result<Operand> {
    if let Some(inner) = text.strip_prefix('{') {
        let index = inner
            .strip_suffix('}')
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| FormatError::InvalidPointer {
                offset,
                pointer: text.to_string(),
            })?;
        return Ok(Operand::Pointer(index));
    }

    if let Ok(value) = text.parse::<i64>() {
        return Ok(Operand::Integer(value));
    }

    if looks_numeric(text)
        && let Ok(value) = text.parse::<f64>()
    {
        return Ok(Operand::Float(value));
    }

    Ok(Operand::Text(text.to_string()))
}

/// 排除 `inf`、`NaN` 这类会被 f64 接受的文本
fn looks_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

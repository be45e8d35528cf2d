//! `{i}` 占位符替换
//!
//! 单次从左到右扫描：替换进去的参数文本不会被再次扫描。

use crate::error::Result;
use crate::evaluator::resolve_argument;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("placeholder pattern is valid"));

fn capture_index(caps: &Captures<'_>) -> usize {
    // 超出 usize 的下标不可能存在于参数列表中
    caps[1].parse().unwrap_or(usize::MAX)
}

/// 文本中引用的所有参数下标
pub(crate) fn indices(text: &str) -> impl Iterator<Item = usize> + '_ {
    PLACEHOLDER.captures_iter(text).map(|caps| capture_index(&caps))
}

/// 参数的字符串表示：字符串原样输出，其余值使用 JSON 表示
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

/// 将文本中的每个 `{i}` 替换为 `args[i]`，下标越界或参数为 null 时报错
pub fn substitute(text: &str, args: &[Value]) -> Result<String> {
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        let value = resolve_argument(args, capture_index(&caps))?;

        output.push_str(&text[last..whole.start()]);
        output.push_str(&display_value(value));
        last = whole.end();
    }

    output.push_str(&text[last..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use serde_json::json;

    #[test]
    fn test_substitute() {
        let out = substitute("{0} has {1} items", &[json!("alice"), json!(3)]).unwrap();
        assert_eq!(out, "alice has 3 items");
    }

    #[test]
    fn test_repeated_and_unordered() {
        let out = substitute("{1}-{0}-{1}", &[json!("a"), json!("b")]).unwrap();
        assert_eq!(out, "b-a-b");
    }

    #[test]
    fn test_non_placeholder_braces_are_kept() {
        let out = substitute("{x} {} {0", &[]).unwrap();
        assert_eq!(out, "{x} {} {0");
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let out = substitute("{0}", &[json!("{1}"), json!("nope")]).unwrap();
        assert_eq!(out, "{1}");
    }

    #[test]
    fn test_missing_and_null_arguments() {
        let err = substitute("{2}", &[json!(1)]).unwrap_err();
        assert_eq!(err, FormatError::PointerOutOfRange { index: 2, len: 1 });

        let err = substitute("{0}", &[Value::Null]).unwrap_err();
        assert_eq!(err, FormatError::NullArgument { index: 0 });
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("text")), "text");
        assert_eq!(display_value(&json!(10)), "10");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_indices() {
        let found: Vec<_> = indices("{3} and {0} and {x}").collect();
        assert_eq!(found, vec![3, 0]);
    }
}

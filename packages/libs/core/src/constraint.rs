//! 필드 값 제약
//!
//! `can(:create, number: 0..2)` 같은 규칙이 필드에 붙이는 조건입니다.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, Range, RangeFrom, RangeInclusive, RangeTo, RangeToInclusive};
use std::sync::Arc;

use serde_json::Value;

use crate::insecure;

/// 필드 제약
#[derive(Clone, Default)]
pub enum Constraint {
    /// 어떤 값이든 통과
    #[default]
    Unconstrained,

    /// 값이 범위 안에 있어야 함
    Range(ValueRange),

    /// 함수가 true를 반환해야 함
    Predicate(Predicate),

    /// 값이 정확히 같아야 함
    Literal(Value),
}

impl Constraint {
    /// 리터럴 제약
    pub fn literal(value: impl Into<Value>) -> Self {
        Constraint::Literal(value.into())
    }

    /// 함수 제약
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Constraint::Predicate(Predicate::new(f))
    }

    /// 값이 제약을 만족하는지 확인
    ///
    /// predicate는 신뢰 모드에서 실행됩니다.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Constraint::Unconstrained => true,
            Constraint::Range(range) => range.contains(value),
            Constraint::Predicate(predicate) => insecure::insecurely(|| predicate.call(value)),
            Constraint::Literal(expected) => values_equal(expected, value),
        }
    }

    /// 제약 없음 여부
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Constraint::Unconstrained)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unconstrained => f.write_str("Unconstrained"),
            Constraint::Range(range) => f.debug_tuple("Range").field(range).finish(),
            Constraint::Predicate(predicate) => f.debug_tuple("Predicate").field(predicate).finish(),
            Constraint::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
        }
    }
}

/// 함수 제약은 같은 closure를 가리킬 때만 같습니다
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Unconstrained, Constraint::Unconstrained) => true,
            (Constraint::Range(a), Constraint::Range(b)) => a == b,
            (Constraint::Predicate(a), Constraint::Predicate(b)) => a.ptr_eq(b),
            (Constraint::Literal(a), Constraint::Literal(b)) => a == b,
            _ => false,
        }
    }
}

/// 한 인자 bool 함수
#[derive(Clone)]
pub struct Predicate {
    label: Option<String>,
    f: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            label: None,
            f: Arc::new(f),
        }
    }

    /// Debug 출력용 이름 지정 (CEL 식 등)
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn call(&self, value: &Value) -> bool {
        (self.f)(value)
    }

    pub fn ptr_eq(&self, other: &Predicate) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "Predicate({label})"),
            None => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// JSON 값 범위
///
/// 숫자끼리, 문자열끼리만 비교합니다. 비교할 수 없는 값은 범위 밖으로 취급합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub start: Bound<Value>,
    pub end: Bound<Value>,
}

impl ValueRange {
    pub fn new(start: Bound<Value>, end: Bound<Value>) -> Self {
        Self { start, end }
    }

    /// 닫힌 범위 `[start, end]`
    pub fn inclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(Bound::Included(start.into()), Bound::Included(end.into()))
    }

    /// 반열린 범위 `[start, end)`
    pub fn exclusive(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new(Bound::Included(start.into()), Bound::Excluded(end.into()))
    }

    pub fn contains(&self, value: &Value) -> bool {
        let lower = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(start) => matches!(
                compare_values(start, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Bound::Excluded(start) => {
                matches!(compare_values(start, value), Some(Ordering::Less))
            }
        };

        let upper = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(end) => matches!(
                compare_values(value, end),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Bound::Excluded(end) => matches!(compare_values(value, end), Some(Ordering::Less)),
        };

        // 양쪽이 모두 열려 있어도 비교 불가능한 타입은 거부
        lower && upper && is_rangeable(value)
    }
}

fn is_rangeable(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// 숫자/문자열 비교
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// 숫자는 수치로 비교 (`5 == 5.0`)
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// 변환
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! impl_range_conversions {
    ($($t:ty),*) => {
        $(
            impl From<RangeInclusive<$t>> for ValueRange {
                fn from(range: RangeInclusive<$t>) -> Self {
                    let (start, end) = range.into_inner();
                    ValueRange::inclusive(start, end)
                }
            }

            impl From<Range<$t>> for ValueRange {
                fn from(range: Range<$t>) -> Self {
                    ValueRange::exclusive(range.start, range.end)
                }
            }

            impl From<RangeFrom<$t>> for ValueRange {
                fn from(range: RangeFrom<$t>) -> Self {
                    ValueRange::new(Bound::Included(range.start.into()), Bound::Unbounded)
                }
            }

            impl From<RangeTo<$t>> for ValueRange {
                fn from(range: RangeTo<$t>) -> Self {
                    ValueRange::new(Bound::Unbounded, Bound::Excluded(range.end.into()))
                }
            }

            impl From<RangeToInclusive<$t>> for ValueRange {
                fn from(range: RangeToInclusive<$t>) -> Self {
                    ValueRange::new(Bound::Unbounded, Bound::Included(range.end.into()))
                }
            }

            impl From<RangeInclusive<$t>> for Constraint {
                fn from(range: RangeInclusive<$t>) -> Self {
                    Constraint::Range(range.into())
                }
            }

            impl From<Range<$t>> for Constraint {
                fn from(range: Range<$t>) -> Self {
                    Constraint::Range(range.into())
                }
            }

            impl From<RangeFrom<$t>> for Constraint {
                fn from(range: RangeFrom<$t>) -> Self {
                    Constraint::Range(range.into())
                }
            }

            impl From<RangeTo<$t>> for Constraint {
                fn from(range: RangeTo<$t>) -> Self {
                    Constraint::Range(range.into())
                }
            }

            impl From<RangeToInclusive<$t>> for Constraint {
                fn from(range: RangeToInclusive<$t>) -> Self {
                    Constraint::Range(range.into())
                }
            }

            impl From<$t> for Constraint {
                fn from(value: $t) -> Self {
                    Constraint::Literal(value.into())
                }
            }
        )*
    };
}

impl_range_conversions!(i64, i32, u64, f64);

impl From<ValueRange> for Constraint {
    fn from(range: ValueRange) -> Self {
        Constraint::Range(range)
    }
}

impl From<Predicate> for Constraint {
    fn from(predicate: Predicate) -> Self {
        Constraint::Predicate(predicate)
    }
}

impl From<Value> for Constraint {
    fn from(value: Value) -> Self {
        Constraint::Literal(value)
    }
}

impl From<bool> for Constraint {
    fn from(value: bool) -> Self {
        Constraint::Literal(Value::Bool(value))
    }
}

impl From<&str> for Constraint {
    fn from(value: &str) -> Self {
        Constraint::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Constraint {
    fn from(value: String) -> Self {
        Constraint::Literal(Value::String(value))
    }
}

impl From<Option<Constraint>> for Constraint {
    fn from(value: Option<Constraint>) -> Self {
        value.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inclusive_range_boundaries() {
        let constraint = Constraint::from(0..=2);
        assert!(constraint.check(&json!(0)));
        assert!(constraint.check(&json!(2)));
        assert!(constraint.check(&json!(1.5)));
        assert!(!constraint.check(&json!(3)));
        assert!(!constraint.check(&json!(-1)));
    }

    #[test]
    fn test_exclusive_range() {
        let constraint = Constraint::from(0..2);
        assert!(constraint.check(&json!(0)));
        assert!(!constraint.check(&json!(2)));
    }

    #[test]
    fn test_open_ranges() {
        assert!(Constraint::from(10..).check(&json!(500)));
        assert!(!Constraint::from(10..).check(&json!(9)));
        assert!(Constraint::from(..=10).check(&json!(10)));
        assert!(!Constraint::from(..10).check(&json!(10)));
    }

    #[test]
    fn test_range_rejects_other_types() {
        let constraint = Constraint::from(0..=2);
        assert!(!constraint.check(&json!("1")));
        assert!(!constraint.check(&Value::Null));
        assert!(!Constraint::Range(ValueRange::new(Bound::Unbounded, Bound::Unbounded))
            .check(&json!(true)));
    }

    #[test]
    fn test_string_range() {
        let range = ValueRange::inclusive("a", "m");
        assert!(range.contains(&json!("hello")));
        assert!(!range.contains(&json!("zebra")));
    }

    #[test]
    fn test_literal() {
        let constraint = Constraint::from(5);
        assert!(constraint.check(&json!(5)));
        assert!(constraint.check(&json!(5.0)));
        assert!(!constraint.check(&json!(500)));
        assert!(!constraint.check(&json!("5")));

        assert!(Constraint::from("olo").check(&json!("olo")));
    }

    #[test]
    fn test_predicate() {
        let constraint = Constraint::predicate(|v| v.as_str().map(|s| s.len() == 5).unwrap_or(false));
        assert!(constraint.check(&json!("abcde")));
        assert!(!constraint.check(&json!("ab")));
        assert!(!constraint.check(&Value::Null));
    }

    #[test]
    fn test_predicate_runs_trusted() {
        let constraint = Constraint::predicate(|_| insecure::is_active());
        assert!(constraint.check(&json!(1)));
        assert!(!insecure::is_active());
    }

    #[test]
    fn test_unconstrained() {
        assert!(Constraint::Unconstrained.check(&Value::Null));
        assert!(Constraint::from(None).is_unconstrained());
    }
}

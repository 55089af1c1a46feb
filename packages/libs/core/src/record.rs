//! 엔티티 인터페이스와 기본 Row 구현

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::FieldValues;

/// 보호 대상 엔티티
///
/// 엔진은 필드 원본 값, 변경된 필드, 신규 여부만 알면 됩니다.
pub trait Entity {
    /// 권한 검사 없이 필드 값 읽기
    fn value(&self, field: &str) -> Option<&Value>;

    /// 변경된 필드와 새 값
    fn changes(&self) -> FieldValues;

    /// 아직 저장되지 않은 엔티티인지
    fn is_new(&self) -> bool;

    /// 필드 값으로 새 엔티티 생성
    fn from_values(values: FieldValues) -> Self
    where
        Self: Sized;

    /// 필드 값 쓰기 (변경으로 기록)
    fn assign(&mut self, field: &str, value: Value);
}

/// JSON 값 기반 Row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: FieldValues,

    #[serde(skip)]
    changed: BTreeSet<String>,

    #[serde(skip)]
    persisted: bool,
}

impl Row {
    /// 새 Row (모든 필드가 변경된 것으로 기록)
    pub fn new(values: FieldValues) -> Self {
        let changed = values.keys().cloned().collect();
        Self {
            values,
            changed,
            persisted: false,
        }
    }

    /// 저장소에서 읽은 Row
    pub fn persisted(values: FieldValues) -> Self {
        Self {
            values,
            changed: BTreeSet::new(),
            persisted: true,
        }
    }

    /// JSON 객체에서 생성. 객체가 아니면 빈 Row.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(values) => Self::new(values),
            _ => Self::default(),
        }
    }

    /// 필드 값 설정
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.changed.insert(field.clone());
        self.values.insert(field, value);
    }

    /// 필드 값 조회
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// 전체 값
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// 저장 완료 처리
    pub fn mark_persisted(&mut self) {
        self.changed.clear();
        self.persisted = true;
    }
}

impl Entity for Row {
    fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    fn changes(&self) -> FieldValues {
        self.changed
            .iter()
            .map(|field| {
                let value = self.values.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect()
    }

    fn is_new(&self) -> bool {
        !self.persisted
    }

    fn from_values(values: FieldValues) -> Self {
        Row::new(values)
    }

    fn assign(&mut self, field: &str, value: Value) {
        self.set(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_row_tracks_all_fields() {
        let row = Row::from_json(json!({ "string": "bam", "number": 1 }));
        assert!(row.is_new());
        assert_eq!(row.changes().len(), 2);
    }

    #[test]
    fn test_persisted_row_tracks_assignments() {
        let mut row = Row::persisted(
            json!({ "id": 1, "string": "zomgstring", "number": 5 })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(!row.is_new());
        assert!(row.changes().is_empty());

        row.assign("number", json!(2));
        let changes = row.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["number"], json!(2));

        row.mark_persisted();
        assert!(row.changes().is_empty());
    }
}

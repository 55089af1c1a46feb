//! 규칙 필드 지정
//!
//! `can`/`cannot`에 넘기는 필드 인자입니다. 단일 이름, 이름 목록,
//! 이름 → 제약 쌍을 섞어서 넘길 수 있습니다.

use serde_json::{Map, Value};

use crate::constraint::Constraint;

/// 필드 이름 → 값 (생성/수정 검사 입력)
pub type FieldValues = Map<String, Value>;

/// 단일 필드 인자
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// 제약 없는 필드 하나
    Field(String),

    /// 제약 없는 필드 목록
    Fields(Vec<String>),

    /// 필드별 제약
    Constrained(Vec<(String, Constraint)>),
}

impl FieldSpec {
    /// 제약 붙은 필드 하나
    pub fn with(field: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        FieldSpec::Constrained(vec![(field.into(), constraint.into())])
    }

    /// (필드, 제약) 쌍으로 펼침
    pub fn into_entries(self) -> Vec<(String, Constraint)> {
        match self {
            FieldSpec::Field(name) => vec![(name, Constraint::Unconstrained)],
            FieldSpec::Fields(names) => names
                .into_iter()
                .map(|name| (name, Constraint::Unconstrained))
                .collect(),
            FieldSpec::Constrained(entries) => entries,
        }
    }

    /// 필드 이름만
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldSpec::Field(name) => vec![name.as_str()],
            FieldSpec::Fields(names) => names.iter().map(String::as_str).collect(),
            FieldSpec::Constrained(entries) => entries.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(name: &str) -> Self {
        FieldSpec::Field(name.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(name: String) -> Self {
        FieldSpec::Field(name)
    }
}

impl From<Vec<&str>> for FieldSpec {
    fn from(names: Vec<&str>) -> Self {
        FieldSpec::Fields(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FieldSpec {
    fn from(names: Vec<String>) -> Self {
        FieldSpec::Fields(names)
    }
}

/// `can`/`cannot`의 가변 인자 역할
///
/// 빈 목록은 "모든 필드"를 뜻합니다.
pub trait IntoFieldSpecs {
    fn into_field_specs(self) -> Vec<FieldSpec>;
}

impl IntoFieldSpecs for () {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        Vec::new()
    }
}

impl IntoFieldSpecs for FieldSpec {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self]
    }
}

impl IntoFieldSpecs for Vec<FieldSpec> {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        self
    }
}

impl IntoFieldSpecs for &str {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.into()]
    }
}

impl IntoFieldSpecs for String {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.into()]
    }
}

impl IntoFieldSpecs for Vec<&str> {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.into()]
    }
}

impl IntoFieldSpecs for Vec<String> {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.into()]
    }
}

impl IntoFieldSpecs for &[&str] {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.to_vec().into()]
    }
}

impl<const N: usize> IntoFieldSpecs for [&str; N] {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![self.to_vec().into()]
    }
}

impl<const N: usize> IntoFieldSpecs for [FieldSpec; N] {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        self.into_iter().collect()
    }
}

impl<C: Into<Constraint>> IntoFieldSpecs for (&str, C) {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![FieldSpec::with(self.0, self.1)]
    }
}

impl<const N: usize> IntoFieldSpecs for [(&str, Constraint); N] {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![FieldSpec::Constrained(
            self.into_iter()
                .map(|(name, constraint)| (name.to_string(), constraint))
                .collect(),
        )]
    }
}

impl IntoFieldSpecs for Vec<(String, Constraint)> {
    fn into_field_specs(self) -> Vec<FieldSpec> {
        vec![FieldSpec::Constrained(self)]
    }
}

//! 테이블 정의

use serde::{Deserialize, Serialize};

use super::column::Column;

/// 테이블 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// 테이블 이름
    pub name: String,

    /// 기본키 컬럼
    #[serde(default)]
    pub id: IdColumn,

    /// 기본키를 제외한 컬럼 목록
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// 기본키 컬럼
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdColumn {
    /// 컬럼 이름 (기본: `id`)
    #[serde(default = "default_id_name")]
    pub name: String,
}

fn default_id_name() -> String {
    "id".to_string()
}

impl Default for IdColumn {
    fn default() -> Self {
        Self {
            name: default_id_name(),
        }
    }
}

impl Table {
    /// 빈 테이블 생성
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: IdColumn::default(),
            columns: Vec::new(),
        }
    }

    /// 컬럼 이름 목록으로 생성
    pub fn with_fields<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(name);
        for field in fields {
            let field = field.into();
            if field != table.id.name {
                table.columns.push(Column::new(field));
            }
        }
        table
    }

    /// 기본키 이름 변경
    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.id.name = name.into();
        self
    }

    /// 기본키 이름
    pub fn primary_key(&self) -> &str {
        &self.id.name
    }

    /// 기본키 여부
    pub fn is_primary_key(&self, field: &str) -> bool {
        self.id.name == field
    }

    /// 전체 필드 이름 (기본키 먼저)
    pub fn field_names(&self) -> Vec<String> {
        std::iter::once(self.id.name.clone())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .collect()
    }

    /// 필드 존재 여부
    pub fn has_field(&self, field: &str) -> bool {
        self.is_primary_key(field) || self.columns.iter().any(|c| c.name == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_include_primary_key_first() {
        let table = Table::with_fields("dummies", ["string", "number", "id"]);
        assert_eq!(table.field_names(), vec!["id", "string", "number"]);
        assert!(table.has_field("id"));
        assert!(table.has_field("number"));
        assert!(!table.has_field("text"));
    }

    #[test]
    fn test_custom_primary_key() {
        let table = Table::with_fields("loonies", ["string"]).with_primary_key("fluffy_id");
        assert_eq!(table.primary_key(), "fluffy_id");
        assert_eq!(table.field_names(), vec!["fluffy_id", "string"]);
    }
}

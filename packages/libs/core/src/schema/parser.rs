//! 스키마 YAML 파서
//!
//! 테이블 정의 YAML을 파싱하여 [`Table`] 목록으로 변환합니다.
//!
//! ```yaml
//! tables:
//!   dummies:
//!     id: { name: id }
//!     columns:
//!       string: { nullable: true }
//!       number: {}
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use super::column::Column;
use super::table::{IdColumn, Table};
use crate::error::{Error, Result};

/// 스키마 파서
pub struct SchemaParser;

impl SchemaParser {
    /// 단일 YAML 문자열 파싱
    pub fn parse_yaml(yaml: &str) -> Result<Vec<Table>> {
        let raw: RawSchema = serde_yaml::from_str(yaml)?;
        Self::convert_raw_schema(raw)
    }

    /// 여러 YAML 파싱 (테이블 이름 중복 금지)
    pub fn parse_multiple(yamls: &[&str]) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        let mut names = HashSet::new();

        for yaml in yamls {
            for table in Self::parse_yaml(yaml)? {
                if !names.insert(table.name.clone()) {
                    return Err(Error::SchemaParse {
                        message: format!("duplicate table name: {}", table.name),
                    });
                }
                tables.push(table);
            }
        }

        Ok(tables)
    }

    /// Raw 스키마를 Table 목록으로 변환 (이름순)
    fn convert_raw_schema(raw: RawSchema) -> Result<Vec<Table>> {
        raw.tables
            .into_iter()
            .map(|(name, raw_table)| Self::convert_raw_table(name, raw_table))
            .collect()
    }

    /// Raw 테이블을 Table로 변환
    fn convert_raw_table(name: String, raw: RawTable) -> Result<Table> {
        let id = IdColumn {
            name: raw
                .id
                .and_then(|id| id.name)
                .unwrap_or_else(|| IdColumn::default().name),
        };

        // BTreeMap이므로 이름순 정렬이 유지됨
        let mut columns = Vec::new();
        for (column_name, raw_column) in raw.columns.unwrap_or_default() {
            if column_name == id.name {
                return Err(Error::SchemaParse {
                    message: format!(
                        "table '{}' declares primary key '{}' as a column",
                        name, column_name
                    ),
                });
            }

            columns.push(Column {
                name: column_name,
                nullable: raw_column.and_then(|c| c.nullable).unwrap_or(true),
            });
        }

        Ok(Table { name, id, columns })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw YAML 구조체 (serde 역직렬화용)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawSchema {
    tables: BTreeMap<String, RawTable>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    id: Option<RawIdColumn>,
    columns: Option<BTreeMap<String, Option<RawColumn>>>,
}

#[derive(Debug, Deserialize)]
struct RawIdColumn {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    nullable: Option<bool>,
}

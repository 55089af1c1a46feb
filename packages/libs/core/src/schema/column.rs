//! 컬럼 정의

use serde::{Deserialize, Serialize};

/// 컬럼 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// 컬럼 이름
    pub name: String,

    /// NULL 허용 여부
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// nullable 컬럼 생성
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
        }
    }

    /// NOT NULL 지정
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

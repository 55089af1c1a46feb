//! 권한 정책 정의
//!
//! `permissions.yaml`의 구조를 정의합니다.
//!
//! ```yaml
//! tables:
//!   posts:
//!     - roles: [public]
//!       can:
//!         read: [title, body]
//!       scope: { where: { published: true } }
//!     - roles: [authenticated]
//!       can:
//!         read: "*"
//!         create:
//!           title: ~
//!           rating: { min: 0, max: 5 }
//!           body: { cel: "size(value) < 1000" }
//!         destroy: true
//!       scope: { owner: author_id }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// 전체 권한 정책
///
/// `permissions.yaml` 파일의 루트 구조입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// 테이블별 권한 정책
    #[serde(default)]
    pub tables: HashMap<String, TablePolicy>,
}

impl PermissionPolicy {
    /// YAML 문자열 파싱
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::PolicyParse {
            message: e.to_string(),
        })
    }

    /// 테이블 정책 조회
    pub fn table(&self, name: &str) -> Option<&TablePolicy> {
        self.tables.get(name)
    }
}

/// 테이블의 규칙 목록 (선언 순서대로 모두 적용)
#[derive(Debug, Clone, Default, Serialize)]
pub struct TablePolicy {
    pub rules: Vec<PolicyRule>,
}

/// TablePolicy의 custom deserializer (shorthand 호환)
impl<'de> Deserialize<'de> for TablePolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct TablePolicyVisitor;

        impl<'de> Visitor<'de> for TablePolicyVisitor {
            type Value = TablePolicy;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sequence of policy rules or a single policy rule object")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some(rule) = seq.next_element::<PolicyRule>()? {
                    rules.push(rule);
                }
                Ok(TablePolicy { rules })
            }

            fn visit_map<M>(self, map: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: de::MapAccess<'de>,
            {
                // Shorthand: 단일 object → Vec<PolicyRule>
                let rule = PolicyRule::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(TablePolicy { rules: vec![rule] })
            }
        }

        deserializer.deserialize_any(TablePolicyVisitor)
    }
}

/// 정책 규칙 하나
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// 적용 대상 role (비어 있으면 모두)
    #[serde(default)]
    pub roles: Vec<RoleRequirement>,

    /// 액션 → 허용 필드
    #[serde(default)]
    pub can: BTreeMap<String, FieldList>,

    /// 액션 → 거부 필드 (`can` 다음에 적용)
    #[serde(default)]
    pub cannot: BTreeMap<String, FieldList>,

    /// 읽기 scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeSpec>,
}

/// 액션에 붙는 필드 지정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    /// `true` = 모든 필드 (destroy는 플래그), `false` = 무시. destroy에 필드 목록은 오류
    Flag(bool),

    /// `"*"` = 모든 필드, 그 외 = 필드 하나
    Name(String),

    /// 필드 목록
    Names(Vec<String>),

    /// 필드 → 제약 (`~`는 제약 없음)
    Constrained(BTreeMap<String, Option<ConstraintSpec>>),
}

impl FieldList {
    /// 모든 필드 지정인지
    pub fn is_all(&self) -> bool {
        matches!(self, FieldList::Flag(true)) || matches!(self, FieldList::Name(name) if name == "*")
    }

    /// 지정된 필드 이름 (모든 필드 지정이면 빈 목록)
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldList::Flag(_) => Vec::new(),
            FieldList::Name(name) if name == "*" => Vec::new(),
            FieldList::Name(name) => vec![name.as_str()],
            FieldList::Names(names) => names.iter().map(String::as_str).collect(),
            FieldList::Constrained(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// 필드 제약 지정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintSpec {
    /// `{cel: "value > 0"}`
    Cel { cel: String },

    /// `{min: 0, max: 5, exclusive: false}`
    Range(RangeSpec),

    /// 스칼라 리터럴
    Literal(Value),
}

/// 범위 제약 (`exclusive`는 상한에만 적용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,

    #[serde(default)]
    pub exclusive: bool,
}

/// 읽기 scope 지정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeSpec {
    /// `none`: 아무 Row도 보이지 않음
    Keyword(ScopeKeyword),

    /// `{owner: column}`: column 값이 주체의 sub와 같은 Row
    Owner { owner: String },

    /// `{where: {column: literal}}`
    Where {
        #[serde(rename = "where")]
        conditions: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKeyword {
    #[serde(rename = "none")]
    Nothing,
}

/// Role 요구사항
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// 인증 없이 허용
    Public,

    /// 인증된 사용자만 허용
    Authenticated,

    /// 특정 role 필요
    Role(String),
}

impl RoleRequirement {
    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Self {
        match s {
            "public" => RoleRequirement::Public,
            "authenticated" => RoleRequirement::Authenticated,
            role => RoleRequirement::Role(role.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleRequirement::Public => "public",
            RoleRequirement::Authenticated => "authenticated",
            RoleRequirement::Role(role) => role,
        }
    }
}

impl Serialize for RoleRequirement {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoleRequirement {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(RoleRequirement::from_str(value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rules() {
        let yaml = r#"
tables:
  dummies:
    - roles: [public]
      can:
        view: [string]
    - roles: [authenticated, admin]
      can:
        read: "*"
        create:
          string: ~
          number: { min: 0, max: 2 }
          text: { cel: "size(value) == 5" }
          kind: draft
        destroy: true
      cannot:
        read: text
      scope: { owner: owner_id }
"#;

        let policy = PermissionPolicy::from_yaml_str(yaml).unwrap();
        let rules = &policy.table("dummies").unwrap().rules;
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].roles, vec![RoleRequirement::Public]);
        assert_eq!(rules[0].can["view"], FieldList::Names(vec!["string".to_string()]));
        assert!(rules[0].scope.is_none());

        let second = &rules[1];
        assert_eq!(
            second.roles,
            vec![
                RoleRequirement::Authenticated,
                RoleRequirement::Role("admin".to_string())
            ]
        );
        assert!(second.can["read"].is_all());
        assert_eq!(second.can["destroy"], FieldList::Flag(true));
        assert_eq!(second.cannot["read"].names(), vec!["text"]);
        assert_eq!(
            second.scope,
            Some(ScopeSpec::Owner {
                owner: "owner_id".to_string()
            })
        );

        let FieldList::Constrained(create) = &second.can["create"] else {
            panic!("expected constrained field list");
        };
        assert_eq!(create["string"], None);
        assert_eq!(
            create["number"],
            Some(ConstraintSpec::Range(RangeSpec {
                min: Some(json!(0)),
                max: Some(json!(2)),
                exclusive: false,
            }))
        );
        assert_eq!(
            create["text"],
            Some(ConstraintSpec::Cel {
                cel: "size(value) == 5".to_string()
            })
        );
        assert_eq!(create["kind"], Some(ConstraintSpec::Literal(json!("draft"))));
    }

    #[test]
    fn test_parse_shorthand_and_scopes() {
        let yaml = r#"
tables:
  posts:
    can: { read: "*" }
    scope: none
  drafts:
    can: { read: "*" }
    scope:
      where: { published: false }
"#;

        let policy = PermissionPolicy::from_yaml_str(yaml).unwrap();

        let posts = &policy.table("posts").unwrap().rules;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].roles.is_empty());
        assert_eq!(posts[0].scope, Some(ScopeSpec::Keyword(ScopeKeyword::Nothing)));

        let drafts = &policy.table("drafts").unwrap().rules;
        let Some(ScopeSpec::Where { conditions }) = &drafts[0].scope else {
            panic!("expected where scope");
        };
        assert_eq!(conditions["published"], json!(false));
    }

    #[test]
    fn test_parse_error() {
        let err = PermissionPolicy::from_yaml_str("tables: [1, 2]").unwrap_err();
        assert_eq!(err.code(), "PERMISSION_PARSE_ERROR");
    }
}

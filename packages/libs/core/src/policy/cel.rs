//! CEL 필드 제약
//!
//! 정책의 `{cel: "..."}` 제약은 검사할 값을 `value`로, 주체 정보를 `auth`로 받는
//! bool 표현식입니다. 설치 시점에 문법을 검사하고, 평가 중 오류는 거부로 처리합니다.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use serde_json::Value;

use crate::constraint::{Constraint, Predicate};
use crate::error::{Error, Result};

/// 문법 검사
pub fn compile(expr: &str) -> Result<Program> {
    Program::compile(expr).map_err(|e| Error::CelExpression {
        message: e.to_string(),
    })
}

/// 표현식 평가
pub fn eval_bool(expr: &str, value: &Value, auth: &Value) -> Result<bool> {
    execute(&compile(expr)?, value, auth)
}

/// 컴파일된 프로그램 평가
pub fn execute(program: &Program, value: &Value, auth: &Value) -> Result<bool> {
    let mut ctx = Context::default();
    ctx.add_variable_from_value("value", json_to_cel(value.clone()));
    ctx.add_variable_from_value("auth", json_to_cel(auth.clone()));

    let result = program.execute(&ctx).map_err(|e| Error::CelExpression {
        message: e.to_string(),
    })?;

    match result {
        CelValue::Bool(b) => Ok(b),
        _ => Err(Error::CelExpression {
            message: "condition did not evaluate to bool".to_string(),
        }),
    }
}

impl Constraint {
    /// CEL 표현식 제약
    ///
    /// 문법 오류는 바로 돌려주고, 평가 오류는 경고를 남기고 거부합니다.
    pub fn cel(expr: impl Into<String>, auth: Value) -> Result<Constraint> {
        let expr = expr.into();
        let program = Arc::new(compile(&expr)?);
        Ok(Constraint::cel_program(expr, program, auth))
    }

    /// 이미 컴파일된 CEL 프로그램으로 제약 생성
    pub fn cel_program(expr: impl Into<String>, program: Arc<Program>, auth: Value) -> Constraint {
        let expr = expr.into();
        let label = expr.clone();
        let predicate = Predicate::new(move |value| match execute(&program, value, &auth) {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(expr = %expr, error = %err, "CEL constraint failed");
                false
            }
        })
        .labeled(label);

        Constraint::Predicate(predicate)
    }
}

fn json_to_cel(value: Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        Value::String(s) => CelValue::String(s.into()),
        Value::Array(arr) => {
            let values = arr.into_iter().map(json_to_cel).collect::<Vec<_>>();
            CelValue::List(Arc::new(values))
        }
        Value::Object(map) => {
            let mut obj = HashMap::new();
            for (k, v) in map {
                obj.insert(cel_interpreter::objects::Key::from(k), json_to_cel(v));
            }
            CelValue::Map(cel_interpreter::objects::Map { map: Arc::new(obj) })
        }
    }
}

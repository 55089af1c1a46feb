use super::meta::{PermissionBox, ScopeContext};
use crate::backend::QueryBackend;
use crate::insecure;
use crate::rules::Rule;

/// 규칙을 선언 순서대로 실행해 권한 박스를 만듭니다
///
/// 규칙 본문은 신뢰 모드에서 실행되므로 본문 안의 조회가 다시 권한 평가를
/// 일으키지 않습니다. 같은 입력이면 같은 박스가 나옵니다.
pub fn evaluate<S, E, B: QueryBackend>(
    rules: &[Rule<S, E, B>],
    subject: &S,
    entry: Option<&E>,
    fields: Vec<String>,
    context: ScopeContext<B>,
) -> PermissionBox<B> {
    let mut meta = PermissionBox::new(fields, context);

    tracing::trace!(
        rules = rules.len(),
        entry = entry.is_some(),
        "evaluating permission rules"
    );

    insecure::insecurely(|| {
        for rule in rules {
            rule.apply(&mut meta, subject, entry);
        }
    });

    meta
}

//! 신뢰 실행 모드 (insecurely)
//!
//! 규칙 본문이나 predicate가 다른 보호 대상을 조회할 때 재귀적인 권한 평가가
//! 일어나지 않도록 모든 검사를 끕니다. 중첩 깊이를 세므로 가장 바깥 블록이
//! 끝날 때만 검사가 다시 켜집니다. panic으로 빠져나가도 guard의 `Drop`이
//! 깊이를 되돌립니다.
//!
//! 동기 코드는 thread-local 카운터를, async 코드는 tokio task-local 카운터를 사용합니다.

use std::cell::Cell;
use std::future::Future;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

tokio::task_local! {
    static TASK_DEPTH: usize;
}

/// 신뢰 모드 RAII guard
///
/// 생성한 스레드에서만 해제되어야 하므로 `Send`가 아닙니다.
#[must_use = "trusted mode ends as soon as the guard is dropped"]
pub struct InsecureGuard {
    _not_send: PhantomData<*const ()>,
}

impl InsecureGuard {
    /// 신뢰 모드 진입
    pub fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for InsecureGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// 모든 권한 검사를 끈 채로 `f` 실행
pub fn insecurely<T>(f: impl FnOnce() -> T) -> T {
    let _guard = InsecureGuard::enter();
    f()
}

/// async 버전: 현재 task 안에서만 검사를 끕니다
pub async fn insecurely_async<F: Future>(future: F) -> F::Output {
    let depth = TASK_DEPTH.try_with(|depth| *depth).unwrap_or(0);
    TASK_DEPTH.scope(depth + 1, future).await
}

/// 신뢰 모드가 켜져 있는지
pub fn is_active() -> bool {
    depth() > 0
}

/// 현재 중첩 깊이 (thread + task)
pub fn depth() -> usize {
    let thread = DEPTH.with(|depth| depth.get());
    let task = TASK_DEPTH.try_with(|depth| *depth).unwrap_or(0);
    thread + task
}

//! 주체 바인딩
//!
//! 보호 대상 객체(단일 엔티티 래퍼, 컬렉션 쿼리)가 "누가 접근하는가"를 기억하는 방법입니다.
//! 주체는 `None`일 수도 있습니다 (예: 비로그인 사용자). 바인딩 여부와 주체 값은 별개입니다.

use crate::error::{Error, Result};
use crate::insecure;

/// 주체 바인딩 상태
#[derive(Debug, Clone)]
pub struct Restriction<S> {
    subject: Option<S>,
    bound: bool,
}

impl<S> Restriction<S> {
    /// 바인딩되지 않은 상태
    pub fn unbound() -> Self {
        Self {
            subject: None,
            bound: false,
        }
    }

    /// 주체에 바인딩된 상태
    pub fn bound(subject: S) -> Self {
        Self {
            subject: Some(subject),
            bound: true,
        }
    }

    /// 주체 바인딩 (이전 주체를 대체)
    pub fn bind(&mut self, subject: S) {
        self.subject = Some(subject);
        self.bound = true;
    }

    /// 바인딩 해제
    pub fn clear(&mut self) {
        self.subject = None;
        self.bound = false;
    }

    /// 바인딩된 주체
    ///
    /// 바인딩되지 않았으면 [`Error::UnprotectedAccess`]입니다.
    pub fn subject(&self) -> Result<&S> {
        match (&self.subject, self.bound) {
            (Some(subject), true) => Ok(subject),
            _ => Err(Error::UnprotectedAccess),
        }
    }

    /// 권한 검사가 실제로 적용되는지 (신뢰 모드에서는 항상 `false`)
    pub fn is_bound(&self) -> bool {
        self.bound && !insecure::is_active()
    }

    /// 신뢰 모드와 무관하게 주체가 설정돼 있는지
    pub fn has_subject(&self) -> bool {
        self.bound
    }
}

impl<S> Default for Restriction<S> {
    fn default() -> Self {
        Self::unbound()
    }
}

/// 주체를 바인딩할 수 있는 객체
///
/// 구현체는 [`Restrictable::restriction`]과 [`Restrictable::restriction_mut`]만 제공하면 됩니다.
/// 주체가 바뀌면 [`Restrictable::invalidate`]가 호출되어 캐시된 권한 박스를 버립니다.
pub trait Restrictable<S>: Sized {
    fn restriction(&self) -> &Restriction<S>;

    fn restriction_mut(&mut self) -> &mut Restriction<S>;

    /// 주체 변경 시 캐시 무효화
    fn invalidate(&mut self) {}

    /// 주체 바인딩 (체이닝용)
    fn restrict(mut self, subject: S) -> Self {
        self.restrict_mut(subject);
        self
    }

    /// 주체 바인딩 (제자리)
    fn restrict_mut(&mut self, subject: S) {
        self.restriction_mut().bind(subject);
        self.invalidate();
    }

    /// 바인딩 해제
    fn unrestrict(&mut self) {
        self.restriction_mut().clear();
        self.invalidate();
    }

    fn subject(&self) -> Result<&S> {
        self.restriction().subject()
    }

    fn is_bound(&self) -> bool {
        self.restriction().is_bound()
    }
}

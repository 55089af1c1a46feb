//! 전역 설정
//!
//! paranoid 모드와 strong parameters 여부를 프로세스 단위로 보관합니다.
//! 모델별로 paranoid 값을 고정할 수 있으며 ([`crate::Model::with_paranoid`]),
//! 고정하지 않은 모델은 박스 평가 시점의 전역 값을 읽습니다.

use std::env;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static CONFIG: Lazy<RwLock<GuardConfig>> = Lazy::new(|| RwLock::new(GuardConfig::default()));

/// 권한 엔진 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// scope가 하나도 없으면 모든 Row를 숨김 (deny-by-default)
    #[serde(default)]
    pub paranoid: bool,

    /// 새 엔티티 생성 시 create 권한이 있는 필드만 받아들임
    #[serde(default = "default_strong_parameters")]
    pub strong_parameters: bool,
}

fn default_strong_parameters() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            paranoid: false,
            strong_parameters: default_strong_parameters(),
        }
    }
}

impl GuardConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            paranoid: env::var("STK_GUARD_PARANOID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.paranoid),

            strong_parameters: env::var("STK_GUARD_STRONG_PARAMETERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strong_parameters),
        }
    }

    /// YAML 문자열에서 설정 로드
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }
}

/// 전역 설정 교체
pub fn install(config: GuardConfig) {
    tracing::info!(
        paranoid = config.paranoid,
        strong_parameters = config.strong_parameters,
        "installing guard config"
    );
    *CONFIG.write() = config;
}

/// 현재 전역 설정 스냅샷
pub fn current() -> GuardConfig {
    CONFIG.read().clone()
}

/// 전역 paranoid 모드 여부
pub fn paranoid() -> bool {
    CONFIG.read().paranoid
}

/// 전역 strong parameters 여부
pub fn strong_parameters() -> bool {
    CONFIG.read().strong_parameters
}

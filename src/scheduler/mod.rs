/// 단계 자동 전환 스케줄러
/// 주기적으로 일정이 있는 경매를 훑어 마감 시각이 지난 단계로 전진시킨다.
/// 한 틱을 놓쳐도 다음 틱이 가장 멀리 도래한 단계로 한 번에 이동하므로
/// 중간 단계를 일일이 거치지 않는다.
// region:    --- Imports
use crate::auction::phase;
use crate::database::DatabaseManager;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Phase Scheduler

const DEFAULT_INTERVAL_SECS: u64 = 30;

/// 단계 자동 전환 스케줄러
pub struct PhaseScheduler {
    db: Arc<DatabaseManager>,
    interval_secs: u64,
}

impl PhaseScheduler {
    /// 스케줄러 생성 (주기는 PHASE_ADVANCE_INTERVAL_SECS, 기본 30초)
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        let interval_secs = std::env::var("PHASE_ADVANCE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        Self { db, interval_secs }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let db = Arc::clone(&self.db);
        let interval_secs = self.interval_secs;
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match phase::run_phase_auto_advance(&db, Utc::now()).await {
                    Ok(result) => {
                        debug!(
                            "{:<12} --> 단계 스캔 완료: scanned={}, advanced={}",
                            "Scheduler", result.scanned, result.advanced
                        );
                    }
                    Err(e) => {
                        error!("{:<12} --> 단계 전환 중 오류 발생: {:?}", "Scheduler", e);
                    }
                }
            }
        });
    }
}

// endregion: --- Phase Scheduler

use chrono::Utc;
use tokio::time::Duration;

pub struct TimeUtil {}

impl TimeUtil {
    #[inline(always)]
    pub async fn sleep_millis(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    #[inline(always)]
    pub fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }
}

//! 业务指标模块
//!
//! 基于 metrics crate 记录指标，导出由部署环境安装的 recorder 负责。
//! 未安装 recorder 时所有记录都是空操作。

use std::time::Duration;

pub const IMMERSION_RUNS_TOTAL: &str = "immersion_runs_total";
pub const IMMERSION_STEPS: &str = "immersion_steps";
pub const IMMERSION_DURATION_SECONDS: &str = "immersion_duration_seconds";
pub const ACTION_DISPATCH_TOTAL: &str = "action_dispatch_total";

/// 注册指标描述
pub fn register_metrics() {
    metrics::describe_counter!(IMMERSION_RUNS_TOTAL, "Total number of immersion runs by outcome");
    metrics::describe_histogram!(IMMERSION_STEPS, "Transitions taken per immersion run");
    metrics::describe_histogram!(
        IMMERSION_DURATION_SECONDS,
        "Immersion run duration in seconds"
    );
    metrics::describe_counter!(
        ACTION_DISPATCH_TOTAL,
        "Total number of actions handed to the dispatcher"
    );
}

/// 记录一次回放
pub fn record_immersion(outcome: &'static str, steps: u32, duration: Duration) {
    metrics::counter!(IMMERSION_RUNS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(IMMERSION_STEPS).record(steps as f64);
    metrics::histogram!(IMMERSION_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// 记录一次动作下发
pub fn record_dispatch(action_type: &'static str, success: bool) {
    metrics::counter!(
        ACTION_DISPATCH_TOTAL,
        "action_type" => action_type,
        "success" => if success { "true" } else { "false" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_metrics();
        record_immersion("terminal", 3, Duration::from_millis(12));
        record_dispatch("TAG_USER", true);
    }
}

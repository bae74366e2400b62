use std::fmt;

use tracing::warn;
use workload_core::{HealthStatus, StatusCode, StatusDesc};

/// 原生状态的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeSource {
    /// Metronome run.status
    MetronomeRun,
    /// Spark standalone submission driverState
    SparkDriver,
    /// Flink REST /jobs/{id} state
    FlinkJob,
    /// spark-on-k8s-operator status.applicationState.state
    SparkOperator,
    /// flink operator status.components.job.state
    FlinkOperator,
}

const METRONOME_RUN: &[(&str, StatusCode)] = &[
    ("INITIAL", StatusCode::Unschedulable),
    ("STARTING", StatusCode::Running),
    ("ACTIVE", StatusCode::Running),
    ("SUCCESS", StatusCode::StoppedOnOk),
    ("FAILED", StatusCode::StoppedOnFailed),
];

const SPARK_DRIVER: &[(&str, StatusCode)] = &[
    ("SUBMITTED", StatusCode::Unschedulable),
    ("QUEUED", StatusCode::Running),
    ("RUNNING", StatusCode::Running),
    ("RELAUNCHING", StatusCode::Running),
    ("FINISHED", StatusCode::StoppedOnOk),
    ("FAILED", StatusCode::StoppedOnFailed),
    ("ERROR", StatusCode::StoppedOnFailed),
    ("KILLED", StatusCode::StoppedByKilled),
    ("UNKNOWN", StatusCode::Unknown),
];

const FLINK_JOB: &[(&str, StatusCode)] = &[
    ("INITIALIZING", StatusCode::Unschedulable),
    ("CREATED", StatusCode::Unschedulable),
    ("RUNNING", StatusCode::Running),
    ("FINISHED", StatusCode::StoppedOnOk),
    ("FAILED", StatusCode::StoppedOnFailed),
    ("FAILING", StatusCode::StoppedOnFailed),
    ("RESTARTING", StatusCode::StoppedOnFailed),
    ("CANCELLING", StatusCode::StoppedByKilled),
    ("CANCELED", StatusCode::StoppedByKilled),
];

const SPARK_OPERATOR: &[(&str, StatusCode)] = &[
    ("", StatusCode::Unschedulable),
    ("SUBMITTED", StatusCode::Unschedulable),
    ("RUNNING", StatusCode::Running),
    ("COMPLETED", StatusCode::StoppedOnOk),
    ("SUCCEEDING", StatusCode::StoppedOnOk),
    ("FAILING", StatusCode::StoppedOnFailed),
    ("FAILED", StatusCode::StoppedOnFailed),
    ("SUBMISSION_FAILED", StatusCode::StoppedOnFailed),
    ("INVALIDATING", StatusCode::StoppedOnFailed),
    ("PENDING_RERUN", StatusCode::StoppedOnFailed),
    ("UNKNOWN", StatusCode::Unknown),
];

const FLINK_OPERATOR: &[(&str, StatusCode)] = &[
    ("Pending", StatusCode::Unschedulable),
    ("Running", StatusCode::Running),
    ("Updating", StatusCode::Running),
    ("Succeeded", StatusCode::StoppedOnOk),
    ("Failed", StatusCode::StoppedOnFailed),
    ("Cancelled", StatusCode::StoppedByKilled),
    ("Unknown", StatusCode::Unknown),
];

impl NativeSource {
    pub const ALL: [NativeSource; 5] = [
        NativeSource::MetronomeRun,
        NativeSource::SparkDriver,
        NativeSource::FlinkJob,
        NativeSource::SparkOperator,
        NativeSource::FlinkOperator,
    ];

    pub fn table(&self) -> &'static [(&'static str, StatusCode)] {
        match self {
            NativeSource::MetronomeRun => METRONOME_RUN,
            NativeSource::SparkDriver => SPARK_DRIVER,
            NativeSource::FlinkJob => FLINK_JOB,
            NativeSource::SparkOperator => SPARK_OPERATOR,
            NativeSource::FlinkOperator => FLINK_OPERATOR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NativeSource::MetronomeRun => "metronome",
            NativeSource::SparkDriver => "spark",
            NativeSource::FlinkJob => "flink",
            NativeSource::SparkOperator => "k8sspark",
            NativeSource::FlinkOperator => "k8sflink",
        }
    }
}

impl fmt::Display for NativeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 查表，大小写不敏感
pub fn lookup(source: NativeSource, native: &str) -> Option<StatusCode> {
    let native = native.trim();
    source
        .table()
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(native))
        .map(|(_, code)| *code)
}

/// 原生状态 → 规范状态
///
/// 映射到 `Unknown` 时原生值保留在 last_message 中。
pub fn normalize(source: NativeSource, native: &str) -> StatusDesc {
    match lookup(source, native) {
        Some(StatusCode::Unknown) => StatusDesc::with_message(
            StatusCode::Unknown,
            format!("{source} status: {native}"),
        ),
        Some(code) => StatusDesc::new(code),
        None => {
            warn!(source = %source, native = %native, "未识别的原生状态");
            StatusDesc::with_message(
                StatusCode::Unknown,
                format!("unknown {source} status: {native}"),
            )
        }
    }
}

/// Metronome 作业状态
///
/// 有 run 时取第一个 run 的状态；没有 run 时依次看 activeRuns、成功历史、失败历史，
/// 都没有则为 `Unknown`。
pub fn metronome_job_status(
    first_run: Option<&str>,
    active_runs: usize,
    successful_runs: usize,
    failed_runs: usize,
) -> StatusDesc {
    if let Some(run_status) = first_run {
        return normalize(NativeSource::MetronomeRun, run_status);
    }
    if active_runs > 0 {
        StatusDesc::new(StatusCode::Running)
    } else if successful_runs > 0 {
        StatusDesc::new(StatusCode::StoppedOnOk)
    } else if failed_runs > 0 {
        StatusDesc::new(StatusCode::StoppedOnFailed)
    } else {
        StatusDesc::with_message(StatusCode::Unknown, "no runs and no history")
    }
}

/// operator 上报的健康状态，只认 `Healthy`/`Ready`/`Running`
pub fn addon_health(native: &str) -> HealthStatus {
    let native = native.trim();
    HealthStatus::from_ready(
        ["Healthy", "Ready", "Running"]
            .iter()
            .any(|s| s.eq_ignore_ascii_case(native)),
    )
}

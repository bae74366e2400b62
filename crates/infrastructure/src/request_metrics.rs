use metrics::counter;

/// 执行器对后端的一次操作
pub fn record_executor_request(kind: &str, op: &'static str) {
    counter!("workload_executor_requests_total", "kind" => kind.to_string(), "op" => op)
        .increment(1);
}

pub fn record_http_retry(method: &'static str) {
    counter!("workload_http_retries_total", "method" => method).increment(1);
}

/// 原生状态无法识别时计数，便于发现后端新增的状态值
pub fn record_status_unknown(kind: &str) {
    counter!("workload_status_unknown_total", "kind" => kind.to_string()).increment(1);
}

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use workload_core::{
    ClusterConfig, HttpClient, HttpConfig, HttpRequest, HttpResponse, Method, RequestBody, Result,
    RetryConfig, WorkloadError,
};

use crate::request_metrics::record_http_retry;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// 基于 reqwest 的 HTTP 协作者
///
/// 负责超时、5xx/网络错误重试，以及按集群名把请求转到集群内网入口。
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
    cluster_routes: HashMap<String, String>,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| WorkloadError::config_error(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
            cluster_routes: HashMap::new(),
        })
    }

    /// 指定集群的请求改走 `address`
    pub fn with_cluster_route<N: Into<String>, A: Into<String>>(mut self, cluster: N, address: A) -> Self {
        self.cluster_routes.insert(cluster.into(), address.into());
        self
    }

    /// 按配置登记所有设置了 `route` 的集群
    pub fn with_cluster_routes(self, clusters: &[ClusterConfig]) -> Self {
        clusters.iter().fold(self, |client, cluster| match &cluster.route {
            Some(route) => client.with_cluster_route(cluster.name.clone(), route.clone()),
            None => client,
        })
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    fn resolve_url(&self, request: &HttpRequest) -> String {
        match request
            .cluster
            .as_ref()
            .and_then(|name| self.cluster_routes.get(name))
        {
            Some(address) => HttpRequest {
                host: address.clone(),
                ..request.clone()
            }
            .url(),
            None => request.url(),
        }
    }

    fn build(&self, request: &HttpRequest, url: &str, request_id: &str) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Raw(raw)) => builder.body(raw.clone()),
            None => builder,
        }
    }

    async fn backoff(&self, request: &HttpRequest, attempt: u32, reason: &str) {
        let delay: Duration = self.retry.delay_for(attempt);
        warn!(
            method = %request.method,
            path = %request.path,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "HTTP请求失败，准备重试"
        );
        record_http_retry(request.method.as_str());
        tokio::time::sleep(delay).await;
    }
}

fn map_send_error(e: reqwest::Error, url: &str) -> WorkloadError {
    if e.is_timeout() {
        WorkloadError::Timeout(format!("请求超时: {url}: {e}"))
    } else {
        WorkloadError::transport(format!("请求失败: {url}: {e}"))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.resolve_url(&request);
        let request_id = Uuid::new_v4().to_string();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(
                method = %request.method,
                url = %url,
                attempt = attempt,
                request_id = %request_id,
                "发送HTTP请求"
            );
            let outcome = self.build(&request, &url, &request_id).send().await;
            let can_retry = attempt < max_attempts;

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status >= 500 && self.retry.retry_on_5xx && can_retry {
                        self.backoff(&request, attempt, &format!("status={status}"))
                            .await;
                        attempt += 1;
                        continue;
                    }
                    let body = response.text().await.map_err(|e| map_send_error(e, &url))?;
                    return Ok(HttpResponse::new(status, body));
                }
                Err(e) => {
                    let err = map_send_error(e, &url);
                    if self.retry.retry_on_transport_error && can_retry {
                        self.backoff(&request, attempt, &err.to_string()).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

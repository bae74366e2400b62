//! HTTP 协作者接口
//!
//! 执行器和 addon operator 只依赖这里的抽象："对某个 host 发起某个方法的
//! 请求，带上路径、参数、请求头和可选的请求体，拿回状态码和响应体"。
//! 重试策略、连接池、按集群拨号都由实现方负责。

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Result, WorkloadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// 需要走集群内网拨号时指定集群名
    pub cluster: Option<String>,
}

impl HttpRequest {
    pub fn new<H: Into<String>, P: Into<String>>(method: Method, host: H, path: P) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            cluster: None,
        }
    }

    pub fn get<H: Into<String>, P: Into<String>>(host: H, path: P) -> Self {
        Self::new(Method::Get, host, path)
    }

    pub fn post<H: Into<String>, P: Into<String>>(host: H, path: P) -> Self {
        Self::new(Method::Post, host, path)
    }

    pub fn put<H: Into<String>, P: Into<String>>(host: H, path: P) -> Self {
        Self::new(Method::Put, host, path)
    }

    pub fn patch<H: Into<String>, P: Into<String>>(host: H, path: P) -> Self {
        Self::new(Method::Patch, host, path)
    }

    pub fn delete<H: Into<String>, P: Into<String>>(host: H, path: P) -> Self {
        Self::new(Method::Delete, host, path)
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn raw<S: Into<String>>(mut self, body: S) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }

    pub fn cluster<S: Into<String>>(mut self, cluster: S) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// 完整 URL（不含查询参数）
    pub fn url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        if self.path.starts_with('/') {
            format!("{host}{}", self.path)
        } else {
            format!("{host}/{}", self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            WorkloadError::Serialization(format!(
                "解析响应失败: {e}, status={}, body={}",
                self.status, self.body
            ))
        })
    }

    /// 非 2xx 响应转换为错误
    pub fn into_error(self) -> WorkloadError {
        match self.status {
            404 => WorkloadError::not_found(self.body),
            409 => WorkloadError::conflict(self.body),
            status => WorkloadError::backend(status, self.body),
        }
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let req = HttpRequest::get("metronome.marathon.l4lb.thisdcos.directory:9000", "/v1/jobs");
        assert_eq!(
            req.url(),
            "http://metronome.marathon.l4lb.thisdcos.directory:9000/v1/jobs"
        );
        let req = HttpRequest::get("https://k8s.example.com/", "apis/apps/v1");
        assert_eq!(req.url(), "https://k8s.example.com/apis/apps/v1");
    }

    #[test]
    fn test_response_error_mapping() {
        assert!(HttpResponse::new(404, "").into_error().is_not_found());
        assert!(HttpResponse::new(409, "exists").into_error().is_conflict());
        assert!(HttpResponse::new(502, "").into_error().is_retryable());
    }
}

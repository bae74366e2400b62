//! Kubernetes REST 访问
//!
//! 只覆盖执行器和 addon operator 用到的几个动作：确保 namespace、
//! 对资源做增删改查、通过 discovery 判断 CRD 是否存在。对象本身用
//! serde 结构或 `serde_json::Value` 表示，不依赖 client 库。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use workload_core::{Capability, HttpClient, HttpRequest, Method, Result};

/// 创建结果：已存在不算错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// 资源 REST 路径
///
/// `v1` 走核心组 `/api/v1`，其他 group 走 `/apis/<group>/<version>`。
pub fn resource_path(api_version: &str, namespace: Option<&str>, plural: &str, name: Option<&str>) -> String {
    let mut path = if api_version == "v1" {
        "/api/v1".to_string()
    } else {
        format!("/apis/{api_version}")
    };
    if let Some(ns) = namespace {
        path.push_str(&format!("/namespaces/{ns}"));
    }
    path.push('/');
    path.push_str(plural);
    if let Some(name) = name {
        path.push('/');
        path.push_str(name);
    }
    path
}

#[derive(Debug, Deserialize)]
struct ApiResourceList {
    #[serde(default)]
    resources: Vec<ApiResource>,
}

#[derive(Debug, Deserialize)]
struct ApiResource {
    name: String,
}

#[derive(Clone)]
pub struct K8sApi {
    http: Arc<dyn HttpClient>,
    address: String,
    cluster: Option<String>,
}

impl K8sApi {
    pub fn new<A: Into<String>>(http: Arc<dyn HttpClient>, address: A) -> Self {
        Self {
            http,
            address: address.into(),
            cluster: None,
        }
    }

    /// 请求带上集群名，由 HTTP 协作者决定拨号方式
    pub fn with_cluster<S: Into<String>>(mut self, cluster: S) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn request(&self, method: Method, path: &str) -> HttpRequest {
        let req = HttpRequest::new(method, self.address.clone(), path);
        match &self.cluster {
            Some(cluster) => req.cluster(cluster.clone()),
            None => req,
        }
    }

    /// 读取资源，不存在返回 `None`
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let resp = self.http.execute(self.request(Method::Get, path)).await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        resp.json().map(Some)
    }

    pub async fn create<T: Serialize>(&self, path: &str, body: &T) -> Result<CreateOutcome> {
        let resp = self
            .http
            .execute(self.request(Method::Post, path).json(body)?)
            .await?;
        if resp.is_conflict() {
            info!(path = %path, "资源已存在");
            return Ok(CreateOutcome::AlreadyExists);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        Ok(CreateOutcome::Created)
    }

    pub async fn replace<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let resp = self
            .http
            .execute(self.request(Method::Put, path).json(body)?)
            .await?;
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        Ok(())
    }

    /// 删除资源，返回资源删除前是否存在
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let resp = self
            .http
            .execute(
                self.request(Method::Delete, path)
                    .json(&json!({"propagationPolicy": "Background"}))?,
            )
            .await?;
        if resp.is_not_found() {
            debug!(path = %path, "资源不存在，视为已删除");
            return Ok(false);
        }
        if !resp.is_ok() {
            return Err(resp.into_error());
        }
        Ok(true)
    }

    pub async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let body = json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": namespace },
        });
        self.create(&resource_path("v1", None, "namespaces", None), &body)
            .await
            .map(|_| ())
    }

    pub async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.delete(&resource_path("v1", None, "namespaces", Some(namespace)))
            .await
            .map(|_| ())
    }

    pub async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let ns: Option<serde_json::Value> = self
            .get(&resource_path("v1", None, "namespaces", Some(namespace)))
            .await?;
        Ok(ns.is_some())
    }

    /// 通过 discovery 判断集群是否提供某个资源
    ///
    /// 任何失败都降级为"不支持"。
    pub async fn supports(&self, api_version: &str, plural: &str) -> Capability {
        let path = if api_version == "v1" {
            "/api/v1".to_string()
        } else {
            format!("/apis/{api_version}")
        };
        match self.get::<ApiResourceList>(&path).await {
            Ok(Some(list)) if list.resources.iter().any(|r| r.name == plural) => {
                Capability::supported()
            }
            Ok(Some(_)) => Capability::unsupported(format!("{api_version} 中没有资源 {plural}")),
            Ok(None) => Capability::unsupported(format!("集群未安装 {api_version}")),
            Err(e) => Capability::unsupported(format!("探测 {api_version} 失败: {e}")),
        }
    }
}

/// 非 2xx 的 Kubernetes 响应里提取 message 字段
pub fn status_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

impl std::fmt::Debug for K8sApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sApi")
            .field("address", &self.address)
            .field("cluster", &self.cluster)
            .finish()
    }
}

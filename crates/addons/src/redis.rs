//! Redis addon：RedisFailover CR 加一个存放密码的 Secret
//!
//! operator 会生成 `rfr-<id>` StatefulSet（redis）和 `rfs-<id>` Deployment
//! （sentinel）。删除时必须等 StatefulSet 消失后再删 namespace，否则 PVC
//! 会被卡在 Terminating。

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use workload_core::{
    AddonConfig, Capability, HealthStatus, PlacementConfig, Result, Service, ServiceGroup,
    WorkloadError,
};
use workload_infrastructure::{resource_path, K8sApi};

use crate::operator::{
    group_affinity, require_exact_services, require_operator, service_domain, Affinity, AddonKind,
    AddonOperator, ObjectMeta, Resources, Secret, Versioned, Workload,
};

pub const REDIS_API_VERSION: &str = "redis.redis.opstreelabs.in/v1beta1";
pub const REDIS_RESOURCE: &str = "redisfailovers";
pub const REDIS_SERVICE: &str = "redis";
pub const SENTINEL_SERVICE: &str = "redis-sentinel";
const PASSWORD_ENV: &str = "requirepass";
const PASSWORD_KEY: &str = "password";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisFailover {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: RedisFailoverSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisFailoverSpec {
    pub redis: RedisComponent,
    pub sentinel: RedisComponent,
    pub auth: RedisAuth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisComponent {
    pub replicas: u32,
    pub image: String,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_config: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Affinity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisAuth {
    pub secret_path: String,
}

/// `convert` 的产物：CR 与密码 Secret 成对出现
#[derive(Debug, Clone, PartialEq)]
pub struct RedisResource {
    pub failover: RedisFailover,
    pub secret: Secret,
}

pub fn redis_statefulset(id: &str) -> String {
    format!("rfr-{id}")
}

pub fn sentinel_deployment(id: &str) -> String {
    format!("rfs-{id}")
}

fn secret_name(id: &str) -> String {
    format!("redis-password-{id}")
}

#[derive(Debug)]
pub struct RedisOperator {
    api: K8sApi,
    placement: PlacementConfig,
    remove_timeout: Duration,
    poll_interval: Duration,
}

impl RedisOperator {
    pub fn new(api: K8sApi, config: &AddonConfig, placement: PlacementConfig) -> Self {
        Self {
            api,
            placement,
            remove_timeout: config.remove_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    fn cr_path(namespace: &str, name: Option<&str>) -> String {
        resource_path(REDIS_API_VERSION, Some(namespace), REDIS_RESOURCE, name)
    }

    async fn workload_ready(&self, namespace: &str, plural: &str, name: &str) -> Result<bool> {
        let workload: Option<Workload> = self
            .api
            .get(&resource_path("apps/v1", Some(namespace), plural, Some(name)))
            .await?;
        Ok(workload.is_some_and(|w| w.ready()))
    }

    /// 轮询直到 StatefulSet 被 operator 回收
    async fn await_statefulset_gone(&self, namespace: &str, name: &str) -> Result<()> {
        let path = resource_path("apps/v1", Some(namespace), "statefulsets", Some(name));
        let started = Instant::now();
        let wait = async {
            loop {
                let sts: Option<serde_json::Value> = self.api.get(&path).await?;
                if sts.is_none() {
                    return Ok::<_, WorkloadError>(());
                }
                debug!(namespace = %namespace, statefulset = %name, "等待 StatefulSet 删除");
                sleep(self.poll_interval).await;
            }
        };
        match timeout(self.remove_timeout, wait).await {
            Ok(result) => {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "StatefulSet 已删除");
                result
            }
            Err(_) => Err(WorkloadError::Timeout(format!(
                "等待 {namespace}/{name} 删除超过 {}s",
                self.remove_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl AddonOperator for RedisOperator {
    type Resource = RedisResource;

    fn kind(&self) -> AddonKind {
        AddonKind::Redis
    }

    async fn is_supported(&self) -> Capability {
        self.api.supports(REDIS_API_VERSION, REDIS_RESOURCE).await
    }

    fn validate(&self, sg: &ServiceGroup) -> Result<()> {
        require_operator(sg, AddonKind::Redis)?;
        require_exact_services(sg, &[REDIS_SERVICE, SENTINEL_SERVICE])?;
        let redis = sg
            .service(REDIS_SERVICE)
            .ok_or_else(|| WorkloadError::validation_error("缺少服务 redis"))?;
        if redis.env.get(PASSWORD_ENV).is_none_or(|p| p.is_empty()) {
            return Err(WorkloadError::validation_error(format!(
                "{}: redis 未设置 {PASSWORD_ENV}",
                sg.namespace()
            )));
        }
        Ok(())
    }

    fn convert(&self, sg: &ServiceGroup) -> Result<RedisResource> {
        self.validate(sg)?;
        let ns = sg.namespace();
        let (Some(redis), Some(sentinel)) = (sg.service(REDIS_SERVICE), sg.service(SENTINEL_SERVICE))
        else {
            return Err(WorkloadError::validation_error("缺少 redis 或 redis-sentinel 服务"));
        };
        let password = redis.env.get(PASSWORD_ENV).cloned().unwrap_or_default();
        let affinity = group_affinity(sg, &self.placement);

        let component = |service: &Service, config: BTreeMap<String, String>| RedisComponent {
            replicas: service.scale,
            image: service.image.clone(),
            resources: Resources::of(service),
            custom_config: config,
            affinity: affinity.clone(),
        };

        Ok(RedisResource {
            failover: RedisFailover {
                api_version: REDIS_API_VERSION.to_string(),
                kind: "RedisFailover".to_string(),
                metadata: ObjectMeta::new(sg.id.clone(), ns.clone()).with_labels(sg.labels.clone()),
                spec: RedisFailoverSpec {
                    redis: component(
                        redis,
                        BTreeMap::from([("maxmemory-policy".to_string(), "allkeys-lru".to_string())]),
                    ),
                    sentinel: component(sentinel, BTreeMap::new()),
                    auth: RedisAuth {
                        secret_path: secret_name(&sg.id),
                    },
                },
            },
            secret: Secret::opaque(
                ObjectMeta::new(secret_name(&sg.id), ns),
                BTreeMap::from([(PASSWORD_KEY.to_string(), password)]),
            ),
        })
    }

    async fn create(&self, resource: &RedisResource) -> Result<()> {
        let ns = &resource.failover.metadata.namespace;
        self.api.ensure_namespace(ns).await?;
        self.api
            .create(&resource_path("v1", Some(ns), "secrets", None), &resource.secret)
            .await?;
        let outcome = self.api.create(&Self::cr_path(ns, None), &resource.failover).await?;
        info!(namespace = %ns, outcome = ?outcome, "RedisFailover 已提交");
        Ok(())
    }

    async fn inspect(&self, sg: &ServiceGroup) -> Result<ServiceGroup> {
        let ns = sg.namespace();
        let cr: Option<serde_json::Value> = self.api.get(&Self::cr_path(&ns, Some(&sg.id))).await?;
        if cr.is_none() {
            return Err(WorkloadError::not_found(format!("{ns}/{}", sg.id)));
        }

        let redis_name = redis_statefulset(&sg.id);
        let sentinel_name = sentinel_deployment(&sg.id);
        let redis_ready = self.workload_ready(&ns, "statefulsets", &redis_name).await?;
        let sentinel_ready = self.workload_ready(&ns, "deployments", &sentinel_name).await?;

        let mut inspected = sg.clone();
        for (service, ready, backing) in [
            (REDIS_SERVICE, redis_ready, &redis_name),
            (SENTINEL_SERVICE, sentinel_ready, &sentinel_name),
        ] {
            if let Some(s) = inspected.service_mut(service) {
                s.status = HealthStatus::from_ready(ready);
                s.vip = Some(service_domain(backing, &ns));
            }
        }
        inspected.refresh_status();
        Ok(inspected)
    }

    async fn remove(&self, sg: &ServiceGroup) -> Result<()> {
        let ns = sg.namespace();
        if !self.api.delete(&Self::cr_path(&ns, Some(&sg.id))).await? {
            warn!(namespace = %ns, "RedisFailover 不存在");
        }
        self.await_statefulset_gone(&ns, &redis_statefulset(&sg.id)).await?;
        self.api.delete_namespace(&ns).await?;
        info!(namespace = %ns, "Redis 已删除");
        Ok(())
    }

    async fn update(&self, resource: &RedisResource) -> Result<()> {
        let meta = &resource.failover.metadata;
        let path = Self::cr_path(&meta.namespace, Some(&meta.name));
        let current: Versioned = self
            .api
            .get(&path)
            .await?
            .ok_or_else(|| WorkloadError::not_found(format!("{}/{}", meta.namespace, meta.name)))?;
        let mut next = resource.failover.clone();
        next.metadata.resource_version = current.metadata.resource_version;
        self.api.replace(&path, &next).await
    }
}

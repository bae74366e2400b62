use std::sync::Arc;

use tracing::{info, instrument};

use workload_core::{AppConfig, Capability, HttpClient, Result, ServiceGroup};
use workload_infrastructure::K8sApi;

use crate::daemonset::{DaemonSet, DaemonSetOperator};
use crate::elasticsearch::{ElasticsearchOperator, ElasticsearchResource};
use crate::mysql::{MysqlCluster, MysqlOperator, PasswordGenerator};
use crate::operator::{AddonKind, AddonOperator};
use crate::redis::{RedisOperator, RedisResource};

/// `convert` 产物的闭合集合
#[derive(Debug, Clone, PartialEq)]
pub enum AddonResource {
    Mysql(MysqlCluster),
    Redis(RedisResource),
    Elasticsearch(ElasticsearchResource),
    DaemonSet(DaemonSet),
}

impl AddonResource {
    pub fn kind(&self) -> AddonKind {
        match self {
            AddonResource::Mysql(_) => AddonKind::Mysql,
            AddonResource::Redis(_) => AddonKind::Redis,
            AddonResource::Elasticsearch(_) => AddonKind::Elasticsearch,
            AddonResource::DaemonSet(_) => AddonKind::DaemonSet,
        }
    }
}

/// 按服务组的 `USE_OPERATOR` 标签分派到具体 operator
#[derive(Debug)]
pub struct AddonManager {
    mysql: MysqlOperator,
    redis: RedisOperator,
    elasticsearch: ElasticsearchOperator,
    daemonset: DaemonSetOperator,
}

impl AddonManager {
    pub fn new(api: K8sApi, config: &AppConfig) -> Self {
        let addons = &config.addons;
        let placement = config.placement.clone();
        Self {
            mysql: MysqlOperator::new(api.clone(), addons, placement.clone()),
            redis: RedisOperator::new(api.clone(), addons, placement.clone()),
            elasticsearch: ElasticsearchOperator::new(api.clone(), addons, placement.clone()),
            daemonset: DaemonSetOperator::new(api, addons, placement),
        }
    }

    pub fn from_config(config: &AppConfig, http: Arc<dyn HttpClient>) -> Self {
        Self::new(K8sApi::new(http, config.addons.k8s_address.clone()), config)
    }

    pub fn with_passwords(mut self, passwords: PasswordGenerator) -> Self {
        self.mysql = self.mysql.with_passwords(passwords);
        self
    }

    pub fn mysql(&self) -> &MysqlOperator {
        &self.mysql
    }

    pub fn validate(&self, sg: &ServiceGroup) -> Result<AddonKind> {
        let kind = AddonKind::of(sg)?;
        match kind {
            AddonKind::Mysql => self.mysql.validate(sg)?,
            AddonKind::Redis => self.redis.validate(sg)?,
            AddonKind::Elasticsearch => self.elasticsearch.validate(sg)?,
            AddonKind::DaemonSet => self.daemonset.validate(sg)?,
        }
        Ok(kind)
    }

    pub fn convert(&self, sg: &ServiceGroup) -> Result<AddonResource> {
        Ok(match AddonKind::of(sg)? {
            AddonKind::Mysql => AddonResource::Mysql(self.mysql.convert(sg)?),
            AddonKind::Redis => AddonResource::Redis(self.redis.convert(sg)?),
            AddonKind::Elasticsearch => AddonResource::Elasticsearch(self.elasticsearch.convert(sg)?),
            AddonKind::DaemonSet => AddonResource::DaemonSet(self.daemonset.convert(sg)?),
        })
    }

    pub async fn create(&self, resource: &AddonResource) -> Result<()> {
        match resource {
            AddonResource::Mysql(r) => self.mysql.create(r).await,
            AddonResource::Redis(r) => self.redis.create(r).await,
            AddonResource::Elasticsearch(r) => self.elasticsearch.create(r).await,
            AddonResource::DaemonSet(r) => self.daemonset.create(r).await,
        }
    }

    /// validate → convert → create
    #[instrument(skip_all, fields(namespace = %sg.namespace()))]
    pub async fn deploy(&self, sg: &ServiceGroup) -> Result<AddonResource> {
        let kind = self.validate(sg)?;
        let resource = self.convert(sg)?;
        self.create(&resource).await?;
        info!(kind = %kind, "addon 已部署");
        Ok(resource)
    }

    pub async fn inspect(&self, sg: &ServiceGroup) -> Result<ServiceGroup> {
        match AddonKind::of(sg)? {
            AddonKind::Mysql => self.mysql.inspect(sg).await,
            AddonKind::Redis => self.redis.inspect(sg).await,
            AddonKind::Elasticsearch => self.elasticsearch.inspect(sg).await,
            AddonKind::DaemonSet => self.daemonset.inspect(sg).await,
        }
    }

    #[instrument(skip_all, fields(namespace = %sg.namespace()))]
    pub async fn remove(&self, sg: &ServiceGroup) -> Result<()> {
        match AddonKind::of(sg)? {
            AddonKind::Mysql => self.mysql.remove(sg).await,
            AddonKind::Redis => self.redis.remove(sg).await,
            AddonKind::Elasticsearch => self.elasticsearch.remove(sg).await,
            AddonKind::DaemonSet => self.daemonset.remove(sg).await,
        }
    }

    /// 按新的服务组描述重新转换并替换
    pub async fn update(&self, sg: &ServiceGroup) -> Result<()> {
        match self.convert(sg)? {
            AddonResource::Mysql(r) => self.mysql.update(&r).await,
            AddonResource::Redis(r) => self.redis.update(&r).await,
            AddonResource::Elasticsearch(r) => self.elasticsearch.update(&r).await,
            AddonResource::DaemonSet(r) => self.daemonset.update(&r).await,
        }
    }

    pub async fn probe(&self, kind: AddonKind) -> Capability {
        match kind {
            AddonKind::Mysql => self.mysql.is_supported().await,
            AddonKind::Redis => self.redis.is_supported().await,
            AddonKind::Elasticsearch => self.elasticsearch.is_supported().await,
            AddonKind::DaemonSet => self.daemonset.is_supported().await,
        }
    }
}

use std::collections::BTreeMap;

use workload_core::{Bind, Result, WorkloadError};

/// 渲染宿主机路径中的 `{{.KEY}}` 占位符
///
/// 值来自集群环境变量，缺失的键视为配置错误。
pub fn render_host_path(raw: &str, cluster_env: &BTreeMap<String, String>) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(WorkloadError::config_error("bind 宿主机路径为空"));
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            WorkloadError::config_error(format!("宿主机路径模板未闭合: {raw}"))
        })?;
        let key = after[..end].trim();
        let key = key.strip_prefix('.').ok_or_else(|| {
            WorkloadError::config_error(format!("宿主机路径模板格式错误: {raw}"))
        })?;
        let value = cluster_env.get(key).ok_or_else(|| {
            WorkloadError::config_error(format!("集群环境变量缺失: {key}, path={raw}"))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// 渲染所有 bind 的宿主机路径
pub fn plan_binds(binds: &[Bind], cluster_env: &BTreeMap<String, String>) -> Result<Vec<Bind>> {
    binds
        .iter()
        .map(|b| {
            Ok(Bind::new(
                render_host_path(&b.host_path, cluster_env)?,
                b.container_path.clone(),
                b.read_only,
            ))
        })
        .collect()
}

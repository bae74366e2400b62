use std::collections::BTreeMap;

use workload_core::TaskSpec;

/// 执行平台，决定资源环境变量的取值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Dcos,
    Kubernetes,
}

pub const ENV_CPU_ORIGIN: &str = "DICE_CPU_ORIGIN";
pub const ENV_MEM_ORIGIN: &str = "DICE_MEM_ORIGIN";
pub const ENV_CPU_REQUEST: &str = "DICE_CPU_REQUEST";
pub const ENV_MEM_REQUEST: &str = "DICE_MEM_REQUEST";
pub const ENV_CPU_LIMIT: &str = "DICE_CPU_LIMIT";
pub const ENV_MEM_LIMIT: &str = "DICE_MEM_LIMIT";
pub const ENV_IS_K8S: &str = "IS_K8S";

/// 容器内工具读取的 origin/request/limit 资源变量
///
/// Kubernetes 上 CPU 的 request/limit 至少为 1 核，origin 保留原始值。
pub fn resource_env(cpu: f64, memory: f64, platform: Platform) -> BTreeMap<String, String> {
    let (cpu_effective, is_k8s) = match platform {
        Platform::Dcos => (cpu, "false"),
        Platform::Kubernetes => (cpu.max(1.0), "true"),
    };
    let mut env = BTreeMap::new();
    env.insert(ENV_CPU_ORIGIN.to_string(), format_float(cpu));
    env.insert(ENV_MEM_ORIGIN.to_string(), format_float(memory));
    env.insert(ENV_CPU_REQUEST.to_string(), format_float(cpu_effective));
    env.insert(ENV_MEM_REQUEST.to_string(), format_float(memory));
    env.insert(ENV_CPU_LIMIT.to_string(), format_float(cpu_effective));
    env.insert(ENV_MEM_LIMIT.to_string(), format_float(memory));
    env.insert(ENV_IS_K8S.to_string(), is_k8s.to_string());
    env
}

/// 任务环境变量 < 资源变量 < 集群环境变量，后者覆盖前者
pub fn build_env(
    spec: &TaskSpec,
    cluster_env: &BTreeMap<String, String>,
    platform: Platform,
) -> BTreeMap<String, String> {
    let mut env = spec.env.clone();
    env.extend(resource_env(spec.cpu, spec.memory, platform));
    env.extend(cluster_env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// `%f` 风格，保留 6 位小数
pub fn format_float(value: f64) -> String {
    format!("{value:.6}")
}

/// Kubernetes 数量格式：CPU 用 millicores，内存用 Mi
pub fn k8s_cpu_quantity(cpu: f64) -> String {
    format!("{}m", (cpu * 1000.0).round() as u64)
}

pub fn k8s_memory_quantity(memory_mib: f64) -> String {
    format!("{}Mi", memory_mib.ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use workload_core::Kind;

    #[test]
    fn test_dcos_resource_env() {
        let env = resource_env(0.5, 256.0, Platform::Dcos);
        assert_eq!(env[ENV_CPU_ORIGIN], "0.500000");
        assert_eq!(env[ENV_CPU_LIMIT], "0.500000");
        assert_eq!(env[ENV_MEM_REQUEST], "256.000000");
        assert_eq!(env[ENV_IS_K8S], "false");
    }

    #[test]
    fn test_k8s_cpu_is_floored_at_one_core() {
        let env = resource_env(0.2, 512.0, Platform::Kubernetes);
        assert_eq!(env[ENV_CPU_ORIGIN], "0.200000");
        assert_eq!(env[ENV_CPU_REQUEST], "1.000000");
        assert_eq!(env[ENV_IS_K8S], "true");
    }

    #[test]
    fn test_cluster_env_wins() {
        let spec = TaskSpec::builder("1", Kind::new(Kind::METRONOME))
            .cluster("c")
            .env("FOO", "task")
            .env(ENV_IS_K8S, "task")
            .build()
            .unwrap();
        let mut cluster = BTreeMap::new();
        cluster.insert("FOO".to_string(), "cluster".to_string());
        let env = build_env(&spec, &cluster, Platform::Dcos);
        assert_eq!(env["FOO"], "cluster");
        assert_eq!(env[ENV_IS_K8S], "false");
    }

    #[test]
    fn test_quantities() {
        assert_eq!(k8s_cpu_quantity(0.5), "500m");
        assert_eq!(k8s_memory_quantity(255.5), "256Mi");
    }
}

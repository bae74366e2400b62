use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workload_core::{
    BackendHandle, BigdataConf, ClusterConfig, HttpClient, HttpConfig, Kind, Name, RetryConfig,
    StatusCode, TaskExecutor, TaskSpec,
};
use workload_infrastructure::ReqwestHttpClient;
use workload_worker::{K8sFlinkExecutor, K8sSparkExecutor};

const SPARK_APPS: &str = "/apis/sparkoperator.k8s.io/v1beta2/namespaces/pipeline/sparkapplications";
const FLINK_CLUSTERS: &str = "/apis/flinkoperator.k8s.io/v1beta1/namespaces/pipeline/flinkclusters";

fn http() -> Arc<dyn HttpClient> {
    Arc::new(
        ReqwestHttpClient::new(&HttpConfig {
            timeout_seconds: 5,
            retry: RetryConfig::disabled(),
        })
        .unwrap(),
    )
}

fn spark_task() -> TaskSpec {
    TaskSpec::builder("41", Kind::new(Kind::K8S_SPARK))
        .cluster("k8s-a")
        .image("registry/spark:2.4.0")
        .bigdata(BigdataConf::new("local:///opt/app.jar", "com.example.Main", vec![]))
        .build()
        .unwrap()
}

fn flink_task() -> TaskSpec {
    TaskSpec::builder("42", Kind::new(Kind::K8S_FLINK))
        .cluster("k8s-a")
        .image("registry/flink:1.17")
        .bigdata(BigdataConf::new("/opt/flink/usrlib/job.jar", "org.example.Stream", vec![]))
        .build()
        .unwrap()
}

async fn mount_created(server: &MockServer, url: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(url.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_k8s_spark_create_prepares_namespace_and_rbac() {
    let server = MockServer::start().await;
    mount_created(&server, "/api/v1/namespaces", 409).await;
    mount_created(&server, "/api/v1/namespaces/pipeline/serviceaccounts", 201).await;
    mount_created(&server, "/apis/rbac.authorization.k8s.io/v1/namespaces/pipeline/roles", 201).await;
    mount_created(&server, "/apis/rbac.authorization.k8s.io/v1/namespaces/pipeline/rolebindings", 409).await;
    Mock::given(method("POST"))
        .and(path(SPARK_APPS))
        .and(body_partial_json(json!({
            "kind": "SparkApplication",
            "metadata": { "name": "pipeline-task-41", "namespace": "pipeline" },
            "spec": { "driver": { "serviceAccount": "spark" } }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    let handle = exec.create(&spark_task()).await.unwrap();
    assert_eq!(
        handle,
        BackendHandle::CustomResource {
            namespace: "pipeline".to_string(),
            name: "pipeline-task-41".to_string()
        }
    );
}

#[tokio::test]
async fn test_k8s_spark_status_carries_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{SPARK_APPS}/pipeline-task-41")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "applicationState": {
                    "state": "SUBMISSION_FAILED",
                    "errorMessage": "driver pod failed to start"
                }
            }
        })))
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    let desc = exec.status(&spark_task()).await.unwrap();
    assert_eq!(desc.status, StatusCode::StoppedOnFailed);
    assert_eq!(desc.last_message, "driver pod failed to start");
}

#[tokio::test]
async fn test_k8s_spark_unmapped_state_keeps_native_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{SPARK_APPS}/pipeline-task-41")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "applicationState": {
                    "state": "SUSPENDING",
                    "errorMessage": "quota exceeded"
                }
            }
        })))
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    let desc = exec.status(&spark_task()).await.unwrap();
    assert_eq!(desc.status, StatusCode::Unknown);
    assert!(desc.last_message.contains("SUSPENDING"), "{}", desc.last_message);
    assert!(desc.last_message.ends_with("quota exceeded"), "{}", desc.last_message);
}

#[tokio::test]
async fn test_k8s_spark_remove_without_app_name_reclaims_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/pipeline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SPARK_APPS}/pipeline-task-41")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    let mut task = spark_task();
    task.name = String::new();
    exec.remove(&task).await.unwrap();
}

#[tokio::test]
async fn test_k8s_spark_clean_up_of_missing_namespace_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/pipeline"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    exec.clean_up("pipeline").await.unwrap();
    assert!(exec.clean_up(" ").await.is_err());
}

#[tokio::test]
async fn test_k8s_spark_remove_missing_application_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SPARK_APPS}/pipeline-task-41")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    exec.remove(&spark_task()).await.unwrap();
}

#[tokio::test]
async fn test_k8s_spark_capability_uses_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/sparkoperator.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "APIResourceList",
            "resources": [{ "name": "sparkapplications" }, { "name": "scheduledsparkapplications" }]
        })))
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SSPARK", server.uri());
    let exec = K8sSparkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    assert!(exec.probe().await.supported);
}

#[tokio::test]
async fn test_k8s_flink_lifecycle() {
    let server = MockServer::start().await;
    mount_created(&server, "/api/v1/namespaces", 201).await;
    Mock::given(method("POST"))
        .and(path(FLINK_CLUSTERS))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"reason": "AlreadyExists"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{FLINK_CLUSTERS}/pipeline-task-42")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "components": { "jobManagerDeployment": { "state": "Ready" } } }
        })))
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SFLINK", server.uri());
    let exec = K8sFlinkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    let handle = exec.create(&flink_task()).await.unwrap();
    let task = flink_task().with_handle(handle);
    assert_eq!(exec.status(&task).await.unwrap().status, StatusCode::Unschedulable);
}

#[tokio::test]
async fn test_k8s_flink_absent_cluster_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{FLINK_CLUSTERS}/pipeline-task-42")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cluster = ClusterConfig::new("k8s-a", "K8SFLINK", server.uri());
    let exec = K8sFlinkExecutor::new(Name::new("k8s-a"), &cluster, http()).unwrap();
    assert_eq!(
        exec.status(&flink_task()).await.unwrap().status,
        StatusCode::NotFoundInCluster
    );
}

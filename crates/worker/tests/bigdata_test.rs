use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workload_core::{
    BackendHandle, BigdataConf, ClusterConfig, HttpClient, HttpConfig, Kind, Name, RetryConfig,
    StatusCode, TaskExecutor, TaskSpec,
};
use workload_infrastructure::ReqwestHttpClient;
use workload_worker::{FlinkExecutor, SparkExecutor};

fn http() -> Arc<dyn HttpClient> {
    Arc::new(
        ReqwestHttpClient::new(&HttpConfig {
            timeout_seconds: 5,
            retry: RetryConfig::disabled(),
        })
        .unwrap(),
    )
}

fn spark(server: &MockServer) -> SparkExecutor {
    let cluster = ClusterConfig::new("spark-a", "SPARK", server.uri());
    SparkExecutor::new(Name::new("spark-a"), &cluster, http()).unwrap()
}

fn flink(server: &MockServer) -> FlinkExecutor {
    let cluster = ClusterConfig::new("flink-a", "FLINK", server.uri());
    FlinkExecutor::new(Name::new("flink-a"), &cluster, http()).unwrap()
}

fn spark_task() -> TaskSpec {
    TaskSpec::builder("31", Kind::new(Kind::SPARK))
        .cluster("spark-a")
        .bigdata(BigdataConf::new(
            "hdfs:///jobs/wc.jar",
            "com.example.WordCount",
            vec!["in".into()],
        ))
        .build()
        .unwrap()
}

fn flink_task() -> TaskSpec {
    TaskSpec::builder("32", Kind::new(Kind::FLINK))
        .cluster("flink-a")
        .bigdata(BigdataConf::new(
            "/jars/abc_stream.jar",
            "org.example.Stream",
            vec!["--topic".into(), "t".into()],
        ))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_spark_submit_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/create"))
        .and(body_partial_json(json!({
            "action": "CreateSubmissionRequest",
            "mainClass": "com.example.WordCount",
            "sparkProperties": { "spark.submit.deployMode": "cluster" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": "CreateSubmissionResponse",
            "success": true,
            "submissionId": "driver-20240101-0001",
            "serverSparkVersion": "2.4.0"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/submissions/status/driver-20240101-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "driverState": "RUNNING",
            "serverSparkVersion": "2.4.0"
        })))
        .mount(&server)
        .await;

    let exec = spark(&server);
    let handle = exec.create(&spark_task()).await.unwrap();
    assert_eq!(
        handle,
        BackendHandle::Submission {
            id: "driver-20240101-0001".to_string()
        }
    );
    let desc = exec.status(&spark_task().with_handle(handle)).await.unwrap();
    assert_eq!(desc.status, StatusCode::Running);
}

#[tokio::test]
async fn test_spark_unknown_submission_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/submissions/status/driver-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Driver driver-x not found",
            "serverSparkVersion": "2.4.0"
        })))
        .mount(&server)
        .await;

    let task = spark_task().with_handle(BackendHandle::Submission {
        id: "driver-x".to_string(),
    });
    let desc = spark(&server).status(&task).await.unwrap();
    assert_eq!(desc.status, StatusCode::NotFoundInCluster);
}

#[tokio::test]
async fn test_spark_resubmit_reuses_live_submission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/submissions/status/driver-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "driverState": "SUBMITTED"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/create"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let task = spark_task().with_handle(BackendHandle::Submission {
        id: "driver-1".to_string(),
    });
    let handle = spark(&server).create(&task).await.unwrap();
    assert_eq!(handle, BackendHandle::Submission { id: "driver-1".to_string() });
}

#[tokio::test]
async fn test_spark_duplicate_submit_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": "CreateSubmissionResponse",
            "success": false,
            "message": "Driver driver-20240101-0009 already exists",
            "serverSparkVersion": "2.4.0"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = spark(&server).create(&spark_task()).await.unwrap();
    assert_eq!(
        handle,
        BackendHandle::Submission { id: "driver-20240101-0009".to_string() }
    );
}

#[tokio::test]
async fn test_spark_duplicate_submit_falls_back_to_stored_handle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/submissions/status/driver-7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "application already submitted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = spark_task().with_handle(BackendHandle::Submission {
        id: "driver-7".to_string(),
    });
    let handle = spark(&server).create(&task).await.unwrap();
    assert_eq!(handle, BackendHandle::Submission { id: "driver-7".to_string() });
}

#[tokio::test]
async fn test_spark_duplicate_without_any_id_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "application already submitted"
        })))
        .mount(&server)
        .await;

    let err = spark(&server).create(&spark_task()).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
}

#[tokio::test]
async fn test_spark_kill_of_finished_driver_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/submissions/kill/driver-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Driver driver-1 has already finished"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let task = spark_task().with_handle(BackendHandle::Submission {
        id: "driver-1".to_string(),
    });
    spark(&server).remove(&task).await.unwrap();
}

#[tokio::test]
async fn test_spark_capability_checks_server_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/submissions/status/capability-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "serverSparkVersion": "2.4.0"
        })))
        .mount(&server)
        .await;

    assert!(spark(&server).probe().await.supported);
}

#[tokio::test]
async fn test_flink_run_status_and_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jars/abc_stream.jar/run"))
        .and(body_partial_json(json!({
            "entryClass": "org.example.Stream",
            "programArgsList": ["--topic", "t"],
            "parallelism": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobid": "f00d"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/f00d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jid": "f00d", "state": "FAILING"})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/jobs/f00d"))
        .and(query_param("mode", "cancel"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let exec = flink(&server);
    let handle = exec.create(&flink_task()).await.unwrap();
    assert_eq!(
        handle,
        BackendHandle::FlinkJob {
            jar_id: "abc_stream.jar".to_string(),
            job_id: "f00d".to_string()
        }
    );
    let task = flink_task().with_handle(handle);
    assert_eq!(exec.status(&task).await.unwrap().status, StatusCode::StoppedOnFailed);
    exec.remove(&task).await.unwrap();
}

#[tokio::test]
async fn test_flink_cancel_of_missing_job_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/jobs/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let task = flink_task().with_handle(BackendHandle::FlinkJob {
        jar_id: "abc_stream.jar".to_string(),
        job_id: "gone".to_string(),
    });
    let exec = flink(&server);
    exec.remove(&task).await.unwrap();
    assert_eq!(exec.status(&task).await.unwrap().status, StatusCode::NotFoundInCluster);
}

#[tokio::test]
async fn test_flink_capability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "taskmanagers": 1,
            "flink-version": "1.17.1"
        })))
        .mount(&server)
        .await;

    assert!(flink(&server).probe().await.supported);
}

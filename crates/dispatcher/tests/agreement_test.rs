use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use workload_core::PlacementConfig;
use workload_dispatcher::policy::*;
use workload_dispatcher::{compile_dcos, compile_k8s, dcos, NodeProfile, Operator};

const TAG_POOL: &[&str] = &[
    "any",
    "bigdata",
    "pack",
    "gpu",
    "alpha",
    "beta",
    "platform",
    "locked",
    "project-1",
    "project-2",
    "workspace-prod",
    "workspace-test",
    "any-gpu",
    "many",
    "bigdata-old",
    "my-project-1",
    "platform-ops",
];
const HOST_POOL: &[&str] = &["node-1", "node-2", "node-3"];
const PLAIN_TAGS: &[&str] = &["bigdata", "pack", "gpu", "alpha", "beta"];

fn pick_list(rng: &mut StdRng, pool: &[&str]) -> String {
    pool.iter()
        .filter(|_| rng.random_bool(0.3))
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

fn random_labels(rng: &mut StdRng) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        if !value.is_empty() {
            labels.insert(key.to_string(), value);
        }
    };
    put(LABEL_MATCH_TAGS, pick_list(rng, PLAIN_TAGS));
    put(LABEL_EXCLUDE_TAGS, pick_list(rng, PLAIN_TAGS));
    put(LABEL_EXCLUSIVE_TAGS, pick_list(rng, PLAIN_TAGS));
    put(LABEL_INCLUSIVE_TAGS, pick_list(rng, PLAIN_TAGS));
    if rng.random_bool(0.2) {
        put(LABEL_SPECIFIC_HOSTS, pick_list(rng, HOST_POOL));
    }
    if rng.random_bool(0.5) {
        put(LABEL_PROJECT, ["1", "2"][rng.random_range(0..2)].to_string());
    }
    if rng.random_bool(0.5) {
        put(LABEL_WORKSPACE, ["prod", "test"][rng.random_range(0..2)].to_string());
    }
    if rng.random_bool(0.2) {
        put(LABEL_ANY_ENABLED, "false".to_string());
    }
    if rng.random_bool(0.2) {
        put(LABEL_PLATFORM, "true".to_string());
    }
    if rng.random_bool(0.2) {
        put(LABEL_UNLOCKED, "true".to_string());
    }
    labels
}

fn random_node(rng: &mut StdRng) -> NodeProfile {
    let host = HOST_POOL[rng.random_range(0..HOST_POOL.len())];
    let tags: Vec<&str> = TAG_POOL
        .iter()
        .filter(|_| rng.random_bool(0.4))
        .copied()
        .collect();
    NodeProfile::new(host, tags)
}

#[test]
fn test_dcos_and_k8s_agree_on_every_node() {
    let mut rng = StdRng::seed_from_u64(20240521);
    let placements = [
        PlacementConfig::default(),
        PlacementConfig {
            unlimited_projects: vec!["1".to_string()],
            unlimited_workspaces: vec!["prod".to_string()],
        },
    ];

    for round in 0..300 {
        let labels = random_labels(&mut rng);
        let placement = &placements[round % placements.len()];
        let constraints = compile_dcos(&labels, placement);
        let affinity = compile_k8s(&labels, placement);

        for _ in 0..20 {
            let node = random_node(&mut rng);
            assert_eq!(
                dcos::accepts(&constraints, &node),
                affinity.accepts(&node),
                "labels={labels:?} node={node:?} constraints={constraints:?}"
            );
        }
    }
}

#[test]
fn test_no_tags_and_no_opt_out_is_exactly_one_like_any() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let mut labels = BTreeMap::new();
        if rng.random_bool(0.5) {
            labels.insert(LABEL_PROJECT.to_string(), rng.random_range(0..100).to_string());
        }
        if rng.random_bool(0.5) {
            labels.insert(LABEL_WORKSPACE.to_string(), "staging".to_string());
        }
        let constraints = compile_dcos(&labels, &PlacementConfig::default());
        let likes: Vec<_> = constraints
            .iter()
            .filter(|c| c.operator == Operator::Like)
            .collect();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].value, "(?:.*,)?any(?:,.*)?");
        assert!(constraints
            .iter()
            .filter(|c| c.operator == Operator::Unlike)
            .all(|c| c.value == "(?:.*,)?platform(?:,.*)?"));
    }
}

#[test]
fn test_bigdata_is_never_combined_with_any() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..100 {
        let mut labels = random_labels(&mut rng);
        let tags = labels.get(LABEL_MATCH_TAGS).cloned().unwrap_or_default();
        labels.insert(LABEL_MATCH_TAGS.to_string(), format!("{tags},bigdata"));

        let constraints = compile_dcos(&labels, &PlacementConfig::default());
        assert!(constraints
            .iter()
            .any(|c| c.operator == Operator::Like && c.value == "(?:.*,)?bigdata(?:,.*)?"));
        for constraint in constraints {
            assert!(
                !(constraint.value.contains(")?bigdata(") && constraint.value.contains(")?any(")),
                "{constraint}"
            );
        }
    }
}

#[test]
fn test_look_alike_tags_do_not_satisfy_whole_tags() {
    let labels = BTreeMap::new();
    let placement = PlacementConfig::default();
    let constraints = compile_dcos(&labels, &placement);
    let affinity = compile_k8s(&labels, &placement);
    for tags in [vec!["any-gpu"], vec!["many"], vec!["any-gpu", "platform-ops"]] {
        let node = NodeProfile::new("node-1", tags);
        assert!(!dcos::accepts(&constraints, &node), "{node:?}");
        assert!(!affinity.accepts(&node), "{node:?}");
    }
    let node = NodeProfile::new("node-1", ["any", "platform-ops"]);
    assert!(dcos::accepts(&constraints, &node));
    assert!(affinity.accepts(&node));
    let node = NodeProfile::new("node-1", ["any", "platform"]);
    assert!(!dcos::accepts(&constraints, &node));
    assert!(!affinity.accepts(&node));
}

#[test]
fn test_compilation_is_byte_identical() {
    let mut rng = StdRng::seed_from_u64(3);
    let placement = PlacementConfig {
        unlimited_projects: vec!["2".to_string()],
        ..Default::default()
    };
    for _ in 0..50 {
        let labels = random_labels(&mut rng);
        let first = serde_json::to_string(&compile_dcos(&labels, &placement)).unwrap();
        let second = serde_json::to_string(&compile_dcos(&labels, &placement)).unwrap();
        assert_eq!(first, second);
        let first = serde_json::to_string(&compile_k8s(&labels, &placement)).unwrap();
        let second = serde_json::to_string(&compile_k8s(&labels, &placement)).unwrap();
        assert_eq!(first, second);
    }
}

//! Load balancing and circuit breaking across crate boundaries.

use super::helpers::{GatewayContext, echo_client};
use rstest::rstest;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use toolgate::{
    connection_pool::domain::ExecutionOptions,
    load_balancer::{
        domain::{BalancingStrategy, ToolInstance},
        services::LoadBalancer,
    },
    resilience::{
        adapters::HttpInstanceExecutor,
        domain::{CircuitBreakerConfig, CircuitBreakerError, CircuitState},
        services::{BalancedExecutor, CircuitBreaker},
    },
    transport::adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn round_robin(ids: &[&str]) -> LoadBalancer {
    let balancer = LoadBalancer::new(BalancingStrategy::RoundRobin);
    for id in ids {
        balancer
            .add_instance(ToolInstance::new(*id, format!("http://{id}.invalid/mcp")))
            .expect("instance added");
    }
    balancer
}

#[rstest]
#[case::two_instances(2, 7, 3, 4)]
#[case::three_instances(3, 10, 3, 4)]
#[case::exact_multiple(4, 12, 3, 3)]
fn round_robin_spreads_calls_evenly(
    #[case] instances: usize,
    #[case] calls: usize,
    #[case] floor: usize,
    #[case] ceiling: usize,
) {
    let ids: Vec<String> = (0..instances).map(|index| format!("replica-{index}")).collect();
    let names: Vec<&str> = ids.iter().map(String::as_str).collect();
    let balancer = round_robin(&names);

    let picks: Vec<String> = (0..calls)
        .map(|_| {
            balancer
                .get_next_instance()
                .expect("selection")
                .expect("healthy instance")
                .instance_id()
                .to_owned()
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for pick in &picks {
        *counts.entry(pick.as_str()).or_default() += 1;
    }
    assert_eq!(counts.len(), instances);
    assert!(counts.values().all(|count| (floor..=ceiling).contains(count)));
    assert!(picks.windows(2).all(|pair| pair.first() != pair.get(1)));
}

#[rstest]
fn unhealthy_instance_is_skipped() {
    let balancer = round_robin(&["a", "b"]);
    assert!(balancer.set_health("a", false).expect("health updated"));

    let picks: Vec<String> = (0..5)
        .map(|_| {
            balancer
                .get_next_instance()
                .expect("selection")
                .expect("healthy instance")
                .instance_id()
                .to_owned()
        })
        .collect();

    assert_eq!(picks, vec!["b"; 5]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn breaker_opens_then_admits_a_single_probe() {
    let breaker = CircuitBreaker::new(
        "flaky",
        CircuitBreakerConfig::new(3, Duration::from_secs(30)),
    );
    let invocations = AtomicUsize::new(0);
    let counter = &invocations;
    let failing = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>("boom")
    };

    for _ in 0..3 {
        let result = breaker.call(failing).await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner("boom"))));
    }
    let rejected = breaker.call(failing).await;

    assert!(rejected.as_ref().is_err_and(CircuitBreakerError::is_open));
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(31)).await;
    let shared = &breaker;
    let probe = shared
        .call(move || async move {
            let concurrent = shared.call(|| async { Ok::<_, &str>(()) }).await;
            assert!(concurrent.as_ref().is_err_and(CircuitBreakerError::is_open));
            Ok::<_, &str>(())
        })
        .await;

    assert!(probe.is_ok());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn balanced_tool_only_reaches_healthy_replicas(echo_client: Arc<InMemoryTransportClient>) {
    let replica_a = MockServer::start().await;
    let replica_b = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&replica_a)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "tools/call" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "content": [{ "type": "text", "text": "from b" }] }
        })))
        .expect(4)
        .mount(&replica_b)
        .await;

    let context =
        GatewayContext::new(InMemoryTransportConnector::new().with_client("echo", echo_client));
    let server_id = context.running_server("echo").await;
    let balancer = Arc::new(LoadBalancer::new(BalancingStrategy::RoundRobin));
    balancer
        .add_instance(ToolInstance::new("a", replica_a.uri()).with_health(false))
        .expect("instance added");
    balancer
        .add_instance(ToolInstance::new("b", replica_b.uri()))
        .expect("instance added");
    let executor = BalancedExecutor::new(
        Arc::clone(&balancer),
        Arc::new(HttpInstanceExecutor::new()),
        CircuitBreakerConfig::default(),
    );
    context
        .gateway
        .register_balanced_tool(server_id, "echo_tool", Arc::new(executor), None)
        .await
        .expect("route registered");

    for _ in 0..4 {
        let result = context
            .gateway
            .execute_tool(
                server_id,
                "echo_tool",
                json!({ "text": "hi" }),
                None,
                ExecutionOptions::default(),
            )
            .await
            .expect("execution accepted");
        assert!(result.success, "unexpected failure: {:?}", result.error);
    }

    let instances = balancer.instances().expect("instances");
    let served: Vec<(String, u64)> = instances
        .iter()
        .map(|instance| (instance.instance_id().to_owned(), instance.success_count()))
        .collect();
    assert_eq!(served, vec![("a".to_owned(), 0), ("b".to_owned(), 4)]);
}

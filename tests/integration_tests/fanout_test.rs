//! Fan-out and failover property tests
//!
//! Drives the failover chain and the fan-in aggregator through a scripted
//! dispatcher, so dispatch counts and ordering can be checked exactly.

use fanrelay::aggregate::{join_all, PendingResult};
use fanrelay::client::{run_chain, FailoverClient, RequestTemplate};
use fanrelay::config::HandlerConfig;
use fanrelay::error::Error;
use fanrelay::handler::Orchestrator;
use fanrelay::resolver::{LocationList, StaticResolver};
use fanrelay::scheduler::ContextScheduler;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{locations, ScriptedDispatcher};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn template() -> RequestTemplate {
    RequestTemplate::for_service("brave", "/echo/p").unwrap()
}

// ============================================================================
// Failover Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// First success at candidate k means exactly k + 1 dispatches
    #[test]
    fn prop_first_success_stops_chain(n in 1usize..8, k in 0usize..8) {
        let k = k % n;
        let ports: Vec<u16> = (1..=n as u16).map(|p| 7000 + p).collect();
        let dispatcher = ScriptedDispatcher::healthy(&ports[k..=k]);

        let outcome = paused_runtime().block_on(run_chain(
            dispatcher.as_ref(),
            &template(),
            &locations(&ports),
        ));

        prop_assert_eq!(outcome.unwrap(), "/brave/echo/p");
        prop_assert_eq!(dispatcher.ports(), ports[..=k].to_vec());
    }

    /// With every candidate down, each is tried exactly once, in order
    #[test]
    fn prop_all_failed_dispatches_each_once(n in 1usize..8) {
        let ports: Vec<u16> = (1..=n as u16).map(|p| 7100 + p).collect();
        let dispatcher = ScriptedDispatcher::healthy(&[]);

        let outcome = paused_runtime().block_on(run_chain(
            dispatcher.as_ref(),
            &template(),
            &locations(&ports),
        ));

        prop_assert!(outcome.is_err());
        prop_assert_eq!(dispatcher.ports(), ports);
    }

    /// Joined values follow submission order whatever the completion order
    #[test]
    fn prop_join_order_is_submission_order(delays in prop::collection::vec(0u64..500, 0..12)) {
        let values = paused_runtime().block_on(async {
            let members: Vec<PendingResult<usize>> = delays
                .iter()
                .enumerate()
                .map(|(i, millis)| {
                    let millis = *millis;
                    PendingResult::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(millis)).await;
                        Ok(i)
                    })
                })
                .collect();
            join_all(members).await
        });

        prop_assert_eq!(values.unwrap(), (0..delays.len()).collect::<Vec<_>>());
    }
}

// ============================================================================
// Orchestrator Scenarios
// ============================================================================

fn orchestrator(dispatcher: Arc<ScriptedDispatcher>, ports: &[u16]) -> Orchestrator {
    let resolver = StaticResolver::new()
        .with_service("brave", LocationList::new(locations(ports)).unwrap());
    Orchestrator::new(
        FailoverClient::new(dispatcher, Arc::new(resolver)),
        Arc::new(ContextScheduler::new().unwrap()),
        HandlerConfig::default(),
    )
}

#[tokio::test]
async fn test_fanout_falls_back_per_member() {
    let dispatcher = ScriptedDispatcher::healthy(&[8080]);
    let body = orchestrator(dispatcher.clone(), &[6666, 8080])
        .fanout(2)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, "/brave/echo/0\n/brave/echo/1\n/brave/delay/1");

    // every member tried the dead primary first
    let ports = dispatcher.ports();
    assert_eq!(ports.len(), 6);
    assert_eq!(ports.iter().filter(|p| **p == 6666).count(), 3);
}

#[tokio::test]
async fn test_failed_member_does_not_stop_others() {
    let dispatcher = ScriptedDispatcher::healthy(&[]);
    let err = orchestrator(dispatcher.clone(), &[6666])
        .fanout(3)
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AggregateMemberFailed { index: 0, total: 4, .. }));

    // the other members were issued before the join looked at any outcome
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut paths = dispatcher.paths();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            "/brave/delay/1",
            "/brave/echo/0",
            "/brave/echo/1",
            "/brave/echo/2",
        ]
    );
}

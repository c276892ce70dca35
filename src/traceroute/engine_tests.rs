//! Tests for the route tracer against a simulated network

use super::*;
use crate::packet::PING_IDENTIFIER;
use crate::ping::{EchoProber, PingConfig};
use crate::stats::Statistics;
use crate::transport::simulated::{time_exceeded_bytes, SimHop, SimulatedNetwork};
use std::sync::Arc;
use std::time::Duration;

fn router(addr: &str, delay_ms: u64) -> SimHop {
    SimHop::Router {
        addr: addr.parse().unwrap(),
        delay: Duration::from_millis(delay_ms),
    }
}

fn tracer(max_hops: u8) -> RouteTracer {
    RouteTracer::new(
        TracerouteConfig::builder()
            .max_hops(max_hops)
            .hop_timeout(Duration::from_millis(100))
            .build()
            .unwrap(),
    )
}

fn responded(addr: &str, rtt_ms: u64) -> HopRecord {
    HopRecord::Responded {
        addr: addr.parse().unwrap(),
        rtt: Duration::from_millis(rtt_ms),
    }
}

#[tokio::test(start_paused = true)]
async fn test_routers_then_target() {
    let target: IpAddr = "203.0.113.9".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![
            router("10.0.0.1", 1),
            router("10.0.1.1", 4),
            router("172.16.0.1", 9),
        ])
        .target_delay(Some(Duration::from_millis(15)))
        .shared();
    let transport = network.attach();

    let trace = tracer(30).run_with_transport(&transport, target).await;

    assert_eq!(
        trace.hops,
        vec![
            responded("10.0.0.1", 1),
            responded("10.0.1.1", 4),
            responded("172.16.0.1", 9),
            responded("203.0.113.9", 15),
        ]
    );
    assert!(trace.destination_reached);
    assert!(trace.check().is_ok());

    // One probe per hop, hop limit and sequence both counting up from 1.
    let sent = transport.sent_requests();
    assert_eq!(sent.len(), 4);
    for (index, (hop_limit, request)) in sent.iter().enumerate() {
        assert_eq!(usize::from(*hop_limit), index + 1);
        assert_eq!(usize::from(request.sequence), index + 1);
        assert_eq!(request.identifier, TRACE_IDENTIFIER);
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_middle_hop() {
    let target: IpAddr = "203.0.113.3".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 2), SimHop::Silent])
        .target_delay(Some(Duration::from_millis(7)))
        .shared();

    let trace = tracer(3)
        .run_with_transport(&network.attach(), target)
        .await;

    assert_eq!(
        trace.hops,
        vec![
            responded("10.0.0.1", 2),
            HopRecord::Unresolved,
            responded("203.0.113.3", 7),
        ]
    );
    assert!(trace.check().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_target_exhausts_hops() {
    let target: IpAddr = "2001:db8::dead".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("2001:db8::1", 3)])
        .target_delay(None)
        .shared();

    let started = Instant::now();
    let trace = tracer(5)
        .run_with_transport(&network.attach(), target)
        .await;

    assert_eq!(trace.hop_count(), 5);
    assert_eq!(trace.hops[0], responded("2001:db8::1", 3));
    assert!(trace.hops[1..]
        .iter()
        .all(|hop| *hop == HopRecord::Unresolved));
    assert!(!trace.destination_reached);
    assert!(matches!(
        trace.check(),
        Err(ProbeError::RouteNotFound { max_hops: 5, .. })
    ));
    // Four silent hops, each waiting out its own deadline.
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_late_time_exceeded_from_earlier_hop_is_skipped() {
    let target: IpAddr = "203.0.113.4".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 150), router("10.0.1.1", 80)])
        .target_delay(None)
        .shared();

    let trace = tracer(3)
        .run_with_transport(&network.attach(), target)
        .await;

    // Hop 1 times out at 100ms. Its answer lands 50ms into hop 2 but quotes
    // sequence 1, so hop 2 keeps waiting for its own router at 80ms.
    assert_eq!(
        trace.hops,
        vec![
            HopRecord::Unresolved,
            responded("10.0.1.1", 80),
            HopRecord::Unresolved,
        ]
    );
    assert!(!trace.destination_reached);
}

#[tokio::test(start_paused = true)]
async fn test_time_exceeded_without_quoted_echo_is_accepted() {
    let target: IpAddr = "203.0.113.6".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![SimHop::Silent])
        .target_delay(Some(Duration::from_millis(9)))
        .shared();
    let transport = network.attach();

    // A router that quotes only the original IPv4 header.
    let mut truncated = time_exceeded_bytes(IpFamily::V4, target, TRACE_IDENTIFIER, 1);
    truncated.truncate(8 + 20);
    network.inject(
        Duration::from_millis(4),
        "10.0.0.1".parse().unwrap(),
        truncated,
    );

    let trace = tracer(5).run_with_transport(&transport, target).await;

    assert_eq!(
        trace.hops,
        vec![responded("10.0.0.1", 4), responded("203.0.113.6", 9)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_foreign_time_exceeded_is_skipped() {
    let target: IpAddr = "203.0.113.5".parse().unwrap();
    let other: IpAddr = "198.51.100.77".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 20)])
        .target_delay(Some(Duration::from_millis(5)))
        .shared();
    let transport = network.attach();

    // Someone else's probe expiring, and a ping probe to our target expiring.
    network.inject(
        Duration::from_millis(2),
        "10.9.9.9".parse().unwrap(),
        time_exceeded_bytes(IpFamily::V4, other, TRACE_IDENTIFIER, 1),
    );
    network.inject(
        Duration::from_millis(3),
        "10.9.9.8".parse().unwrap(),
        time_exceeded_bytes(IpFamily::V4, target, PING_IDENTIFIER, 1),
    );

    let trace = tracer(30).run_with_transport(&transport, target).await;

    assert_eq!(
        trace.hops,
        vec![responded("10.0.0.1", 20), responded("203.0.113.5", 5)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_records_unresolved() {
    let target: IpAddr = "203.0.113.6".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 1)])
        .fail_send(TRACE_IDENTIFIER, 1)
        .target_delay(Some(Duration::from_millis(2)))
        .shared();

    let trace = tracer(30)
        .run_with_transport(&network.attach(), target)
        .await;

    assert_eq!(
        trace.hops,
        vec![HopRecord::Unresolved, responded("203.0.113.6", 2)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_garbage_reply_ends_hop() {
    let target: IpAddr = "203.0.113.8".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 30)])
        .target_delay(Some(Duration::from_millis(2)))
        .shared();
    let transport = network.attach();
    network.inject(Duration::from_millis(1), "10.0.0.1".parse().unwrap(), vec![11]);

    let trace = tracer(30).run_with_transport(&transport, target).await;

    assert_eq!(trace.hops[0], HopRecord::Unresolved);
    assert_eq!(trace.hops.last().unwrap().addr(), Some(target));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ping_and_trace_stay_separate() {
    let target: IpAddr = "203.0.113.10".parse().unwrap();
    let network = SimulatedNetwork::new(target)
        .path(vec![router("10.0.0.1", 3), router("10.0.0.2", 6)])
        .ping_delays(vec![Some(Duration::from_millis(8)); 4])
        .target_delay(Some(Duration::from_millis(8)))
        .shared();
    let ping_transport = Arc::new(network.attach());
    let trace_transport = network.attach();

    let prober = EchoProber::new(PingConfig::builder().count(4).build().unwrap());
    let route_tracer = tracer(30);
    let (stats, trace) = tokio::join!(
        prober.run_with_transport(ping_transport, target),
        route_tracer.run_with_transport(&trace_transport, target),
    );

    assert_ne!(stats, Statistics::ALL_LOST);
    assert!(stats.loss.abs() < 1e-9);
    assert!((stats.min - 8.0).abs() < 1e-6);
    assert!((stats.max - 8.0).abs() < 1e-6);
    assert_eq!(
        trace.hops,
        vec![
            responded("10.0.0.1", 3),
            responded("10.0.0.2", 6),
            responded("203.0.113.10", 8),
        ]
    );
}

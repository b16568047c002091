//! End-to-end tests for a node reporting over loopback UDP.
//!
//! These run the real [`HostLink`] and [`UdpTransport`] against a socket
//! bound on 127.0.0.1, with mock sensors supplying fixed values.

use std::time::Duration;

use ecomind_core::mock::{MockLight, MockTempHumidity};
use ecomind_core::{
    ConnectPolicy, ConnectivityManager, ConnectivityState, Credentials, EventDispatcher, HostLink,
    LuxPolicy, Node, NodeEvent, Reporter, SchedulerOptions, Sensors, TempHumidity, UdpTransport,
    WireRecord,
};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const INTERVAL: Duration = Duration::from_millis(200);

async fn listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn node(port: u16, light: MockLight, events: EventDispatcher) -> Node<HostLink, UdpTransport> {
    let sensors = Sensors::init(
        Box::new(MockTempHumidity::new(TempHumidity::new(23.456, 51.209))),
        Box::new(light),
    );
    let connectivity = ConnectivityManager::new(
        HostLink::new("127.0.0.1", port),
        Credentials::new("EcoMind", "secret"),
        ConnectPolicy::new(3, Duration::from_millis(10)),
    )
    .with_events(events.clone());
    let reporter = Reporter::new(
        "rak_nodo_01",
        LuxPolicy::Sentinel,
        UdpTransport::new("127.0.0.1", port),
    )
    .with_events(events);
    Node::new(
        connectivity,
        sensors,
        reporter,
        SchedulerOptions::new(INTERVAL).poll_interval(Duration::from_millis(10)),
    )
}

async fn recv_record(socket: &UdpSocket) -> WireRecord {
    let mut buf = [0u8; 1024];
    let (n, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no datagram within 2s")
        .unwrap();
    WireRecord::from_bytes(&buf[..n]).unwrap()
}

#[tokio::test]
async fn test_node_reports_over_udp() {
    let (socket, port) = listener().await;
    let events = EventDispatcher::new(32);
    let mut rx = events.subscribe();
    let mut node = node(port, MockLight::new(312.5), events);

    let _ = timeout(Duration::from_millis(700), node.run()).await;

    assert_eq!(node.connectivity(), ConnectivityState::Connected);
    assert!(node.reports() >= 2, "expected at least 2 reports, got {}", node.reports());

    for _ in 0..node.reports() {
        let record = recv_record(&socket).await;
        assert_eq!(record.t, 23.45);
        assert_eq!(record.h, 51.2);
        assert_eq!(record.l, 312.5);
        assert_eq!(record.device_id, "rak_nodo_01");
    }

    assert!(matches!(rx.recv().await.unwrap(), NodeEvent::Connected { .. }));
    assert!(matches!(rx.recv().await.unwrap(), NodeEvent::ReportSent { .. }));
}

#[tokio::test]
async fn test_missing_light_sensor_reports_sentinel() {
    let (socket, port) = listener().await;
    let light = MockLight::new(312.5);
    light.set_fail_init(true);
    let mut node = node(port, light.clone(), EventDispatcher::default());

    let _ = timeout(INTERVAL * 2, node.run()).await;
    assert!(node.reports() >= 1);

    let record = recv_record(&socket).await;
    assert!(record.is_lux_sentinel());
    assert_eq!(record.t, 23.45);
    assert_eq!(light.read_count(), 0);
}

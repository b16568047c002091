//! A reporter sending to a collector over loopback.

use std::time::Duration;

use ecomind_collector::{Collector, DEFAULT_MAX_DATAGRAM, Payload};
use ecomind_core::mock::{MockLight, MockTempHumidity};
use ecomind_core::{LuxPolicy, Reporter, Sensors, TempHumidity, UdpTransport};
use serde_json::Value;
use tokio::time::timeout;

#[tokio::test]
async fn test_collector_receives_node_reports() {
    let collector = Collector::bind("127.0.0.1:0", DEFAULT_MAX_DATAGRAM)
        .await
        .unwrap();
    let port = collector.local_addr().unwrap().port();

    let light = MockLight::new(312.5);
    let mut sensors = Sensors::init(
        Box::new(MockTempHumidity::new(TempHumidity::new(23.456, 51.209))),
        Box::new(light.clone()),
    );
    let mut reporter = Reporter::new(
        "rak_nodo_01",
        LuxPolicy::Sentinel,
        UdpTransport::new("127.0.0.1", port),
    );

    assert!(reporter.report(&mut sensors).await.delivery.is_sent());
    let datagram = timeout(Duration::from_secs(2), collector.recv())
        .await
        .unwrap()
        .unwrap();
    match &datagram.payload {
        Payload::Record(record) => {
            assert_eq!(record.t, 23.45);
            assert_eq!(record.h, 51.2);
            assert_eq!(record.l, 312.5);
            assert_eq!(record.device_id, "rak_nodo_01");
        }
        other => panic!("expected a record, got {:?}", other),
    }

    let line: Value = serde_json::from_str(&datagram.to_json_line().unwrap()).unwrap();
    assert_eq!(line["device_id"], "rak_nodo_01");
    assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));

    light.set_fail_reads(true);
    assert!(reporter.report(&mut sensors).await.delivery.is_sent());
    let datagram = timeout(Duration::from_secs(2), collector.recv())
        .await
        .unwrap()
        .unwrap();
    match &datagram.payload {
        Payload::Record(record) => assert!(record.is_lux_sentinel()),
        other => panic!("expected a record, got {:?}", other),
    }

    assert_eq!(collector.stats().snapshot().records, 2);
}

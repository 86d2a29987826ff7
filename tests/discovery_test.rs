//! Tests de bout en bout: découverte, liaison, contrôle et événements
//! entre un peer device et un peer control point reliés par HTTP réel.

mod common;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{BINARY_LIGHT_TYPE, FakeSsdp, SWITCH_POWER_TYPE, binary_light_config,
             switch_power_config, wait_until};
use pmopeer::remote::RemoteServiceEvent;
use pmopeer::ssdp::{ALIVE, BYEBYE, ROOT_DEVICE, SSDP_ALL, SsdpEvent, SsdpHeaders};
use pmopeer::{DiscoveryEvent, Peer, PeerConfig};

fn from_addr() -> SocketAddr {
    "192.168.1.50:1900".parse().unwrap()
}

/// Sert un router sur un port éphémère.
async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

struct Fixture {
    device_peer: Peer,
    device: Arc<pmopeer::devices::Device>,
    service: Arc<pmopeer::services::Service>,
    client: Peer,
    client_ssdp: Arc<FakeSsdp>,
    location: String,
}

/// Monte un device servi en HTTP et un control point prêt à le
/// découvrir via son transport SSDP factice.
async fn fixture() -> Fixture {
    common::init_tracing();
    let device_ssdp = FakeSsdp::new();
    let device_peer = Peer::new(PeerConfig::default(), device_ssdp);
    let device = device_peer.create_device(binary_light_config(false));
    let service = device.create_service(switch_power_config());
    let device_addr = serve(device_peer.router()).await;
    let location = format!("http://{}{}", device_addr, device.description_url());

    let client_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client_listener.local_addr().unwrap();
    let client_ssdp = FakeSsdp::new();
    let client = Peer::new(
        PeerConfig {
            prefix: String::new(),
            hostname: Some("127.0.0.1".to_string()),
            port: client_addr.port(),
        },
        client_ssdp.clone(),
    );
    let client_router = client.router();
    tokio::spawn(async move {
        axum::serve(client_listener, client_router).await.unwrap();
    });

    Fixture {
        device_peer,
        device,
        service,
        client,
        client_ssdp,
        location,
    }
}

fn alive_headers(fixture: &Fixture) -> SsdpHeaders {
    SsdpHeaders {
        nts: Some(ALIVE.to_string()),
        nt: Some(ROOT_DEVICE.to_string()),
        usn: Some(format!("{}::{}", fixture.device.udn(), ROOT_DEVICE)),
        location: Some(fixture.location.clone()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_alive_emits_services_then_device_in_order() {
    let fixture = fixture().await;

    let mut all = fixture.client.listen(SSDP_ALL);
    let mut by_type = fixture.client.listen(BINARY_LIGHT_TYPE);
    let mut by_root = fixture.client.listen(ROOT_DEVICE);
    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: alive_headers(&fixture),
        from: from_addr(),
    });

    // Sur le joker: d'abord le service, puis le device.
    let first = tokio::time::timeout(Duration::from_secs(5), all.recv())
        .await
        .unwrap()
        .unwrap();
    match first {
        DiscoveryEvent::Service(service) => {
            assert_eq!(service.service_type(), SWITCH_POWER_TYPE);
            assert_eq!(
                service.usn(),
                format!("{}::{}", fixture.device.udn(), SWITCH_POWER_TYPE)
            );
        }
        other => panic!("expected a service first, got {other:?}"),
    }
    let second = tokio::time::timeout(Duration::from_secs(5), all.recv())
        .await
        .unwrap()
        .unwrap();
    match second {
        DiscoveryEvent::Device(device) => {
            assert_eq!(device.udn(), fixture.device.udn());
            assert_eq!(
                device.meta().friendly_name.as_deref(),
                Some("Test light")
            );
        }
        other => panic!("expected the device second, got {other:?}"),
    }

    // Canaux typés: le device arrive aussi par deviceType et par root.
    match tokio::time::timeout(Duration::from_secs(5), by_type.recv())
        .await
        .unwrap()
        .unwrap()
    {
        DiscoveryEvent::Device(device) => assert_eq!(device.udn(), fixture.device.udn()),
        other => panic!("expected a device on the type channel, got {other:?}"),
    }
    match tokio::time::timeout(Duration::from_secs(5), by_root.recv())
        .await
        .unwrap()
        .unwrap()
    {
        DiscoveryEvent::Device(_) => {}
        other => panic!("expected a device on the root channel, got {other:?}"),
    }

    // Le cache ne duplique pas un UDN déjà connu.
    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: alive_headers(&fixture),
        from: from_addr(),
    });
    common::settle().await;
    assert_eq!(fixture.client.remote_devices().len(), 1);
}

#[tokio::test]
async fn test_found_event_binds_like_alive() {
    let fixture = fixture().await;

    let mut by_type = fixture.client.listen(SWITCH_POWER_TYPE);
    fixture.client_ssdp.push(SsdpEvent::Found {
        headers: SsdpHeaders {
            st: Some(SWITCH_POWER_TYPE.to_string()),
            usn: Some(format!("{}::{}", fixture.device.udn(), SWITCH_POWER_TYPE)),
            location: Some(fixture.location.clone()),
            ..Default::default()
        },
        from: from_addr(),
    });

    match tokio::time::timeout(Duration::from_secs(5), by_type.recv())
        .await
        .unwrap()
        .unwrap()
    {
        DiscoveryEvent::Service(service) => {
            assert_eq!(service.service_type(), SWITCH_POWER_TYPE)
        }
        other => panic!("expected the service, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_service_bind_and_call() {
    let fixture = fixture().await;
    fixture.service.set("Status", "1");

    let mut all = fixture.client.listen(SSDP_ALL);
    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: alive_headers(&fixture),
        from: from_addr(),
    });

    let remote_service = loop {
        match tokio::time::timeout(Duration::from_secs(5), all.recv())
            .await
            .unwrap()
            .unwrap()
        {
            DiscoveryEvent::Service(service) => break service,
            DiscoveryEvent::Device(_) => continue,
        }
    };

    // bind résout actions et variables depuis le SCPD.
    let proxy = remote_service.bind().await.unwrap();
    let get_status = proxy.actions.get("GetStatus").unwrap();
    assert_eq!(
        get_status.outputs.get("ResultStatus"),
        Some(&"Status".to_string())
    );
    let status_var = proxy.variables.get("Status").unwrap();
    assert_eq!(status_var.data_type.as_deref(), Some("boolean"));
    assert!(status_var.send_events);

    // bind est idempotent: même proxy en cache.
    let again = remote_service.bind().await.unwrap();
    assert!(Arc::ptr_eq(&proxy, &again));

    // Invocation SOAP de bout en bout.
    let outputs = remote_service
        .call("GetStatus", &HashMap::new())
        .await
        .unwrap();
    assert_eq!(outputs.get("ResultStatus"), Some(&"1".to_string()));

    // Un Fault UPnP revient décodé avec son code.
    let err = remote_service
        .call("Boom", &HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.code, 501);
    assert_eq!(err.message, "boom");
}

#[tokio::test]
async fn test_gena_subscribe_notify_unsubscribe() {
    let fixture = fixture().await;
    fixture.service.set("Status", "1");

    let mut all = fixture.client.listen(SSDP_ALL);
    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: alive_headers(&fixture),
        from: from_addr(),
    });

    let remote_service = loop {
        match tokio::time::timeout(Duration::from_secs(5), all.recv())
            .await
            .unwrap()
            .unwrap()
        {
            DiscoveryEvent::Service(service) => break service,
            DiscoveryEvent::Device(_) => continue,
        }
    };

    // Le premier écouteur déclenche le SUBSCRIBE vers le device.
    let mut stream = remote_service.subscribe_events();
    let service = fixture.service.clone();
    assert!(wait_until(|| service.subscription_count() == 1).await);
    assert!(wait_until(|| remote_service.sid().is_some()).await);

    // Un notify du service arrive comme événement décodé.
    fixture.service.set("Status", "0");
    fixture.service.notify(&["Status"]);
    match tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap()
        .unwrap()
    {
        RemoteServiceEvent::Changed(values) => {
            assert_eq!(values.get("Status"), Some(&"0".to_string()));
        }
        other => panic!("expected a change event, got {other:?}"),
    }

    // La chute du dernier écouteur envoie l'UNSUBSCRIBE au device.
    drop(stream);
    assert!(wait_until(|| service.subscription_count() == 0).await);
    assert!(wait_until(|| remote_service.sid().is_none()).await);
}

#[tokio::test]
async fn test_byebye_emits_disappear_and_clears_cache() {
    let fixture = fixture().await;

    let mut all = fixture.client.listen(SSDP_ALL);
    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: alive_headers(&fixture),
        from: from_addr(),
    });

    let remote_service = loop {
        match tokio::time::timeout(Duration::from_secs(5), all.recv())
            .await
            .unwrap()
            .unwrap()
        {
            DiscoveryEvent::Service(service) => break service,
            DiscoveryEvent::Device(_) => continue,
        }
    };
    let remote_device = fixture
        .client
        .remote_device(&fixture.device.udn())
        .unwrap();

    let mut events = remote_service.subscribe_events();
    let mut disappear = remote_device.on_disappear();

    fixture.client_ssdp.push(SsdpEvent::Notify {
        headers: SsdpHeaders {
            nts: Some(BYEBYE.to_string()),
            nt: Some(ROOT_DEVICE.to_string()),
            usn: Some(format!("{}::{}", fixture.device.udn(), ROOT_DEVICE)),
            ..Default::default()
        },
        from: from_addr(),
    });

    match tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap()
    {
        RemoteServiceEvent::Disappear => {}
        other => panic!("expected disappear, got {other:?}"),
    }
    tokio::time::timeout(Duration::from_secs(5), disappear.recv())
        .await
        .unwrap()
        .unwrap();

    assert!(fixture.client.remote_device(&fixture.device.udn()).is_none());

    let _ = &fixture.device_peer;
}

mod common;

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use common::{config, wait_until};
use crossbeam_channel::unbounded;
use xbee::{ApiMode, AtCommand, Device, DeviceState, Event, LogLevel, TcpTransport};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn test_reopen_reconnects_to_bridge() {
    let bridge = TcpListener::bind("127.0.0.1:0").unwrap();
    let transport = TcpTransport::connect(bridge.local_addr().unwrap()).unwrap();
    let _first = bridge.accept().unwrap();
    let device = Device::new(transport, config(ApiMode::ApiEnabled));

    device.open().unwrap();
    device.close().unwrap();

    assert_eq!(device.open().unwrap(), ApiMode::ApiEnabled);
    assert_eq!(device.state(), DeviceState::Ready);
    let (mut second, _) = bridge.accept().unwrap();

    let frame_id = device
        .execute_non_query(AtCommand::new("NI").unwrap())
        .unwrap();
    let mut frame = [0u8; 8];
    second.read_exact(&mut frame).unwrap();
    assert_eq!(frame[3..7], [0x08, frame_id, b'N', b'I']);
    device.close().unwrap();
}

#[test]
fn test_lost_bridge_logs_one_error() {
    let bridge = TcpListener::bind("127.0.0.1:0").unwrap();
    let transport = TcpTransport::connect(bridge.local_addr().unwrap()).unwrap();
    let (server, _) = bridge.accept().unwrap();
    let device = Device::new(transport, config(ApiMode::ApiEnabled));

    let (tx, rx) = unbounded();
    device.subscribe(move |event| {
        if let Event::Log {
            level: LogLevel::Error,
            message,
        } = event
        {
            let _ = tx.send(message.clone());
        }
    });
    device.open().unwrap();

    drop(server);
    assert!(wait_until(WAIT, || !rx.is_empty()));

    // the receive loop keeps polling; the failure is reported once
    thread::sleep(Duration::from_millis(50));
    let errors: Vec<String> = rx.try_iter().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("connection closed by peer"));
    device.close().unwrap();
}

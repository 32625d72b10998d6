//! Frame I/O tests: transmit, not-ready nudging, receive, and statistics.
mod helpers {
    include!("../helpers/mod.rs");
}

use helpers::{extended_message, MockTwai};
use korri_twai::controller::{state::AdapterState, ControllerSlot, TwaiService};
use korri_twai::error::{DriverError, ReceiveError, SendError, TwaiError};
use korri_twai::infra::twai::{
    config::ControllerConfig,
    driver::{ControllerState, TwaiMessage, Wait},
};
use korri_twai::protocol::transport::{
    can_frame::CanFrame, can_id::CanId, traits::can_bus::CanBus,
};

fn config(statistics: bool) -> ControllerConfig {
    ControllerConfig::builder()
        .statistics(statistics)
        .build()
        .expect("valid configuration")
}

//==================================================================================TRANSMIT
#[tokio::test]
/// A frame sent on a running controller reaches the queue unchanged.
async fn test_send_queues_extended_frame() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    let id = CanId(0x18FE_F100);
    adapter.send(id, &[1, 2, 3, 4], true).await.unwrap();

    let sent = driver.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].identifier, 0x18FE_F100);
    assert!(sent[0].extended);
    assert!(!sent[0].single_shot);
    assert!(!sent[0].dlc_non_compliant);
    assert_eq!(sent[0].payload(), &[1, 2, 3, 4]);
}

#[tokio::test]
/// `wait = true` blocks on queue space; `wait = false` never does.
async fn test_send_wait_flag_maps_to_driver_wait() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    adapter.send(CanId(0x18FE_F100), &[1], true).await.unwrap();
    adapter.send(CanId(0x18FE_F100), &[2], false).await.unwrap();

    let frame = CanFrame::new(CanId(0x18EA_5023), &[0x00, 0xEE, 0x00]);
    CanBus::send(&mut adapter, &frame).await.unwrap();

    assert_eq!(
        driver.with(|inner| inner.tx_waits.clone()),
        vec![Wait::Forever, Wait::NoWait, Wait::Forever]
    );
}

#[tokio::test]
/// Sending before `open()` fails without reaching the driver.
async fn test_send_requires_open() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;

    let result = adapter.send(CanId(0x18FE_F100), &[0; 8], false).await;
    assert_eq!(result, Err(SendError::NotOpen));
    assert!(driver.sent().is_empty());
}

#[tokio::test]
/// A ten-byte payload is truncated to eight bytes and flagged non-compliant.
async fn test_send_truncates_oversized_payload() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    let payload = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9];
    adapter
        .send(CanId(0x0DF1_1923), &payload, true)
        .await
        .unwrap();

    let sent = driver.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].dlc_non_compliant);
    assert_eq!(sent[0].data_length_code, 8);
    assert_eq!(sent[0].payload(), &payload[..8]);
}

#[tokio::test]
/// A stopped controller is restarted by the failing send; the next send succeeds.
async fn test_send_restarts_stopped_controller() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();
    driver.set_state(ControllerState::Stopped);

    let result = adapter.send(CanId(0x18FE_F100), &[0; 8], false).await;
    assert_eq!(
        result,
        Err(SendError::NotReady {
            state: ControllerState::Stopped
        })
    );
    assert_eq!(driver.state(), ControllerState::Running);
    assert_eq!(driver.with(|inner| inner.start_calls), 2);
    assert!(driver.sent().is_empty());

    adapter
        .send(CanId(0x18FE_F100), &[0; 8], false)
        .await
        .unwrap();
    assert_eq!(driver.sent().len(), 1);
}

#[tokio::test]
/// A bus-off controller gets recovery initiated; the send still fails.
async fn test_send_initiates_recovery_on_bus_off() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();
    driver.set_state(ControllerState::BusOff);

    let result = adapter.send(CanId(0x18FE_F100), &[0; 8], true).await;
    assert_eq!(
        result,
        Err(SendError::NotReady {
            state: ControllerState::BusOff
        })
    );
    assert_eq!(driver.state(), ControllerState::Recovering);
    driver.with(|inner| {
        assert_eq!(inner.recovery_calls, 1);
        assert_eq!(inner.start_calls, 1);
    });
}

#[tokio::test]
/// A recovering controller is left alone by the send path.
async fn test_send_does_not_touch_recovering_controller() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();
    driver.set_state(ControllerState::Recovering);

    let result = adapter.send(CanId(0x18FE_F100), &[0; 8], true).await;
    assert_eq!(
        result,
        Err(SendError::NotReady {
            state: ControllerState::Recovering
        })
    );
    driver.with(|inner| {
        assert_eq!(inner.recovery_calls, 0);
        assert_eq!(inner.start_calls, 1);
    });
}

#[tokio::test]
/// A full transmit queue without waiting surfaces the driver timeout.
async fn test_send_full_queue_without_wait() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(true), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();
    driver.with(|inner| inner.tx_capacity = 1);

    adapter.send(CanId(0x18FE_F100), &[0; 8], false).await.unwrap();
    let result = adapter.send(CanId(0x18FE_F100), &[0; 8], false).await;
    assert_eq!(result, Err(SendError::Driver(DriverError::Timeout)));

    // Only the accepted frame is counted.
    let stats = adapter.stats().unwrap();
    stats.tick();
    let tx = adapter.throughput().unwrap().tx;
    assert_eq!(tx.bits_per_second, ((52.0 + 64.0) * 0.95) as u32);
    assert_eq!(tx.bits_per_second, 110);
}

//==================================================================================RECEIVE
#[tokio::test]
/// An empty queue yields no frame and no error.
async fn test_receive_empty_queue() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    assert_eq!(adapter.receive().await, None);
    assert_eq!(adapter.try_receive().await, Ok(None));
}

#[tokio::test]
/// A bounded receive wait times out into `None`.
async fn test_receive_bounded_wait_times_out() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let config = ControllerConfig::builder()
        .rx_wait(Wait::For(embassy_time::Duration::from_millis(10)))
        .build()
        .unwrap();
    let mut adapter = TwaiService::with_slot(&driver, &state, config, &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    assert_eq!(adapter.try_receive().await, Ok(None));

    driver.inject(extended_message(0x18FE_F100, &[7]));
    let frame = adapter.try_receive().await.unwrap().expect("frame queued");
    assert_eq!(frame.payload(), &[7]);
}

#[tokio::test]
/// Standard (11-bit) frames are dropped; the next extended frame is delivered.
async fn test_receive_drops_standard_frames() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(true), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    driver.inject(TwaiMessage {
        identifier: 0x123,
        extended: false,
        data_length_code: 2,
        data: [0xAA, 0xBB, 0, 0, 0, 0, 0, 0],
        ..TwaiMessage::default()
    });
    driver.inject(extended_message(0x18EA_5023, &[0x00, 0xEE, 0x00]));

    assert_eq!(adapter.receive().await, None);
    let frame = adapter.receive().await.expect("extended frame delivered");
    assert_eq!(frame.id, CanId(0x18EA_5023));
    assert_eq!(frame.payload(), &[0x00, 0xEE, 0x00]);

    // Only the delivered frame is counted.
    adapter.stats().unwrap().tick();
    let rx = adapter.throughput().unwrap().rx;
    assert_eq!(rx.bits_per_second, ((52.0 + 24.0) * 0.95) as u32);
    assert_eq!(rx.bits_per_second, 72);
}

#[tokio::test]
/// Driver failures map to `None` on `receive()` and to an error on `try_receive()`.
async fn test_receive_driver_failure() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    driver.with(|inner| inner.receive_error = Some(DriverError::InvalidState));
    assert_eq!(adapter.receive().await, None);

    driver.with(|inner| inner.receive_error = Some(DriverError::Fail));
    assert_eq!(
        adapter.try_receive().await,
        Err(ReceiveError::Driver(DriverError::Fail))
    );
}

#[tokio::test]
/// The documented fixture decomposes as expected after a receive.
async fn test_received_fixture_decomposition() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;
    adapter.open().unwrap();

    driver.inject(extended_message(0x18FE_F100, &[0xFF; 8]));
    let frame = adapter.receive().await.expect("frame delivered");
    let fields = frame.id.decompose();
    assert_eq!(fields.priority, 6);
    assert_eq!(fields.pgn, 65265);
    assert_eq!(fields.source, 0x00);
    assert_eq!(fields.destination, 0xFF);
}

//==================================================================================CAN BUS
#[tokio::test]
/// The protocol stack drives the adapter through the `CanBus` contract.
async fn test_can_bus_contract() {
    let driver = MockTwai::new();
    let state = AdapterState::new();
    let slot = ControllerSlot::new();
    let mut adapter = TwaiService::with_slot(&driver, &state, config(false), &slot)
        .into_parts()
        .adapter;

    assert!(matches!(
        CanBus::recv(&mut adapter).await,
        Err(TwaiError::Receive(ReceiveError::NotOpen))
    ));

    CanBus::open(&mut adapter).unwrap();
    adapter.init_frame_buffers();

    let id = CanId::builder(59904, 0x23)
        .to_destination(0x50)
        .with_priority(6)
        .build()
        .unwrap();
    let frame = CanFrame::new(id, &[0x00, 0xEE, 0x00]);
    CanBus::send(&mut adapter, &frame).await.unwrap();
    assert_eq!(driver.sent()[0].identifier, 0x18EA_5023);

    driver.inject(extended_message(0x18EA_5023, &[0x00, 0xEE, 0x00]));
    let received = CanBus::recv(&mut adapter).await.unwrap();
    assert_eq!(received, Some(frame));
    assert_eq!(CanBus::recv(&mut adapter).await.unwrap(), None);
}

//! Bus operation tests: exact wire lines and status mapping against the fake backend

use std::time::Duration;

use i3c_blaster::fake::FakeBackend;
use i3c_blaster::{
    BlasterError, DdrConfig, DdrWriteRead, DriveStrength, I3cBlaster, Ibi, PinState,
    SessionConfig,
};

fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_connect_timeout(Duration::from_millis(100))
        .with_open_retry_interval(Duration::from_millis(5))
        .with_banner_settle(Duration::from_millis(5))
        .with_banner_timeout(Duration::from_millis(10))
        .with_banner_poll_interval(Duration::from_millis(2))
}

/// Blaster on its own fake port, plus the backend handle for scripting
fn blaster(port_name: &str) -> (FakeBackend, I3cBlaster<FakeBackend>) {
    let backend = FakeBackend::with_device(port_name, "E6614C311B4B7A2F");
    let i3c = I3cBlaster::with_backend(backend.clone(), None).with_config(fast_config());
    (backend, i3c)
}

#[test_log::test]
fn test_gpio_write_wire_format() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-write");
    backend.push_reply("OK(0)");

    i3c.gpio_write(3, true).unwrap();

    assert_eq!(backend.last_written().as_deref(), Some("@gpio_write 3 1\r"));
}

#[test_log::test]
fn test_gpio_write_states() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-states");
    for _ in 0..3 {
        backend.push_reply("OK(0)");
    }

    i3c.gpio_write(0, false).unwrap();
    i3c.gpio_write(15, None::<bool>).unwrap();
    i3c.gpio_write(7, PinState::HiZ).unwrap();

    assert_eq!(
        backend.written(),
        vec!["@gpio_write 0 0\r", "@gpio_write 15 Z\r", "@gpio_write 7 Z\r"]
    );
}

#[test_log::test]
fn test_gpio_write_ignores_extra_values() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-extra");
    backend.push_reply("OK(0),7");

    assert_eq!(i3c.gpio_write(3, true), Ok(()));
}

#[test_log::test]
fn test_gpio_write_rejects_pin_before_sending() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-range");

    let err = i3c.gpio_write(16, true).unwrap_err();

    assert!(matches!(err, BlasterError::InvalidArgument(_)));
    assert!(backend.written().is_empty());
    assert_eq!(backend.open_count(), 0);
}

#[test_log::test]
fn test_gpio_read() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-read");
    backend.push_reply("OK(0),40961");
    backend.push_reply("OK(0),1");

    assert_eq!(i3c.gpio_read(None).unwrap(), 40961);
    assert_eq!(i3c.gpio_read(Some(12)).unwrap(), 1);
    assert_eq!(backend.written(), vec!["@gpio_read\r", "@gpio_read 12\r"]);
}

#[test_log::test]
fn test_gpio_read_missing_value() {
    let (backend, mut i3c) = blaster("/dev/fake-gpio-missing");
    backend.push_reply("OK(0)");

    assert!(matches!(i3c.gpio_read(None), Err(BlasterError::Format(_))));
}

#[test_log::test]
fn test_i3c_scan() {
    let (backend, mut i3c) = blaster("/dev/fake-scan");
    backend.push_reply("OK(0),0x08,0x30");
    backend.push_reply("OK(0),");

    assert_eq!(i3c.i3c_scan().unwrap(), vec![0x08, 0x30]);
    assert_eq!(i3c.i3c_scan().unwrap(), Vec::<u8>::new());
    assert_eq!(backend.last_written().as_deref(), Some("@i3c_scan\r"));
}

#[test_log::test]
fn test_i3c_entdaa() {
    let (backend, mut i3c) = blaster("/dev/fake-entdaa");
    backend.push_reply("OK(0),0x04,0x6a,0x00,0x00,0x00,0x00,0x27,0xa0");
    backend.push_reply("ERR_NAKED(3)");

    let info = i3c.i3c_entdaa(0x30).unwrap();
    assert_eq!(info, Some(vec![0x04, 0x6a, 0, 0, 0, 0, 0x27, 0xa0]));

    assert_eq!(i3c.i3c_entdaa(0x31).unwrap(), None);
    assert_eq!(backend.written(), vec!["@i3c_entdaa 48\r", "@i3c_entdaa 49\r"]);
}

#[test_log::test]
fn test_simple_commands() {
    let (backend, mut i3c) = blaster("/dev/fake-simple");
    for _ in 0..5 {
        backend.push_reply("OK(0)");
    }

    i3c.i3c_rstdaa().unwrap();
    i3c.i3c_targetreset().unwrap();
    i3c.i3c_clock(12500).unwrap();
    i3c.i3c_drivestrength(DriveStrength::Ma4).unwrap();
    i3c.i3c_ddr_config(DdrConfig::default()).unwrap();

    assert_eq!(
        backend.written(),
        vec![
            "@i3c_rstdaa\r",
            "@i3c_targetreset\r",
            "@i3c_clock 12500\r",
            "@i3c_drivestrength 4\r",
            "@i3c_ddr_config 1 0 0\r",
        ]
    );
}

#[test_log::test]
fn test_sdr_transfers() {
    let (backend, mut i3c) = blaster("/dev/fake-sdr");
    backend.push_reply("OK(0)");
    backend.push_reply("OK(0)");
    backend.push_reply("OK(0),0x01,0x02");
    backend.push_reply("OK(0),0xde,0xad,0xbe");

    i3c.i3c_sdr_write(0x30, &[0x13, 0x04]).unwrap();
    i3c.i3c_sdr_write(0x30, &[]).unwrap();
    assert_eq!(i3c.i3c_sdr_read(0x30, 4).unwrap(), vec![0x01, 0x02]);
    assert_eq!(
        i3c.i3c_sdr_writeread(0x30, &[0x00], 10).unwrap(),
        vec![0xde, 0xad, 0xbe]
    );

    assert_eq!(
        backend.written(),
        vec![
            "@i3c_sdr_write 48 0x13,0x4\r",
            "@i3c_sdr_write 48 \r",
            "@i3c_sdr_read 48 4\r",
            "@i3c_sdr_writeread 48 0x0 10\r",
        ]
    );
}

#[test_log::test]
fn test_ccc_transfers() {
    let (backend, mut i3c) = blaster("/dev/fake-ccc");
    backend.push_reply("OK(0)");
    backend.push_reply("OK(0)");
    backend.push_reply("OK(0),0x00,0x10");

    i3c.i3c_sdr_ccc_bc_write(&[0x06]).unwrap();
    i3c.i3c_sdr_ccc_direct_write(0x30, &[0x89], &[0x00, 0x10]).unwrap();
    assert_eq!(
        i3c.i3c_sdr_ccc_direct_read(0x30, &[0x8b], 2).unwrap(),
        vec![0x00, 0x10]
    );

    assert_eq!(
        backend.written(),
        vec![
            "@i3c_sdr_ccc_bc_write 0x6\r",
            "@i3c_sdr_ccc_direct_write 48 0x89 0x0,0x10\r",
            "@i3c_sdr_ccc_direct_read 48 0x8b 2\r",
        ]
    );
}

#[test_log::test]
fn test_i3c_poll() {
    let (backend, mut i3c) = blaster("/dev/fake-poll");
    backend.push_reply("WARN_NO_IBI(5)");
    backend.push_reply("OK(0),0x30,0xae,0x01");

    assert_eq!(i3c.i3c_poll().unwrap(), None);
    assert_eq!(
        i3c.i3c_poll().unwrap(),
        Some(Ibi {
            address: 0x30,
            payload: vec![0xae, 0x01],
        })
    );
}

#[test_log::test]
fn test_ibi_pending_error() {
    let (backend, mut i3c) = blaster("/dev/fake-ibi-pending");
    backend.push_reply("ERR_IBI_ARBITRATION(1)");

    let err = i3c.i3c_sdr_write(0x30, &[0x01]).unwrap_err();
    assert!(err.is_ibi_pending());
    assert_eq!(err.status(), Some("ERR_IBI_ARBITRATION(1)"));
}

#[test_log::test]
fn test_ddr_transfers() {
    let (backend, mut i3c) = blaster("/dev/fake-ddr");
    backend.push_reply("OK(0),2");
    backend.push_reply("OK(0),0x1234,0x5678");

    i3c.i3c_ddr_write(0x30, 0x00, &[0x1234, 0x5678]).unwrap();
    assert_eq!(i3c.i3c_ddr_read(0x30, 0x00, 10).unwrap(), vec![0x1234, 0x5678]);

    assert_eq!(
        backend.written(),
        vec![
            "@i3c_ddr_write 48 0 0x1234,0x5678\r",
            "@i3c_ddr_read 48 0 10\r",
        ]
    );
}

#[test_log::test]
fn test_ddr_writeread() {
    let (backend, mut i3c) = blaster("/dev/fake-ddr-wr");
    backend.push_reply("OK(0),2,0xabcd,0x0001");
    backend.push_reply("OK(0)");

    let result = i3c
        .i3c_ddr_writeread(0x30, 0x01, 0x02, &[0x1234, 0x5678], 10)
        .unwrap();
    assert_eq!(
        result,
        DdrWriteRead {
            written: 2,
            data: vec![0xabcd, 0x0001],
        }
    );

    let empty = i3c.i3c_ddr_writeread(0x30, 0x01, 0x02, &[], 10).unwrap();
    assert_eq!(empty, DdrWriteRead::default());
    assert_eq!(empty.written, 0);
    assert!(empty.data.is_empty());

    assert_eq!(
        backend.written(),
        vec![
            "@i3c_ddr_writeread 48 1 2 0x1234,0x5678 10\r",
            "@i3c_ddr_writeread 48 1 2  10\r",
        ]
    );
}

#[test_log::test]
fn test_unexpected_status_is_protocol_error() {
    let (backend, mut i3c) = blaster("/dev/fake-protocol");
    backend.push_reply("ERR_INVALID_PARAMETER(4)");
    backend.push_reply("ERR_NAKED(3)");

    assert_eq!(
        i3c.i3c_clock(99999),
        Err(BlasterError::Protocol("ERR_INVALID_PARAMETER(4)".to_string()))
    );
    // A NAK is only anticipated for ENTDAA
    assert_eq!(
        i3c.i3c_sdr_read(0x30, 1),
        Err(BlasterError::Protocol("ERR_NAKED(3)".to_string()))
    );
}

#[test_log::test]
fn test_malformed_reply_is_protocol_error() {
    let (backend, mut i3c) = blaster("/dev/fake-malformed");
    backend.push_reply("ERROR: Unknown command");

    assert_eq!(
        i3c.i3c_rstdaa(),
        Err(BlasterError::Protocol("ERROR: Unknown command".to_string()))
    );
}

#[test_log::test]
fn test_bad_value_is_format_error() {
    let (backend, mut i3c) = blaster("/dev/fake-format");
    backend.push_reply("OK(0),0x01,bogus");
    backend.push_reply("OK(0),0x100");

    assert!(matches!(i3c.i3c_sdr_read(0x30, 2), Err(BlasterError::Format(_))));
    assert!(matches!(i3c.i3c_sdr_read(0x30, 1), Err(BlasterError::Format(_))));
}

#[test_log::test]
fn test_timeout_is_protocol_error_with_empty_status() {
    let (_backend, mut i3c) = blaster("/dev/fake-silent");

    assert_eq!(i3c.i3c_scan(), Err(BlasterError::Protocol(String::new())));
}

#[test_log::test]
fn test_no_device_is_protocol_error() {
    let mut i3c = I3cBlaster::with_backend(FakeBackend::new(), None).with_config(fast_config());

    assert!(!i3c.connect());
    assert_eq!(i3c.i3c_scan(), Err(BlasterError::Protocol(String::new())));
}

#[test_log::test]
fn test_binds_to_serial_number() {
    let backend = FakeBackend::new();
    backend.add_device("/dev/fake-bind-a", Some("A"));
    backend.add_device("/dev/fake-bind-b", Some("B"));
    backend.push_reply("OK(0)");
    let mut i3c = I3cBlaster::with_backend(backend.clone(), Some("B")).with_config(fast_config());

    i3c.i3c_rstdaa().unwrap();

    assert_eq!(i3c.serial_number(), Some("B"));
    assert_eq!(i3c.port_name(), Some("/dev/fake-bind-b"));
}

#[test_log::test]
fn test_list_devices() {
    let backend = FakeBackend::new();
    backend.add_device("/dev/fake-list-a", Some("A"));
    backend.add_port(i3c_blaster::PortDescriptor {
        port_name: "/dev/ttyS0".to_string(),
        usb_info: "n/a".to_string(),
        serial_number: None,
    });
    backend.add_device("/dev/fake-list-b", Some("B"));
    backend.add_device("/dev/fake-list-c", Some("B"));
    let i3c = I3cBlaster::with_backend(backend, None);

    assert_eq!(i3c.list_devices().unwrap(), vec!["A", "B", "B"]);
}

#[test_log::test]
fn test_reconnect_and_close() {
    let (backend, mut i3c) = blaster("/dev/fake-reconnect");

    assert!(i3c.connect());
    assert!(i3c.reconnect());
    assert_eq!(backend.open_count(), 2);

    i3c.close();
    assert_eq!(backend.close_count(), 2);
    assert!(!i3c.session().is_connected());
}

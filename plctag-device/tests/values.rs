mod common;

use common::{memory_device, CONNECTION};
use plctag_device::{
    codec::{STRING_CAPACITY, STRING_DATA_OFFSET},
    Error, Operation, Status, Value, ValueKind,
};
use std::thread;

#[test]
fn test_scalar_round_trips() -> anyhow::Result<()> {
    let (_, device) = memory_device();

    let values = [
        Value::Boolean(true),
        Value::Boolean(false),
        Value::Int8(i8::MIN),
        Value::UInt8(0),
        Value::UInt8(255),
        Value::Int16(-12345),
        Value::UInt16(u16::MAX),
        Value::Int32(-1),
        Value::Int32(i32::MAX),
        Value::UInt32(0xDEAD_BEEF),
        Value::Int64(i64::MIN),
        Value::UInt64(u64::MAX),
        Value::Float32(3.25),
        Value::Float64(-0.125),
    ];

    for (i, value) in values.iter().enumerate() {
        let name = format!("Scalar{i}");
        device.write_tag(&name, value)?;
        let back = device.read_tag(&name, value.kind())?;
        assert_eq!(&back, value, "round trip of {name}");
    }
    Ok(())
}

#[test]
fn test_typed_round_trips() -> anyhow::Result<()> {
    let (_, device) = memory_device();

    device.write("Run", true)?;
    device.write("Count", 42u16)?;
    device.write("Temp", 21.5f64)?;
    device.write("Label", String::from("Line 3"))?;

    assert!(device.read::<bool>("Run")?);
    assert_eq!(device.read::<u16>("Count")?, 42);
    assert_eq!(device.read::<f64>("Temp")?, 21.5);
    assert_eq!(device.read::<String>("Label")?, "Line 3");

    let mut count = 0u16;
    device.read_into("Count", &mut count)?;
    assert_eq!(count, 42);
    Ok(())
}

#[test]
fn test_string_round_trip_and_padding() -> anyhow::Result<()> {
    let (transport, device) = memory_device();

    device.write_tag("Msg", &Value::from("a much longer message"))?;
    device.write_tag("Msg", &Value::from("short"))?;
    assert_eq!(
        device.read_tag("Msg", ValueKind::String)?,
        Value::from("short")
    );

    let raw = transport.remote("Msg").expect("tag written");
    assert_eq!(&raw[..4], &5i32.to_le_bytes());
    assert_eq!(&raw[STRING_DATA_OFFSET..STRING_DATA_OFFSET + 5], b"short");
    assert!(raw[STRING_DATA_OFFSET + 5..STRING_DATA_OFFSET + STRING_CAPACITY]
        .iter()
        .all(|b| *b == 0));
    Ok(())
}

#[test]
fn test_over_length_string_rejected() -> anyhow::Result<()> {
    let (transport, device) = memory_device();
    device.write_tag("Msg", &Value::from("keep"))?;
    let before = transport.remote("Msg").expect("tag written");
    let writes = transport.calls(Operation::Write);

    let err = device
        .write_tag("Msg", &Value::String("z".repeat(STRING_CAPACITY + 1)))
        .unwrap_err();
    assert!(matches!(err, Error::StringTooLong { len: 79, .. }), "{err}");
    assert_eq!(transport.calls(Operation::Write), writes);
    assert_eq!(transport.remote("Msg").expect("tag written"), before);
    assert_eq!(device.read::<String>("Msg")?, "keep");
    Ok(())
}

#[test]
fn test_unknown_kind_makes_no_transport_calls() {
    let (transport, device) = memory_device();

    let err = device.read_tag_as("Timer1", "TIMER").unwrap_err();
    match err {
        Error::UnsupportedValueKind { kind } => assert_eq!(kind, "TIMER"),
        other => panic!("expected UnsupportedValueKind, got {other:?}"),
    }
    assert!(matches!(
        device.write_tag_as("Timer1", "TIMER", "0"),
        Err(Error::UnsupportedValueKind { .. })
    ));

    assert_eq!(transport.calls(Operation::Create), 0);
    assert_eq!(transport.calls(Operation::Read), 0);
    assert_eq!(transport.calls(Operation::Write), 0);
}

#[test]
fn test_handle_reuse() -> anyhow::Result<()> {
    let (transport, device) = memory_device();

    device.read::<i32>("Counter1")?;
    device.read::<i32>("Counter1")?;

    assert_eq!(transport.calls(Operation::Create), 1);
    assert_eq!(transport.calls(Operation::Read), 2);
    assert_eq!(
        transport.created_attributes(),
        vec![format!("{CONNECTION}&name=Counter1")]
    );
    Ok(())
}

#[test]
fn test_concurrent_first_access_creates_one_handle() {
    let (transport, device) = memory_device();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| device.read::<u32>("Shared").expect("read"));
        }
    });

    assert_eq!(transport.calls(Operation::Create), 1);
    assert_eq!(device.open_handles(), 1);
}

#[test]
fn test_string_reads_never_see_partial_writes() -> anyhow::Result<()> {
    let (_, device) = memory_device();
    let long = "L".repeat(60);
    let short = String::from("short");
    device.write_tag("Msg", &Value::from(long.as_str()))?;

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let text = if i % 2 == 0 { &short } else { &long };
                device.write_tag("Msg", &Value::from(text.as_str())).expect("write");
            }
        });
        s.spawn(|| {
            for _ in 0..300 {
                let seen = device.read::<String>("Msg").expect("read");
                assert!(seen == short || seen == long, "partial string {seen:?}");
            }
        });
    });
    Ok(())
}

#[test]
fn test_read_failure_is_reported() {
    let (transport, device) = memory_device();
    transport.fail_next(Operation::Read, Status::ERR_TIMEOUT);

    match device.read::<i16>("Slow") {
        Err(Error::TransportReadFailed { name, status }) => {
            assert_eq!(name, "Slow");
            assert_eq!(status, Status::ERR_TIMEOUT);
        }
        other => panic!("expected TransportReadFailed, got {other:?}"),
    }
}

#[test]
fn test_failed_write_leaves_remote_unchanged() -> anyhow::Result<()> {
    let (transport, device) = memory_device();
    device.write("Setpoint", 10i32)?;
    transport.fail_next(Operation::Write, Status::ERR_BAD_CONNECTION);

    assert!(matches!(
        device.write("Setpoint", 99i32),
        Err(Error::TransportWriteFailed {
            status: Status::ERR_BAD_CONNECTION,
            ..
        })
    ));
    assert_eq!(device.read::<i32>("Setpoint")?, 10);
    Ok(())
}

#[test]
fn test_unlock_error_is_combined() {
    let (transport, device) = memory_device();
    // Length store fails inside the lock, then unlock fails too.
    device.write_tag("Msg", &Value::from("x")).expect("write");
    transport.fail_next(Operation::SetScalar, Status::ERR_OUT_OF_BOUNDS);
    transport.fail_next(Operation::Unlock, Status::ERR_MUTEX_UNLOCK);

    let err = device.write_tag("Msg", &Value::from("y")).unwrap_err();
    match &err {
        Error::Combined { unlock, cause } => {
            assert!(matches!(**unlock, Error::UnlockFailed { .. }));
            assert!(matches!(**cause, Error::AccessFailed { offset: 0, .. }));
        }
        other => panic!("expected Combined, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("failed to unlock"), "{msg}");
    assert!(msg.contains("at offset 0"), "{msg}");
}

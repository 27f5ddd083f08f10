// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use brood_core::Lineage;

fn candidate(id: u64, fitness: f64) -> Candidate {
    Candidate::new(IndividualId(id), vec![0.25, -1.5]).with_fitness(fitness)
}

#[test]
fn breed_task_survives_encoding() {
    let response = Response::Task {
        task: Some(Task::breed(IndividualId(12), candidate(3, 1.0), candidate(4, 2.0))),
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn failed_result_carries_its_lineage() {
    let request = Request::ReturnResult {
        client: ClientId(2),
        result: TaskResult::failure(
            ClientId(2),
            Lineage {
                mother: Some(IndividualId(1)),
                father: Some(IndividualId(5)),
                child: IndividualId(9),
            },
        ),
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn requests_are_tagged_by_type() {
    let encoded = encode(&Request::GetOptChunk {
        client: ClientId(0),
        max_tasks: 8,
    })
    .expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&encoded).expect("not JSON");

    assert_eq!(json["type"], "GetOptChunk");
    assert_eq!(json["max_tasks"], 8);
}

#[test]
fn unregistered_sentinel_is_minus_one_on_the_wire() {
    let response = Response::Registered {
        registration: Registration::rejected("Master speaking, absolutely wrong key."),
    };
    let encoded = encode(&response).expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&encoded).expect("not JSON");

    assert_eq!(json["registration"]["client"], -1);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn oversized_prefix_is_rejected_before_allocating() {
    let mut buffer = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    buffer.extend_from_slice(b"{}");

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message(&mut cursor).await.unwrap_err();

    assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
}

#[tokio::test]
async fn truncated_frame_reads_as_closed() {
    let mut cursor = std::io::Cursor::new(vec![0u8, 0, 0, 10, b'{']);
    let err = read_message(&mut cursor).await.unwrap_err();

    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[test]
fn blocking_and_async_framing_agree() {
    let request = Request::Status;
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &encode(&request).unwrap()).unwrap();

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let decoded = rt.block_on(async {
        let mut cursor = std::io::Cursor::new(buffer);
        read_request(&mut cursor, DEFAULT_TIMEOUT).await
    });

    assert_eq!(decoded.unwrap(), request);
}

#[test]
fn closed_connection_maps_to_an_io_transport_error() {
    let err: TransportError = ProtocolError::ConnectionClosed.into();
    assert!(matches!(err, TransportError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));

    let err: TransportError = ProtocolError::MessageTooLarge { size: 9, max: 1 }.into();
    assert!(matches!(err, TransportError::Protocol(_)));
}

#[test]
fn only_idempotent_requests_are_resent() {
    let client = ClientId(3);

    assert!(Request::GetTask { client }.is_retry_safe());
    assert!(Request::Poll { client }.is_retry_safe());
    assert!(Request::Status.is_retry_safe());
    assert!(!Request::GetInitChunk { client, max_tasks: 4 }.is_retry_safe());
    assert!(!Request::GetOptChunk { client, max_tasks: 4 }.is_retry_safe());
    assert!(!Request::Register { key: String::new() }.is_retry_safe());
}

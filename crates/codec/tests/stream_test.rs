use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, FramedWrite};

use tubemq_codec::frame::{BEGIN_TOKEN, MAX_BLOCK_SIZE, encode_frame};
use tubemq_codec::{CodecError, Frame, FrameCodec, Response};

#[tokio::test]
async fn test_frames_survive_arbitrary_splits() {
    let (mut client, server) = tokio::io::duplex(64);

    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![1],
        vec![2; MAX_BLOCK_SIZE],
        vec![3; MAX_BLOCK_SIZE + 1],
        vec![4; 3 * MAX_BLOCK_SIZE + 17],
    ];

    let to_send = payloads.clone();
    let writer = tokio::spawn(async move {
        for (id, payload) in to_send.iter().enumerate() {
            let frame = encode_frame(u32::try_from(id).unwrap(), payload).unwrap();
            // Uneven write sizes so headers and blocks straddle reads.
            for chunk in frame.chunks(37) {
                client.write_all(chunk).await.unwrap();
            }
        }
        client.shutdown().await.unwrap();
    });

    let mut frames = FramedRead::new(server, FrameCodec::new());
    for (id, payload) in payloads.iter().enumerate() {
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.correlation_id(), u32::try_from(id).unwrap());
        assert_eq!(frame.payload().as_ref(), payload.as_slice());
    }
    assert!(frames.next().await.is_none());

    writer.await.unwrap();
}

#[tokio::test]
async fn test_framed_write_matches_encode_frame() {
    let (client, server) = tokio::io::duplex(1 << 16);

    let mut sink = FramedWrite::new(client, FrameCodec::new());
    let payload = Bytes::from(vec![9u8; MAX_BLOCK_SIZE * 2]);
    sink.send(Frame::new(12, payload.clone())).await.unwrap();
    drop(sink);

    let mut frames = FramedRead::new(server, FrameCodec::new());
    let frame = frames.next().await.unwrap().unwrap();
    assert_eq!(frame, Frame::new(12, payload));
}

#[tokio::test]
async fn test_stream_closed_mid_frame() {
    let (mut client, server) = tokio::io::duplex(1024);

    let frame = encode_frame(1, b"cut short").unwrap();
    client.write_all(&frame[..frame.len() - 3]).await.unwrap();
    drop(client);

    let mut frames = FramedRead::new(server, FrameCodec::new());
    let err = frames.next().await.unwrap().unwrap_err();
    assert!(matches!(err, CodecError::Framing(_)));
}

#[tokio::test]
async fn test_desync_is_fatal() {
    let (mut client, server) = tokio::io::duplex(1024);

    client.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
    drop(client);

    let mut frames = FramedRead::new(server, FrameCodec::new());
    let err = frames.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        CodecError::ProtocolMismatch {
            expected: BEGIN_TOKEN,
            ..
        }
    ));
    assert!(err.is_connection_fatal());
}

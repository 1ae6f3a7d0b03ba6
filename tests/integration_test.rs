// End-to-end tests for the live streaming server: real handshakes and chunk streams over
// loopback TCP, driving the publish/play paths the way an encoder or a player would.

mod common;

use std::time::Duration;

use live_media::ServerConfig;

use common::*;

#[tokio::test]
async fn server_accepts_a_raw_tcp_connection() {
    let port = 19400;
    spawn_server(test_server_config(port)).await;

    let addr = format!("127.0.0.1:{}", port);
    let result = tokio::net::TcpStream::connect(&addr).await;
    assert!(result.is_ok(), "server should accept a plain TCP connection");
}

#[tokio::test]
async fn server_completes_simple_handshake() {
    let port = 19401;
    spawn_server(test_server_config(port)).await;

    let addr = format!("127.0.0.1:{}", port);
    let _client = TestClient::connect(&addr).await;
}

#[tokio::test]
async fn server_respects_connection_limit() {
    let port = 19402;
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .max_connections(1)
        .hls_save_path(std::env::temp_dir().join("live-media-test-hls-19402").to_string_lossy().to_string())
        .build()
        .unwrap();
    spawn_server(config).await;

    let addr = format!("127.0.0.1:{}", port);

    let _first = TestClient::connect(&addr).await;

    // The second socket is accepted by the OS backlog but the server drops it before any
    // handshake bytes go out, so driving a handshake over it must fail.
    let second = TestClient::try_connect(&addr).await;
    assert!(second.is_none(), "second connection should be rejected once the limit is hit");
}

#[tokio::test]
async fn connect_and_create_stream_round_trip() {
    let port = 19403;
    spawn_server(test_server_config(port)).await;

    let addr = format!("127.0.0.1:{}", port);
    let mut client = TestClient::connect(&addr).await;
    let stream_id = connect_and_create_stream(&mut client, "live").await;
    assert!(stream_id >= 1, "createStream must allocate a nonzero stream id");
}

#[tokio::test]
async fn publish_then_play_delivers_gop_primer_in_order() {
    let port = 19404;
    spawn_server(test_server_config(port)).await;
    let addr = format!("127.0.0.1:{}", port);

    let mut publisher = TestClient::connect(&addr).await;
    let pub_stream_id = connect_and_create_stream(&mut publisher, "live").await;
    publisher.publish(pub_stream_id, "camera1").await;

    publisher.send_metadata(pub_stream_id).await;
    publisher.send_video(0, avc_sequence_header(), pub_stream_id).await;
    publisher.send_audio(0, aac_sequence_header(), pub_stream_id).await;
    publisher.send_video(40, avc_keyframe(0xAA), pub_stream_id).await;
    publisher.send_video(80, avc_interframe(0xBB), pub_stream_id).await;

    // Give the publisher's fanout task a moment to land the keyframe in its GOP cache
    // before a subscriber arrives looking for a primer.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut subscriber = TestClient::connect(&addr).await;
    let sub_stream_id = connect_and_create_stream(&mut subscriber, "live").await;
    subscriber.play(sub_stream_id, "camera1").await;

    subscriber.expect_command("onStatus").await; // Play.Reset
    subscriber.expect_command("onStatus").await; // Play.Start

    // Primer order is metadata, video header, audio header, then cached media in arrival
    // order: the keyframe, then the interframe that followed it. `expect_metadata` skips
    // past the `play` handler's own `|RtmpSampleAccess`/`Data.Start` data messages, which
    // arrive first but aren't part of the primer.
    let metadata = subscriber.expect_metadata().await;
    assert_eq!(metadata.message_type(), 18, "expected onMetaData (AMF0 data) first");

    let video_header = subscriber.read_message().await;
    assert_eq!(video_header.message_type(), 9);
    assert_eq!(video_header.payload[1], 0x00, "expected the AVC sequence header next");

    let audio_header = subscriber.read_message().await;
    assert_eq!(audio_header.message_type(), 8);
    assert_eq!(audio_header.payload[1], 0x00, "expected the AAC sequence header next");

    let keyframe = subscriber.read_message().await;
    assert_eq!(keyframe.message_type(), 9);
    assert_eq!(keyframe.payload[0] >> 4, 1, "expected the cached keyframe");

    let interframe = subscriber.read_message().await;
    assert_eq!(interframe.message_type(), 9);
    assert_eq!(interframe.payload[0] >> 4, 2, "expected the cached interframe after the keyframe");

    // Every retargeted message must carry the subscriber's own message stream id, not
    // the publisher's.
    assert_eq!(video_header.message_stream_id(), sub_stream_id);
    assert_eq!(keyframe.message_stream_id(), sub_stream_id);
}

#[tokio::test]
async fn live_frames_reach_an_already_subscribed_viewer() {
    let port = 19405;
    spawn_server(test_server_config(port)).await;
    let addr = format!("127.0.0.1:{}", port);

    let mut publisher = TestClient::connect(&addr).await;
    let pub_stream_id = connect_and_create_stream(&mut publisher, "live").await;
    publisher.publish(pub_stream_id, "camera2").await;
    publisher.send_video(0, avc_sequence_header(), pub_stream_id).await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut subscriber = TestClient::connect(&addr).await;
    let sub_stream_id = connect_and_create_stream(&mut subscriber, "live").await;
    subscriber.play(sub_stream_id, "camera2").await;
    subscriber.expect_command("onStatus").await;
    subscriber.expect_command("onStatus").await;

    let primer_header = subscriber.expect_video().await;
    assert_eq!(primer_header.message_type(), 9);

    publisher.send_video(40, avc_keyframe(0x11), pub_stream_id).await;
    let live = subscriber.read_message().await;
    assert_eq!(live.message_type(), 9);
    assert_eq!(live.timestamp(), 40);
    assert_eq!(live.payload[0] >> 4, 1);
}

#[tokio::test]
async fn duplicate_publisher_is_rejected() {
    let port = 19406;
    spawn_server(test_server_config(port)).await;
    let addr = format!("127.0.0.1:{}", port);

    let mut first = TestClient::connect(&addr).await;
    let first_stream_id = connect_and_create_stream(&mut first, "live").await;
    first.publish(first_stream_id, "taken").await;

    let mut second = TestClient::connect(&addr).await;
    let second_stream_id = connect_and_create_stream(&mut second, "live").await;
    second
        .send_command(
            live_media::RtmpCommand::publish("taken", "live"),
            second_stream_id,
        )
        .await;

    // The handler fails with a duplicate-publisher error before producing any response,
    // so no `NetStream.Publish.Start` ever reaches the second connection, and per §7 the
    // connection itself is closed immediately.
    let arrived = second.command_arrives_within("onStatus", Duration::from_millis(500)).await;
    assert!(!arrived, "a second publisher on the same stream must not receive Publish.Start");
    let closed = second.connection_closes_within(Duration::from_secs(1)).await;
    assert!(closed, "a duplicate publisher's connection must be closed");

    // The original publisher is unaffected and still servable.
    let mut subscriber = TestClient::connect(&addr).await;
    let sub_stream_id = connect_and_create_stream(&mut subscriber, "live").await;
    subscriber.play(sub_stream_id, "taken").await;
    let arrived = subscriber.command_arrives_within("onStatus", Duration::from_secs(2)).await;
    assert!(arrived, "play against the original publisher must still succeed");
}

#[tokio::test]
async fn play_against_unknown_stream_gets_no_status() {
    let port = 19407;
    spawn_server(test_server_config(port)).await;
    let addr = format!("127.0.0.1:{}", port);

    let mut client = TestClient::connect(&addr).await;
    let stream_id = connect_and_create_stream(&mut client, "live").await;
    client.play(stream_id, "nobody-is-publishing-this").await;

    let arrived = client.command_arrives_within("onStatus", Duration::from_millis(500)).await;
    assert!(!arrived, "play against a nonexistent publisher must not produce Play.Start");
    let closed = client.connection_closes_within(Duration::from_secs(1)).await;
    assert!(closed, "play against an unknown publisher must close the connection (§7)");
}

#[tokio::test]
async fn server_config_validation_rejects_bad_values() {
    assert!(ServerConfig::builder().port(0).build().is_err());
    assert!(ServerConfig::builder().chunk_size(100).build().is_err());
    assert!(ServerConfig::builder().chunk_size(100_000).build().is_err());
    assert!(ServerConfig::builder()
        .host("0.0.0.0")
        .port(1935)
        .chunk_size(4096)
        .build()
        .is_ok());
}

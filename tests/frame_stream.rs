use bytes::Bytes;
use xbee::protocol::{
    ApiMode, AtCommand, AtCommandStatus, AtData, FrameReader, Request, Response, codec, escape,
};

fn read_all(reader: &mut FrameReader, mode: ApiMode, chunks: &[&[u8]]) -> Vec<Bytes> {
    let mut frames = Vec::new();
    for chunk in chunks {
        reader.feed(mode, chunk).unwrap();
        while let Some(frame) = reader.next_frame() {
            frames.push(frame);
        }
    }
    frames
}

#[test]
fn test_signal_strength_frame_decodes() {
    let wire = [0x7E, 0x00, 0x06, 0x88, 0x01, b'D', b'B', 0x00, 0x28, 0xC8];
    let mut reader = FrameReader::new();
    let frames = read_all(&mut reader, ApiMode::ApiEnabled, &[&wire]);
    assert_eq!(frames.len(), 1);

    let response = Response::decode(frames[0].clone()).unwrap().unwrap();
    let at = response.as_at_command().unwrap();
    assert_eq!(at.command(), "DB");
    assert_eq!(at.status(), AtCommandStatus::Ok);
    assert_eq!(at.data(), Some(&AtData::SignalStrength(-40)));
}

#[test]
fn test_truncated_frame_waits_for_rest() {
    let wire = codec::encode(&[0x88, 0x01, b'D', b'B', 0x00, 0x28]).unwrap();
    let mut reader = FrameReader::new();

    assert!(read_all(&mut reader, ApiMode::ApiEnabled, &[&wire[..5]]).is_empty());
    assert_eq!(reader.buffered_len(), 5);

    let frames = read_all(&mut reader, ApiMode::ApiEnabled, &[&wire[5..]]);
    assert_eq!(frames.len(), 1);
    assert_eq!(reader.buffered_len(), 0);
}

#[test]
fn test_reserved_bytes_survive_escaped_roundtrip() {
    // frame id 0x7E and a parameter holding every reserved byte twice
    let request = Request::from(
        AtCommand::new("NI")
            .unwrap()
            .with_parameter(vec![0x7E, 0x7E, 0x7D, 0x7D, 0x11, 0x11, 0x13, 0x13]),
    );
    let wire = request.render(ApiMode::ApiEnabledEscaped, 0x7E).unwrap();
    assert_eq!(wire.iter().filter(|&&b| b == 0x7E).count(), 1);

    let chunks: Vec<&[u8]> = wire.chunks(3).collect();
    let mut reader = FrameReader::new();
    let frames = read_all(&mut reader, ApiMode::ApiEnabledEscaped, &chunks);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].as_ref(), request.payload(0x7E).as_slice());
}

#[test]
fn test_unescape_matches_plain_frame() {
    let payload = [0x8A, 0x11];
    let escaped = codec::encode_escaped(&payload).unwrap();
    assert_eq!(escape::unescape(&escaped).unwrap(), codec::encode(&payload).unwrap());
}

#[test]
fn test_back_to_back_frames_in_one_read() {
    let mut wire = codec::encode(&[0x8A, 0x02]).unwrap();
    wire.extend(codec::encode(&[0x88, 0x05, b'A', b'P', 0x00, 0x01]).unwrap());

    let mut reader = FrameReader::new();
    let frames = read_all(&mut reader, ApiMode::ApiEnabled, &[&wire]);
    assert_eq!(frames.len(), 2);
    assert_eq!(reader.buffered_len(), 0);

    let second = Response::decode(frames[1].clone()).unwrap().unwrap();
    assert_eq!(second.correlation_id(), Some(5));
    assert_eq!(
        second.as_at_command().unwrap().data(),
        Some(&AtData::ApiEnable(ApiMode::ApiEnabled))
    );
}

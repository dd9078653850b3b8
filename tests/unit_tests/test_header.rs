// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::BytesMut;
use irods_client_rs::models::{
    header::{MsgHeader, RODS_API_REPLY, RODS_API_REQ},
    message::{read_frame, write_frame},
};

#[test]
fn test_header_roundtrip() -> Result<()> {
    let header = MsgHeader::new(RODS_API_REQ, 120, 0, 4096, 702);
    let encoded = header.encode();
    let decoded = MsgHeader::decode(&encoded)?;
    assert_eq!(decoded, header);
    Ok(())
}

#[test]
fn test_header_decode_tolerates_server_formatting() -> Result<()> {
    let raw = "<MsgHeader_PI>\n  <type> RODS_API_REPLY </type>\n  \
               <msgLen>10</msgLen>\n  <errorLen>0</errorLen>\n  \
               <bsLen>0</bsLen>\n  <intInfo>-808000</intInfo>\n</MsgHeader_PI>\n";
    let header = MsgHeader::decode(raw.as_bytes())?;
    assert_eq!(header.msg_type, RODS_API_REPLY);
    assert_eq!(header.msg_len, 10);
    assert_eq!(header.int_info, -808_000);
    Ok(())
}

#[test]
fn test_header_decode_rejects_wrong_root() {
    let raw = "<Version_PI><status>0</status></Version_PI>";
    assert!(MsgHeader::decode(raw.as_bytes()).is_err());
}

#[tokio::test]
async fn test_frame_roundtrip() -> Result<()> {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);

    let header = MsgHeader::new(RODS_API_REPLY, 5, 3, 4, 0);
    write_frame(&mut client, &header, b"hello", b"err", b"binz").await?;

    let frame = read_frame(&mut server, None).await?;
    assert_eq!(frame.header, header);
    assert_eq!(&frame.body[..], b"hello");
    assert_eq!(&frame.error[..], b"err");
    assert_eq!(&frame.bs[..], b"binz");
    Ok(())
}

#[tokio::test]
async fn test_frame_reads_binary_into_caller_buffer() -> Result<()> {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);

    let payload = vec![0xA5u8; 1000];
    let header = MsgHeader::new(RODS_API_REPLY, 0, 0, payload.len() as u32, 42);
    write_frame(&mut client, &header, &[], &[], &payload).await?;

    let mut bin = BytesMut::zeroed(1000);
    let frame = read_frame(&mut server, Some(&mut bin)).await?;
    assert_eq!(frame.header.int_info, 42);
    assert!(frame.bs.is_empty(), "payload must land in the caller buffer");
    assert_eq!(&bin[..], payload.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_frame_grows_undersized_binary_buffer() -> Result<()> {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);

    let payload = vec![7u8; 512];
    let header = MsgHeader::new(RODS_API_REPLY, 0, 0, payload.len() as u32, 0);
    write_frame(&mut client, &header, &[], &[], &payload).await?;

    let mut bin = BytesMut::zeroed(16);
    read_frame(&mut server, Some(&mut bin)).await?;
    assert_eq!(bin.len(), 512);
    assert_eq!(&bin[..], payload.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_frame_rejects_implausible_header_length() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    use tokio::io::AsyncWriteExt;
    client
        .write_all(&u32::MAX.to_be_bytes())
        .await
        .expect("write failed");

    let err = read_frame(&mut server, None).await.expect_err("must fail");
    assert!(err.to_string().contains("implausible"));
}

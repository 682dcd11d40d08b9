use std::net::SocketAddr;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use xvcpico_firmware::loopback::LoopbackSource;
use xvcpico_protocol::{Message, XvcInfo};
use xvcpico_server::{
    pipeline::{PipelineController, PipelineMode},
    server::{Config, Server},
};
use xvcpico_tests::SimulatedProbe;
use xvcpico_wire::bytes_for_bits;

async fn start_bridge(source: LoopbackSource, mode: PipelineMode, config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let backend = PipelineController::new(SimulatedProbe::new(source), mode);
    let server = Server::new(backend, config);
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn shift(tcp: &mut TcpStream, num_bits: u32, tms: &[u8], tdi: &[u8]) -> Vec<u8> {
    let mut request = Vec::new();
    Message::Shift {
        num_bits,
        tms: tms.into(),
        tdi: tdi.into(),
    }
    .write_to(&mut request)
    .unwrap();
    tcp.write_all(&request).await.unwrap();

    let mut tdo = vec![0u8; bytes_for_bits(num_bits)];
    tcp.read_exact(&mut tdo).await.unwrap();
    tdo
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(101).wrapping_add(seed))
        .collect()
}

/// Clears the bits of the last byte that lie beyond `num_bits`.
fn masked(mut bytes: Vec<u8>, num_bits: u32) -> Vec<u8> {
    if num_bits % 8 != 0 {
        let last = bytes.len() - 1;
        bytes[last] &= (1u8 << (num_bits % 8)) - 1;
    }
    bytes
}

#[tokio::test(flavor = "multi_thread")]
async fn getinfo_reports_buffer_size() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config::default(),
    )
    .await;
    let mut tcp = TcpStream::connect(addr).await.unwrap();
    tcp.write_all(b"getinfo:").await.unwrap();

    let expected = b"xvcServer_v1.0:2048\n";
    let mut response = [0u8; 20];
    tcp.read_exact(&mut response).await.unwrap();
    assert_eq!(&response, expected);
    let info = XvcInfo::from_reader(&mut &response[..]).unwrap();
    assert_eq!(info.buffer_size(), 2048);
}

#[tokio::test(flavor = "multi_thread")]
async fn settck_is_echoed() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config::default(),
    )
    .await;
    let mut tcp = TcpStream::connect(addr).await.unwrap();
    tcp.write_all(b"settck:\x01\x00\x00\x00").await.unwrap();

    let mut response = [0u8; 4];
    tcp.read_exact(&mut response).await.unwrap();
    assert_eq!(response, [0x01, 0x00, 0x00, 0x00]);
}

#[tokio::test(flavor = "multi_thread")]
async fn shifts_loop_back_through_firmware() {
    for (source, mode) in [
        (LoopbackSource::Tdi, PipelineMode::Overlapped),
        (LoopbackSource::Tms, PipelineMode::Overlapped),
        (LoopbackSource::Tdi, PipelineMode::Sequential),
        (LoopbackSource::Tms, PipelineMode::Sequential),
    ] {
        let addr = start_bridge(source, mode, Config::default()).await;
        let mut tcp = TcpStream::connect(addr).await.unwrap();

        // All scans share one connection and one probe.
        for num_bits in [1, 7, 8, 9, 127, 128, 129, 1000] {
            let len = bytes_for_bits(num_bits);
            let tms = pattern(len, 17);
            let tdi = pattern(len, 90);
            let expected = match source {
                LoopbackSource::Tdi => masked(tdi.clone(), num_bits),
                LoopbackSource::Tms => masked(tms.clone(), num_bits),
            };
            let tdo = shift(&mut tcp, num_bits, &tms, &tdi).await;
            assert_eq!(tdo, expected, "{} bits, {:?}, {:?}", num_bits, source, mode);
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn largest_shift_fits_buffer() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config::default(),
    )
    .await;
    let mut tcp = TcpStream::connect(addr).await.unwrap();
    let tms = pattern(1024, 0);
    let tdi = pattern(1024, 1);
    assert_eq!(shift(&mut tcp, 1024 * 8, &tms, &tdi).await, tdi);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversize_shift_closes_connection() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config {
            buffer_size: 64,
            ..Config::default()
        },
    )
    .await;
    let mut tcp = TcpStream::connect(addr).await.unwrap();
    // 33 bytes per vector, 66 together.
    tcp.write_all(b"shift:\x08\x01\x00\x00").await.unwrap();

    // Either a clean close or a reset, but never an answer.
    let mut response = Vec::new();
    let _ = tcp.read_to_end(&mut response).await;
    assert!(response.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_command_closes_connection() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config::default(),
    )
    .await;
    let mut tcp = TcpStream::connect(addr).await.unwrap();
    tcp.write_all(b"debug:").await.unwrap();

    let mut response = Vec::new();
    let _ = tcp.read_to_end(&mut response).await;
    assert!(response.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_clients_share_probe() {
    let addr = start_bridge(
        LoopbackSource::Tdi,
        PipelineMode::Overlapped,
        Config::default(),
    )
    .await;

    let clients: Vec<_> = (0..4u8)
        .map(|seed| {
            tokio::spawn(async move {
                let mut tcp = TcpStream::connect(addr).await.unwrap();
                for round in 0..8u8 {
                    let tms = pattern(100, seed);
                    let tdi = pattern(100, seed.wrapping_mul(31).wrapping_add(round));
                    assert_eq!(shift(&mut tcp, 800, &tms, &tdi).await, tdi);
                }
            })
        })
        .collect();
    for client in clients {
        client.await.unwrap();
    }
}

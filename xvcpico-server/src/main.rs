//! # xvcpico
//!
//! XVC server for the xvcpico USB JTAG probe. Connect the FPGA tools with
//! `open_hw_target -xvc_url <host>:2542` and every JTAG shift is forwarded to the probe.
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use clap_num::maybe_hex;
use env_logger::Env;
use xvcpico_server::{
    pipeline::{PipelineController, PipelineMode},
    server::{Config, Server},
    transport::{RusbTransport, UsbConfig},
};

#[derive(Parser)]
#[command(about = "Xilinx Virtual Cable (XVC) server for the xvcpico USB JTAG probe", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "2542")]
    port: u16,

    #[arg(short, long, default_value = "0.0.0.0")]
    ip: IpAddr,

    #[arg(long, help = "USB vendor ID of the probe", default_value = "0x1209", value_parser = maybe_hex::<u16>)]
    vid: u16,

    #[arg(long, help = "USB product ID of the probe", default_value = "0xc0ca", value_parser = maybe_hex::<u16>)]
    pid: u16,

    #[arg(long, help = "Vendor interface number", default_value = "0")]
    interface: u8,

    #[arg(long, help = "Bulk IN endpoint carrying TDO", default_value = "0x82", value_parser = maybe_hex::<u8>)]
    read_endpoint: u8,

    #[arg(long, help = "Bulk OUT endpoint carrying commands", default_value = "0x01", value_parser = maybe_hex::<u8>)]
    write_endpoint: u8,

    #[arg(
        short,
        long,
        help = "Bytes available for the TMS and TDI vectors of one shift",
        default_value = "2048"
    )]
    buffer_size: u32,

    #[arg(short, long, help = "TCP read and write timeout in seconds", default_value = "30")]
    timeout_secs: u64,

    #[arg(long, help = "Wait for the TDO of every chunk before sending the next one")]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting xvcpico server");

    let args = Args::parse();
    log::debug!("Parsed arguments: ip={}, port={}", args.ip, args.port);

    let config = Config {
        buffer_size: args.buffer_size,
        read_write_timeout: Duration::from_secs(args.timeout_secs),
    };
    log::debug!("Server config: buffer_size={}", config.buffer_size);

    let usb = UsbConfig {
        vid: args.vid,
        pid: args.pid,
        interface: args.interface,
        read_endpoint: args.read_endpoint,
        write_endpoint: args.write_endpoint,
        ..UsbConfig::default()
    };
    let probe = match RusbTransport::open(usb) {
        Ok(probe) => probe,
        Err(e) => {
            println!("Could not open the probe: {}. Use --vid and --pid to select the device.", e);
            return Ok(());
        }
    };

    let mode = if args.sequential {
        PipelineMode::Sequential
    } else {
        PipelineMode::Overlapped
    };
    log::debug!("Pipeline mode: {:?}", mode);
    let server = Server::new(PipelineController::new(probe, mode), config);

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    tokio::select! {
        result = server.listen(addr) => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
    }
    Ok(())
}

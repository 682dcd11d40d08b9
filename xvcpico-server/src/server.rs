use std::{io, sync::Arc, time::Duration};

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::Mutex,
    time::timeout,
};
use tokio_util::codec::Decoder;

use crate::JtagBackend;
use crate::error::ServerError;
use xvcpico_protocol::error::ReadError;
use xvcpico_protocol::framed::MessageDecoder;
use xvcpico_protocol::{DEFAULT_BUFFER_SIZE, Message, Version, XvcInfo};

#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes available for the TMS and TDI vectors of one shift, announced by `getinfo:`.
    pub buffer_size: u32,
    pub read_write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_write_timeout: Duration::from_secs(30),
        }
    }
}

/// XVC server forwarding commands of all connected clients to one backend.
pub struct Server<B: JtagBackend> {
    backend: Arc<Mutex<B>>,
    config: Config,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use xvcpico_server::server::Builder;
/// use std::time::Duration;
///
/// let server = Builder::new()
///     .buffer_size(4096)
///     .rw_timeout(Duration::from_secs(20))
///     .build(backend);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the size of the shift buffer announced to clients.
    pub fn buffer_size(mut self, size: u32) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the TCP read and write timeout
    pub fn rw_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_write_timeout = timeout;
        self
    }

    /// Build and return the server
    pub fn build<B: JtagBackend + Send + 'static>(self, backend: B) -> Server<B> {
        Server::new(backend, self.config)
    }
}

impl<B: JtagBackend + Send + 'static> Server<B> {
    pub fn new(backend: B, config: Config) -> Server<B> {
        Server {
            backend: Arc::new(Mutex::new(backend)),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn listen(&self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accepts clients on `listener` until accepting fails fatally. Each client is served by its
    /// own task.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        log::info!("Server listening on {}", listener.local_addr()?);
        loop {
            let (tcp, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::error!("Connection error: {}", e);
                    continue;
                }
            };
            log::info!("New client connection from {}", peer);

            let backend = Arc::clone(&self.backend);
            let config = self.config.clone();
            tokio::spawn(async move {
                match handle_client(tcp, backend, &config).await {
                    Ok(()) => log::info!("Client {} disconnected", peer),
                    Err(e) if e.is_disconnect() => {
                        log::info!("Client {} went away: {}", peer, e)
                    }
                    Err(e) => log::error!("Closing connection to {}: {}", peer, e),
                }
            });
        }
    }
}

async fn handle_client<B: JtagBackend + Send + 'static>(
    mut tcp: TcpStream,
    backend: Arc<Mutex<B>>,
    config: &Config,
) -> Result<(), ServerError> {
    tcp.set_nodelay(true)?;
    let mut decoder = MessageDecoder::new(config.buffer_size as usize);
    let mut buf = BytesMut::with_capacity(config.buffer_size as usize + 16);

    loop {
        let message = match decoder.decode(&mut buf)? {
            Some(message) => message,
            None => {
                let read = timeout(config.read_write_timeout, tcp.read_buf(&mut buf))
                    .await
                    .map_err(|_| ServerError::Timeout)?
                    .map_err(ReadError::from)?;
                if read == 0 {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    // Closed in the middle of a command.
                    let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
                    return Err(ReadError::from(eof).into());
                }
                continue;
            }
        };

        let response = process_message(message, &backend, config).await?;
        timeout(config.read_write_timeout, tcp.write_all(&response))
            .await
            .map_err(|_| ServerError::Timeout)??;
    }
}

/// Executes one command and returns the bytes to answer with.
async fn process_message<B: JtagBackend + Send + 'static>(
    message: Message,
    backend: &Arc<Mutex<B>>,
    config: &Config,
) -> Result<Vec<u8>, ServerError> {
    match message {
        Message::GetInfo => {
            log::info!("Received GetInfo message");
            let mut response = Vec::new();
            XvcInfo::new(Version::V1_0, config.buffer_size).write_to(&mut response)?;
            Ok(response)
        }
        Message::SetTck { period_ns } => {
            log::debug!("Received SetTck message: period_ns={}", period_ns);
            let ret_period = backend.lock().await.set_tck(period_ns);
            log::debug!("Set TCK returned: period_ns={}", ret_period);
            Ok(ret_period.to_le_bytes().to_vec())
        }
        Message::Shift { num_bits, tms, tdi } => {
            log::debug!(
                "Received Shift message: num_bits={}, tms_len={}, tdi_len={}",
                num_bits,
                tms.len(),
                tdi.len()
            );
            log::trace!("Shift TMS data: {:02x?}", &tms[..]);
            log::trace!("Shift TDI data: {:02x?}", &tdi[..]);
            let mut guard = Arc::clone(backend).lock_owned().await;
            let tdo = tokio::task::spawn_blocking(move || guard.shift(num_bits, &tms, &tdi))
                .await
                .map_err(io::Error::other)??;
            log::trace!("Shift result TDO data: {:02x?}", &tdo[..]);
            Ok(tdo.into_vec())
        }
    }
}

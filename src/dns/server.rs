//! UDP listener for the DNS front-end.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::QueryHandler;

/// Largest datagram accepted, matching the advertised EDNS payload size.
const MAX_DATAGRAM: usize = 4096;

/// Binds `addr` and serves queries until the task is dropped.
pub async fn start_dns_server(addr: SocketAddr, handler: Arc<QueryHandler>) -> io::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!(bind_address = %socket.local_addr()?, protocol = "UDP", "DNS server listening");
    info!("Accepting DNS queries for {}", handler.domain().required_suffix());
    serve_udp(socket, handler).await
}

/// Receives datagrams on `socket` and answers each one from its own task.
///
/// UDP is request/response: no state is kept between datagrams and a reply
/// is only sent for messages that carry a question.
pub async fn serve_udp(socket: UdpSocket, handler: Arc<QueryHandler>) -> io::Result<()> {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                warn!(error = %err, "Failed to receive DNS datagram");
                continue;
            }
        };

        let datagram = buf[..len].to_vec();
        let socket = Arc::clone(&socket);
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let Some(reply) = handler.handle_datagram(&datagram).await else {
                debug!(%peer, "No reply for datagram");
                return;
            };
            if let Err(err) = socket.send_to(&reply, peer).await {
                warn!(%peer, error = %err, "Failed to send DNS response");
            }
        });
    }
}

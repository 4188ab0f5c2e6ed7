//! Per-neighbor BGP session engine
//!
//! Each neighbor gets one task owning the socket outright. Everything
//! before the OPEN exchange collapses into the reconnect loop in [`run`];
//! after that the engine is a two-state machine driven by inbound frames,
//! the keepalive/hold clocks, and the announcement pacing.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::config::PeerConfig;
use burstbgp::capability::CapabilitiesBuilder;
use burstbgp::path::{AsSegmentType, Origin};
use burstbgp::route::Route;
use burstbgp::{
    Codec, Error as PacketError, Message, Notification, NotificationErrorCode, Open, UpdateBuilder,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{tcp, TcpSocket, TcpStream};
use tokio::time::{interval_at, sleep_until, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Hold time proposed in our OPEN, seconds
pub const DEFAULT_HOLD_TIME: u16 = 180;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("hold timer expired")]
    HoldTimerExpired,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    OpenSent,
    Established,
}

/// Drive one neighbor forever: connect, speak, and on any failure start
/// over with fresh session state. Only the configuration survives a reset.
pub async fn run(config: PeerConfig) {
    loop {
        let stream = match connect(&config).await {
            Ok(stream) => stream,
            Err(e) => {
                log::debug!("[{}] connect failed: {e}, retrying", config.neighbor);
                continue;
            }
        };
        log::info!("[{}] connected", config.neighbor);
        let mut session = Session::new(&config, stream);
        if let Err(e) = session.drive().await {
            log::warn!("[{}] session reset: {e}", config.neighbor);
        }
    }
}

async fn connect(config: &PeerConfig) -> std::io::Result<TcpStream> {
    let socket = TcpSocket::new_v4()?;
    socket.bind(SocketAddr::from((config.local_address, 0)))?;
    socket
        .connect(SocketAddr::from((config.neighbor, config.neighbor_port)))
        .await
}

struct Session<'a> {
    config: &'a PeerConfig,
    state: State,
    rx: FramedRead<tcp::OwnedReadHalf, Codec>,
    tx: FramedWrite<tcp::OwnedWriteHalf, Codec>,
    /// Seconds; ours until the peer's OPEN overwrites it
    hold_time: u16,
    /// Number of updates already sent in this run
    prefix_cursor: u32,
}

impl<'a> Session<'a> {
    fn new(config: &'a PeerConfig, socket: TcpStream) -> Self {
        let (rx, tx) = socket.into_split();
        let codec = Codec;
        Self {
            config,
            state: State::OpenSent,
            rx: FramedRead::new(rx, codec),
            tx: FramedWrite::new(tx, codec),
            hold_time: DEFAULT_HOLD_TIME,
            prefix_cursor: 0,
        }
    }

    async fn drive(&mut self) -> Result<(), Error> {
        self.send_open().await?;
        self.open_sent().await?;
        self.established().await
    }

    async fn send_open(&mut self) -> Result<(), Error> {
        let capabilities = CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .four_octet_as_number(self.config.local_as)
            .build();
        let open = Open::new(
            self.config.local_as,
            DEFAULT_HOLD_TIME,
            self.config.router_id,
            capabilities,
        );
        self.tx.send(Message::Open(open)).await?;
        log::info!(
            "[{}] sent OPEN (ASN {}, hold time {DEFAULT_HOLD_TIME})",
            self.config.neighbor,
            self.config.local_as
        );
        Ok(())
    }

    /// Read the next inbound message, answering framing errors with the
    /// NOTIFICATION they map to. Only unrecoverable errors surface.
    async fn next_message(&mut self) -> Result<Message, Error> {
        loop {
            match self.rx.next().await {
                None => return Err(Error::Closed),
                Some(Ok(msg)) => return Ok(msg),
                Some(Err(e)) => self.answer_framing_error(e).await?,
            }
        }
    }

    async fn answer_framing_error(&mut self, e: PacketError) -> Result<(), Error> {
        match e.notification() {
            Some(notification) => {
                log::warn!("[{}] framing error: {e}", self.config.neighbor);
                self.tx.send(Message::Notification(notification)).await?;
                Ok(())
            }
            None => Err(e.into()),
        }
    }

    async fn open_sent(&mut self) -> Result<(), Error> {
        loop {
            match self.next_message().await? {
                Message::Open(open) => {
                    log::info!(
                        "[{}] received OPEN (ASN {}, BGP ID {}, hold time {})",
                        self.config.neighbor,
                        open.asn,
                        open.bgp_id,
                        open.hold_time
                    );
                    self.hold_time = open.hold_time;
                    self.state = State::Established;
                    // RFC 4271: a KEEPALIVE acknowledges the OPEN before
                    // anything else goes out
                    self.tx.send(Message::Keepalive).await?;
                    return Ok(());
                }
                msg => {
                    log::debug!(
                        "[{}] ignoring {} while waiting for OPEN",
                        self.config.neighbor,
                        kind(&msg)
                    );
                }
            }
        }
    }

    async fn established(&mut self) -> Result<(), Error> {
        debug_assert_eq!(self.state, State::Established);
        // A zero hold time turns off both clocks
        let timers_enabled = self.hold_time != 0;
        let keepalive_period = Duration::from_secs(u64::from(self.hold_time / 3).max(1));
        let hold_period = Duration::from_secs(u64::from(self.hold_time));
        // The handshake KEEPALIVE just went out, so the first timed one is
        // a full period away
        let mut keepalive = interval_at(Instant::now() + keepalive_period, keepalive_period);
        let mut hold_deadline = Instant::now() + hold_period;
        loop {
            tokio::select! {
                biased;
                msg = self.rx.next() => {
                    hold_deadline = Instant::now() + hold_period;
                    match msg {
                        None => return Err(Error::Closed),
                        Some(Ok(msg)) => self.handle_message(&msg),
                        Some(Err(e)) => self.answer_framing_error(e).await?,
                    }
                }
                _ = keepalive.tick(), if timers_enabled => {
                    log::trace!("[{}] sending KEEPALIVE", self.config.neighbor);
                    self.tx.send(Message::Keepalive).await?;
                }
                () = sleep_until(hold_deadline), if timers_enabled => {
                    log::warn!(
                        "[{}] hold timer expired after {} s of silence",
                        self.config.neighbor,
                        self.hold_time
                    );
                    let notification = Notification::new(
                        NotificationErrorCode::HoldTimerExpired,
                        0,
                        Bytes::new(),
                    );
                    let _ = self.tx.send(Message::Notification(notification)).await;
                    return Err(Error::HoldTimerExpired);
                }
                // Announcements run whenever nothing else is ready, one per
                // loop turn, so inbound frames and the clocks stay fair
                () = std::future::ready(()), if self.prefix_cursor < self.config.prefix_amount => {
                    self.send_route().await?;
                }
            }
        }
    }

    fn handle_message(&self, msg: &Message) {
        match msg {
            Message::Keepalive => {
                log::trace!("[{}] received KEEPALIVE", self.config.neighbor);
            }
            Message::Update(update) => {
                log::debug!(
                    "[{}] received UPDATE ({} octets), not processed",
                    self.config.neighbor,
                    update.0.len()
                );
            }
            Message::Notification(notification) => {
                log::warn!(
                    "[{}] peer sent NOTIFICATION {notification}, data: {:?}",
                    self.config.neighbor,
                    notification.data
                );
            }
            Message::Open(_) => {
                log::debug!("[{}] ignoring OPEN in Established", self.config.neighbor);
            }
        }
    }

    async fn send_route(&mut self) -> Result<(), Error> {
        let prefix = Ipv4Addr::from(
            u32::from(self.config.prefix_start).wrapping_add(self.prefix_cursor),
        );
        let update = UpdateBuilder::new()
            .set_origin(Origin::Igp)
            .set_as_path(AsSegmentType::AsSequence, vec![self.config.local_as])
            .set_next_hop(self.config.local_address)
            .add_route(Route::host(prefix))
            .build();
        self.tx.send(Message::Update(update)).await?;
        self.prefix_cursor += 1;
        log::trace!(
            "[{}] announced {prefix}/32 ({}/{})",
            self.config.neighbor,
            self.prefix_cursor,
            self.config.prefix_amount
        );
        if self.prefix_cursor == self.config.prefix_amount {
            log::info!(
                "[{}] finished announcing {} prefixes",
                self.config.neighbor,
                self.config.prefix_amount
            );
        }
        Ok(())
    }
}

fn kind(msg: &Message) -> &'static str {
    match msg {
        Message::Open(_) => "OPEN",
        Message::Update(_) => "UPDATE",
        Message::Notification(_) => "NOTIFICATION",
        Message::Keepalive => "KEEPALIVE",
    }
}

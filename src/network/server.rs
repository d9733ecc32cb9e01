//! TCP accept loop and the per-connection task.
//!
//! Each accepted socket gets one task that owns the framed stream. The task
//! is the only writer of the session's codec state, reads frames strictly
//! in order, and is the place where every connection ends: on clean EOF,
//! on any protocol error, on timeout or on an external close. Whatever the
//! cause, teardown goes through `ConnectionRegistry::remove`.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::core::codec::FrameCodec;
use crate::core::packet::RawPacket;
use crate::error::{constants, ProtocolError, Result};
use crate::network::session::{ClientSession, SessionCommand};
use crate::protocol::dispatcher::{dispatch, Directive, HandlerContext, ServerContext};
use crate::protocol::packets::ClientboundPacket;
use crate::protocol::Stage;

/// Reason given to every client when the server stops.
pub const SHUTDOWN_REASON: &str = "Server closed";

type Connection<S> = Framed<S, FrameCodec>;

/// Bind the configured address.
pub async fn bind(ctx: &ServerContext) -> Result<TcpListener> {
    let listener = TcpListener::bind(&ctx.config.server.address).await?;
    info!(address = %ctx.config.server.address, "Listening");
    Ok(listener)
}

/// Run until CTRL+C.
pub async fn start_server(ctx: Arc<ServerContext>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let listener = bind(&ctx).await?;
    serve(listener, ctx, shutdown_rx).await
}

/// Accept connections on `listener` until `shutdown_rx` fires, then
/// disconnect every session and wait for their tasks to finish.
#[instrument(skip_all)]
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Disconnecting sessions...");
                let removed = ctx.registry.shutdown(SHUTDOWN_REASON);
                info!(sessions = removed, "Disconnect notices sent");
                wait_for_drain(&ctx).await;
                ctx.metrics.log_metrics();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        if ctx.registry.len() >= ctx.config.server.max_connections {
                            warn!(addr = %addr, "Connection limit reached, refusing");
                            continue;
                        }
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, addr, ctx).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

async fn wait_for_drain(ctx: &ServerContext) {
    let timeout = sleep(ctx.config.server.shutdown_timeout);
    tokio::pin!(timeout);

    loop {
        let active = ctx.metrics.connections_active.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutting down");
            return;
        }
        tokio::select! {
            _ = &mut timeout => {
                warn!(connections = active, "Shutdown timeout reached, forcing exit");
                return;
            }
            _ = sleep(Duration::from_millis(50)) => {}
        }
    }
}

/// Drive one client connection to completion.
///
/// Generic over the byte stream so tests can use in-memory pipes.
pub async fn serve_connection<S>(stream: S, address: SocketAddr, ctx: Arc<ServerContext>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let session = ctx.registry.register(address);
    // Another live task already owns this address; leave its session alone
    let Some(commands) = session.take_commands() else {
        warn!(addr = %address, "Address already has a live session, refusing");
        return;
    };
    ctx.metrics.connection_established();
    debug!(addr = %address, "Connection accepted");

    let result = run_session(stream, commands, &session, &ctx).await;
    match &result {
        Ok(()) => debug!(addr = %address, "Connection finished"),
        Err(ProtocolError::Io(e)) => debug!(addr = %address, error = %e, "Connection dropped"),
        Err(e) => {
            ctx.metrics.protocol_error();
            if session.stage() == Stage::Login {
                ctx.metrics.login_failed();
            }
            warn!(addr = %address, stage = ?session.stage(), error = %e, "Closing connection");
        }
    }

    ctx.registry.remove(address);
    ctx.metrics.connection_closed();
}

async fn run_session<S>(
    stream: S,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    session: &Arc<ClientSession>,
    ctx: &ServerContext,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let transport = &ctx.config.transport;
    let codec = FrameCodec::with_limits(transport.max_frame_length, transport.max_uncompressed_length);
    let mut framed = Framed::new(stream, codec);

    let result = drive(&mut framed, &mut commands, session, ctx).await;
    let notice = match &result {
        Err(e) => farewell(e),
        Ok(()) => None,
    }
    .or_else(|| queued_disconnect(&mut commands));
    if let Some(reason) = notice {
        // Best effort; the connection is going away regardless
        let _ = send_disconnect(&mut framed, session, ctx, &reason).await;
    }
    result
}

/// A disconnect another task asked for that the loop never reached, e.g.
/// shutdown arriving while the login was waiting on the session authority.
fn queued_disconnect(commands: &mut mpsc::UnboundedReceiver<SessionCommand>) -> Option<String> {
    while let Ok(command) = commands.try_recv() {
        if let SessionCommand::Disconnect(reason) = command {
            return Some(reason);
        }
    }
    None
}

/// Disconnect reason to show the client, if the error warrants one.
fn farewell(error: &ProtocolError) -> Option<String> {
    match error {
        e if e.is_client_visible() => Some(e.disconnect_reason()),
        ProtocolError::Timeout(reason) => Some(reason.clone()),
        _ => None,
    }
}

async fn drive<S>(
    framed: &mut Connection<S>,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    session: &Arc<ClientSession>,
    ctx: &ServerContext,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server = &ctx.config.server;
    let login_deadline = sleep(server.login_timeout);
    tokio::pin!(login_deadline);

    let mut keepalive = interval_at(
        Instant::now() + server.keepalive_interval,
        server.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let in_play = session.stage() == Stage::Play;

        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(SessionCommand::Send(packet)) => {
                    write_packet(framed, session, ctx, &packet).await?;
                }
                Some(SessionCommand::Disconnect(reason)) => {
                    send_disconnect(framed, session, ctx, &reason).await?;
                    return Ok(());
                }
                None => return Ok(()),
            },

            _ = session.closed() => return Ok(()),

            _ = &mut login_deadline, if !in_play => {
                return Err(ProtocolError::Timeout(constants::ERR_LOGIN_TIMEOUT.into()));
            }

            _ = keepalive.tick(), if in_play => {
                if session.last_keepalive().elapsed() >= server.keepalive_timeout {
                    return Err(ProtocolError::Timeout(constants::ERR_KEEPALIVE_TIMEOUT.into()));
                }
                let id = rand::random::<i32>() & i32::MAX;
                write_packet(framed, session, ctx, &ClientboundPacket::KeepAlive { id }).await?;
            }

            frame = framed.next() => {
                let raw = match frame {
                    Some(raw) => raw?,
                    None => return Ok(()),
                };
                ctx.metrics.packet_received(raw.payload_len() as u64);

                let packet = ctx.packets.decode(session.stage(), raw)?;
                let mut handler = HandlerContext::new(session, ctx);
                let outcome = dispatch(&mut handler, packet).await;

                // Directives queued before a failure still apply, so the cipher
                // state matches the client's when the disconnect goes out
                let close = apply_directives(framed, session, ctx, handler.take_directives()).await?;
                outcome?;
                if close {
                    return Ok(());
                }
            }
        }
    }
}

/// Apply handler output in order. Returns whether the connection should close.
async fn apply_directives<S>(
    framed: &mut Connection<S>,
    session: &ClientSession,
    ctx: &ServerContext,
    directives: Vec<Directive>,
) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut close = false;
    for directive in directives {
        match directive {
            Directive::Send(raw) => {
                record_sent(framed.codec(), ctx, &raw);
                // Encoding happens here, so later toggles never touch this frame
                framed.feed(raw).await?;
            }
            Directive::EnableEncryption => {
                let secret = session
                    .shared_secret()
                    .ok_or_else(|| ProtocolError::violation(constants::ERR_SECRET_NOT_SET))?;
                framed.codec_mut().enable_encryption(secret)?;
                debug!(addr = %session.address(), "Stream cipher enabled");
            }
            Directive::EnableCompression(threshold) => {
                let level = ctx.config.transport.compression_level;
                framed
                    .codec_mut()
                    .enable_compression_with_level(threshold, level)?;
                debug!(addr = %session.address(), threshold, "Compression enabled");
            }
            Directive::Close => close = true,
        }
    }
    framed.flush().await?;
    Ok(close)
}

async fn write_packet<S>(
    framed: &mut Connection<S>,
    session: &ClientSession,
    ctx: &ServerContext,
    packet: &ClientboundPacket,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = ctx.packets.encode(session.stage(), packet)?;
    record_sent(framed.codec(), ctx, &raw);
    framed.send(raw).await
}

fn record_sent(codec: &FrameCodec, ctx: &ServerContext, raw: &RawPacket) {
    let len = raw.payload_len();
    ctx.metrics.packet_sent(len as u64);
    if codec.compression_threshold().is_some_and(|t| len >= t) {
        ctx.metrics.frame_compressed();
    }
}

/// Send the stage's disconnect packet. Stages without one just close.
async fn send_disconnect<S>(
    framed: &mut Connection<S>,
    session: &ClientSession,
    ctx: &ServerContext,
    reason: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let packet = match session.stage() {
        Stage::Login => ClientboundPacket::login_disconnect(reason),
        Stage::Play => ClientboundPacket::play_disconnect(reason),
        Stage::Handshake | Stage::Status => return Ok(()),
    };
    debug!(addr = %session.address(), reason, "Sending disconnect");
    write_packet(framed, session, ctx, &packet).await
}

// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded mio event loop (C7): accept, read, dispatch, write.
//!
//! The reference design runs exactly one worker owning every connection
//! end-to-end, so no storage locking is needed — everything is
//! serialized by this one `Poll`. The listener and every accepted
//! stream share the same `Poll`; there is no separate acceptor thread
//! handing sockets across a ring buffer, since spec.md treats the raw
//! acceptor as out of scope and a single combined loop is the simplest
//! faithful implementation of "exclusive ownership after handoff."

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use log::{debug, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};

use crate::command::Processor;
use crate::config::CacheConfig;
use crate::server::connection::Connection;

const LISTENER_TOKEN: Token = Token(0);
const CONNECTION_TOKEN_START: usize = 1;

pub struct Worker {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    processor: Processor,
    config: CacheConfig,
}

impl Worker {
    pub fn bind(config: CacheConfig) -> io::Result<Self> {
        let listener = bind_listener(config.listen_addr, config.listen_backlog)?;
        let mut listener = mio::net::TcpListener::from_std(listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let processor = Processor::new(&config);

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: CONNECTION_TOKEN_START,
            processor,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the event loop until an unrecoverable error occurs. Never
    /// returns on a healthy server; used by the binary's `main`.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(self.config.max_events_per_tick);
        loop {
            self.run_once(&mut events)?;
        }
    }

    /// Run a single poll-and-dispatch tick. Split out from [`run`] so
    /// tests can drive the loop deterministically.
    fn run_once(&mut self, events: &mut Events) -> io::Result<()> {
        match self.poll.poll(events, Some(self.config.tick_interval)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        self.processor.clock.tick();

        let mut to_close = Vec::new();
        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => self.accept_all(),
                token => {
                    let keep_open = self.service_connection(token, event);
                    if !keep_open {
                        to_close.push(token);
                    }
                }
            }
        }

        for token in to_close {
            self.close_connection(token);
        }

        Ok(())
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!("failed to register connection from {remote_addr}: {e}");
                        continue;
                    }

                    debug!("accepted connection {token:?} from {remote_addr}");
                    self.connections.insert(token, Connection::new(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("accept error: {e}");
                    break;
                }
            }
        }
    }

    /// Service I/O readiness for one connection. Returns `false` if the
    /// connection should be torn down.
    fn service_connection(&mut self, token: Token, event: &mio::event::Event) -> bool {
        let Some(conn) = self.connections.get_mut(&token) else {
            return true;
        };

        if event.is_readable() {
            match conn.handle_readable(&mut self.processor) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    debug!("read error on {token:?}: {e}");
                    return false;
                }
            }
        }

        if event.is_writable() || conn.has_pending_write() {
            match conn.handle_writable() {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    debug!("write error on {token:?}: {e}");
                    return false;
                }
            }
        }

        // QUIT only half-closes: keep pumping output until the queued
        // response (if any) has actually been flushed to the peer.
        if conn.is_closing() && !conn.has_pending_write() {
            return false;
        }

        true
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            debug!("closed connection {token:?}");
        }
    }
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(true)?;
    info!("listening on {addr}");
    Ok(socket.into())
}

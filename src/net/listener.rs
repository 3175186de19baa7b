//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind every configured port before any serving starts
//! - Report the actually bound address (port 0 resolves here)
//!
//! # Design Decisions
//! - `SO_REUSEADDR` is set so a stopped container's ports can be rebound
//!   immediately
//! - Binding is all or nothing; a failure drops the sockets bound so far

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::config::ListenerConfig;
use crate::error::WebError;

const BACKLOG: u32 = 1024;

/// Bind one socket.
pub fn bind(addr: SocketAddr) -> Result<TcpListener, WebError> {
    let bind_err = |source| WebError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(BACKLOG).map_err(bind_err)?;

    tracing::debug!(
        address = %listener.local_addr().map_err(bind_err)?,
        "Listener bound"
    );

    Ok(listener)
}

/// Bind every port of `config`. Must run inside a Tokio runtime.
pub fn bind_all(config: &ListenerConfig) -> Result<Vec<TcpListener>, WebError> {
    let addrs = config.socket_addrs().map_err(|_| WebError::InvalidAddress(config.address.clone()))?;
    addrs.into_iter().map(bind).collect()
}

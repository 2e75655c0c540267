use std::{
    fs,
    io::{self, ErrorKind, Read, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
};

use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::config::ListenMode;

pub const TCP_BACKLOG: i32 = 3;
pub const UNIX_BACKLOG: i32 = 5;

/// One accepted (or dialled) stream, TCP or Unix.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Connection {
    pub fn connect(endpoint: &ListenMode) -> io::Result<Self> {
        match endpoint {
            ListenMode::Tcp(addr) => TcpStream::connect(addr).map(Connection::Tcp),
            ListenMode::Unix(path) => UnixStream::connect(path).map(Connection::Unix),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// A bound, listening socket. A Unix socket file is removed on drop.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        path: PathBuf,
    },
}

impl Listener {
    pub fn bind(mode: &ListenMode) -> io::Result<Self> {
        match mode {
            ListenMode::Tcp(addr) => bind_tcp(*addr).map(Listener::Tcp),
            ListenMode::Unix(path) => {
                let listener = bind_unix(path)?;
                Ok(Listener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
        }
    }

    pub fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept()?;
                debug!("accepted connection from {peer}");
                Ok(Connection::Tcp(stream))
            }
            Listener::Unix { listener, .. } => {
                let (stream, _) = listener.accept()?;
                debug!("accepted unix connection");
                Ok(Connection::Unix(stream))
            }
        }
    }

    /// The endpoint actually bound, with an ephemeral TCP port resolved.
    pub fn local_endpoint(&self) -> io::Result<ListenMode> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().map(ListenMode::Tcp),
            Listener::Unix { path, .. } => Ok(ListenMode::Unix(path.clone())),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            if let Err(e) = fs::remove_file(&*path) {
                debug!("could not remove socket file {}: {e}", path.display());
            }
        }
    }
}

/// Address a local client can dial to reach `endpoint`.
pub fn loopback_for(endpoint: &ListenMode) -> ListenMode {
    match endpoint {
        ListenMode::Tcp(addr) if addr.ip().is_unspecified() => {
            let ip = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            ListenMode::Tcp(SocketAddr::new(ip, addr.port()))
        }
        other => other.clone(),
    }
}

fn bind_tcp(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(TCP_BACKLOG)?;
    Ok(socket.into())
}

fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed stale socket {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.bind(&SockAddr::unix(path)?)?;
    socket.listen(UNIX_BACKLOG)?;
    Ok(socket.into())
}

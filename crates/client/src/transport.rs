//! Socket transport for talking to clamd.
//!
//! Resolves an [`Address`] to a connected stream with send/recv timeouts
//! applied. Unix-domain sockets go through `interprocess` local sockets, TCP
//! through `std::net`.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use interprocess::local_socket::{prelude::*, GenericFilePath};

use clammer_core::{Address, ClamError};

/// A connected stream to the daemon.
///
/// Reads and writes block, bounded by the timeout given at connect time; a
/// lapsed read deadline surfaces as `WouldBlock`/`TimedOut`. Dropping the
/// stream closes the socket.
#[derive(Debug)]
pub struct Stream {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Local(interprocess::local_socket::Stream),
    Tcp(TcpStream),
}

impl Stream {
    /// Connect to the daemon with a timeout applied to the connection attempt
    /// (TCP) and to every subsequent send and receive.
    ///
    /// # Errors
    ///
    /// Returns [`ClamError::Connect`] if the connection cannot be established.
    pub fn connect(address: &Address, timeout: Duration) -> Result<Self, ClamError> {
        let inner = match address {
            Address::Unix(path) => {
                let name = path
                    .clone()
                    .to_fs_name::<GenericFilePath>()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
                    .map_err(|e| connect_error(address, e))?;
                let stream = interprocess::local_socket::Stream::connect(name)
                    .map_err(|e| connect_error(address, e))?;
                let _ = stream.set_recv_timeout(Some(timeout));
                let _ = stream.set_send_timeout(Some(timeout));
                Inner::Local(stream)
            }
            Address::Tcp(hostport) => {
                let stream = connect_tcp(hostport, timeout).map_err(|e| connect_error(address, e))?;
                let _ = stream.set_read_timeout(Some(timeout));
                let _ = stream.set_write_timeout(Some(timeout));
                Inner::Tcp(stream)
            }
        };
        Ok(Self { inner })
    }
}

fn connect_tcp(hostport: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in hostport.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
    }))
}

fn connect_error(address: &Address, source: io::Error) -> ClamError {
    ClamError::Connect {
        location: address.to_string(),
        source,
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Local(s) => s.read(buf),
            Inner::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Local(s) => s.write(buf),
            Inner::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Local(s) => s.flush(),
            Inner::Tcp(s) => s.flush(),
        }
    }
}

use super::{Command, DataReader, DataWriter, Error, EventSet, IdSizes, Packet};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Sent by the debugger and echoed back by the target before any packet
pub const HANDSHAKE: &[u8] = b"JDWP-Handshake";

/// Open debugger connection to a target VM
///
/// Commands are strictly sequential: [`Connection::request`] blocks until the matching reply
/// arrives. Events that show up in the meantime are queued for [`Connection::next_event`].
pub struct Connection<S> {
    stream: S,
    next_id: u32,
    sizes: IdSizes,
    events: VecDeque<EventSet>,
}

impl Connection<TcpStream> {
    /// Connect to a VM listening with `-agentlib:jdwp=transport=dt_socket,server=y`
    ///
    /// The timeout applies to every read, so a target that stops answering surfaces as an I/O
    /// error instead of hanging forever.
    pub fn connect<A: ToSocketAddrs>(
        address: A,
        timeout: Option<Duration>,
    ) -> Result<Connection<TcpStream>, Error> {
        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(timeout)?;
        stream.set_nodelay(true)?;
        Connection::open(stream)
    }
}

impl<S: Read + Write> Connection<S> {
    /// Perform the handshake on an established stream and query identifier sizes
    pub fn open(mut stream: S) -> Result<Connection<S>, Error> {
        stream.write_all(HANDSHAKE)?;
        stream.flush()?;
        let mut answer = [0; HANDSHAKE.len()];
        stream.read_exact(&mut answer)?;
        if &answer[..] != HANDSHAKE {
            return Err(Error::Handshake(answer.to_vec()));
        }

        let mut connection = Connection {
            stream,
            next_id: 1,
            sizes: IdSizes::default(),
            events: VecDeque::new(),
        };
        let reply = connection.request(Command::VM_ID_SIZES, |_| Ok(()))?;
        connection.sizes = IdSizes::parse(&mut connection.reader(&reply))?;
        debug!("connected, identifier sizes {:?}", connection.sizes);
        Ok(connection)
    }

    pub fn sizes(&self) -> IdSizes {
        self.sizes
    }

    pub fn writer(&self) -> DataWriter {
        DataWriter::new(self.sizes)
    }

    pub fn reader<'a>(&self, data: &'a [u8]) -> DataReader<'a> {
        DataReader::new(data, self.sizes)
    }

    /// Send a command and wait for its reply data
    pub fn request<F>(&mut self, command: Command, build: F) -> Result<Vec<u8>, Error>
    where
        F: FnOnce(&mut DataWriter) -> io::Result<()>,
    {
        let mut writer = self.writer();
        build(&mut writer)?;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        trace!("sending {} (id {})", command, id);
        Packet::Command {
            id,
            command,
            data: writer.into_bytes(),
        }
        .write_to(&mut self.stream)?;

        loop {
            match Packet::read_from(&mut self.stream)? {
                Packet::Reply {
                    id: reply_id,
                    error_code,
                    data,
                } if reply_id == id => {
                    if error_code != 0 {
                        debug!("{} (id {}) failed with error {}", command, id, error_code);
                        return Err(Error::Reply {
                            command,
                            code: error_code,
                        });
                    }
                    return Ok(data);
                }
                Packet::Reply { id: other, .. } => {
                    warn!("dropping reply to unknown command id {}", other)
                }
                Packet::Command { command, data, .. } => self.receive_command(command, &data)?,
            }
        }
    }

    fn receive_command(&mut self, command: Command, data: &[u8]) -> Result<(), Error> {
        if command == Command::EVENT_COMPOSITE {
            let events = EventSet::parse(&mut self.reader(data))?;
            trace!("queueing {} event(s)", events.events.len());
            self.events.push_back(events);
        } else {
            warn!("ignoring {} sent by the target", command);
        }
        Ok(())
    }

    /// Next event set, blocking until the target sends one
    pub fn next_event(&mut self) -> Result<EventSet, Error> {
        loop {
            if let Some(events) = self.events.pop_front() {
                return Ok(events);
            }
            match Packet::read_from(&mut self.stream)? {
                Packet::Command { command, data, .. } => self.receive_command(command, &data)?,
                Packet::Reply { id, .. } => warn!("dropping reply to unknown command id {}", id),
            }
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

use super::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

/// Size of the header shared by command and reply packets
pub const HEADER_LEN: usize = 11;

/// Largest packet accepted from the other side
pub const MAX_PACKET_LEN: usize = 64 * 1024 * 1024;

/// Bit set in the flags of reply packets
pub const REPLY_FLAG: u8 = 0x80;

/// Command set and command number
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Command {
    pub set: u8,
    pub command: u8,
}

impl Command {
    pub const fn new(set: u8, command: u8) -> Command {
        Command { set, command }
    }

    pub const VM_VERSION: Command = Command::new(1, 1);
    pub const VM_CLASSES_BY_SIGNATURE: Command = Command::new(1, 2);
    pub const VM_ALL_THREADS: Command = Command::new(1, 4);
    pub const VM_ID_SIZES: Command = Command::new(1, 7);
    pub const VM_RESUME: Command = Command::new(1, 9);
    pub const VM_CREATE_STRING: Command = Command::new(1, 11);

    pub const REFERENCE_TYPE_SIGNATURE: Command = Command::new(2, 1);
    pub const REFERENCE_TYPE_CLASS_LOADER: Command = Command::new(2, 2);
    pub const REFERENCE_TYPE_METHODS: Command = Command::new(2, 5);

    pub const CLASS_TYPE_SUPERCLASS: Command = Command::new(3, 1);
    pub const CLASS_TYPE_INVOKE_METHOD: Command = Command::new(3, 3);
    pub const CLASS_TYPE_NEW_INSTANCE: Command = Command::new(3, 4);

    pub const ARRAY_TYPE_NEW_INSTANCE: Command = Command::new(4, 1);

    pub const OBJECT_REFERENCE_TYPE: Command = Command::new(9, 1);
    pub const OBJECT_INVOKE_METHOD: Command = Command::new(9, 6);
    pub const OBJECT_DISABLE_COLLECTION: Command = Command::new(9, 7);
    pub const OBJECT_ENABLE_COLLECTION: Command = Command::new(9, 8);

    pub const STRING_VALUE: Command = Command::new(10, 1);

    pub const THREAD_NAME: Command = Command::new(11, 1);
    pub const THREAD_RESUME: Command = Command::new(11, 3);

    pub const ARRAY_SET_VALUES: Command = Command::new(13, 3);

    pub const CLASS_LOADER_VISIBLE_CLASSES: Command = Command::new(14, 1);

    pub const EVENT_REQUEST_SET: Command = Command::new(15, 1);
    pub const EVENT_REQUEST_CLEAR: Command = Command::new(15, 2);

    pub const CLASS_OBJECT_REFLECTED_TYPE: Command = Command::new(17, 1);

    pub const EVENT_COMPOSITE: Command = Command::new(64, 100);

    pub fn name(&self) -> Option<&'static str> {
        Some(match (self.set, self.command) {
            (1, 1) => "VirtualMachine.Version",
            (1, 2) => "VirtualMachine.ClassesBySignature",
            (1, 4) => "VirtualMachine.AllThreads",
            (1, 7) => "VirtualMachine.IDSizes",
            (1, 9) => "VirtualMachine.Resume",
            (1, 11) => "VirtualMachine.CreateString",
            (2, 1) => "ReferenceType.Signature",
            (2, 2) => "ReferenceType.ClassLoader",
            (2, 5) => "ReferenceType.Methods",
            (3, 1) => "ClassType.Superclass",
            (3, 3) => "ClassType.InvokeMethod",
            (3, 4) => "ClassType.NewInstance",
            (4, 1) => "ArrayType.NewInstance",
            (9, 1) => "ObjectReference.ReferenceType",
            (9, 6) => "ObjectReference.InvokeMethod",
            (9, 7) => "ObjectReference.DisableCollection",
            (9, 8) => "ObjectReference.EnableCollection",
            (10, 1) => "StringReference.Value",
            (11, 1) => "ThreadReference.Name",
            (11, 3) => "ThreadReference.Resume",
            (13, 3) => "ArrayReference.SetValues",
            (14, 1) => "ClassLoaderReference.VisibleClasses",
            (15, 1) => "EventRequest.Set",
            (15, 2) => "EventRequest.Clear",
            (17, 1) => "ClassObjectReference.ReflectedType",
            (64, 100) => "Event.Composite",
            _ => return None,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "command ({}, {})", self.set, self.command),
        }
    }
}

/// A JDWP packet, going either way
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Command {
        id: u32,
        command: Command,
        data: Vec<u8>,
    },
    Reply {
        id: u32,
        error_code: u16,
        data: Vec<u8>,
    },
}

impl Packet {
    pub fn id(&self) -> u32 {
        match self {
            Packet::Command { id, .. } | Packet::Reply { id, .. } => *id,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let data = match self {
            Packet::Command { data, .. } | Packet::Reply { data, .. } => data,
        };
        let length = u32::try_from(HEADER_LEN + data.len())
            .map_err(|_| Error::Malformed(format!("packet of {} bytes is too large", data.len())))?;

        let mut packet = Vec::with_capacity(HEADER_LEN + data.len());
        packet.write_u32::<BigEndian>(length)?;
        packet.write_u32::<BigEndian>(self.id())?;
        match self {
            Packet::Command { command, .. } => {
                packet.write_u8(0)?;
                packet.write_u8(command.set)?;
                packet.write_u8(command.command)?;
            }
            Packet::Reply { error_code, .. } => {
                packet.write_u8(REPLY_FLAG)?;
                packet.write_u16::<BigEndian>(*error_code)?;
            }
        }
        packet.extend_from_slice(data);

        writer.write_all(&packet)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Packet, Error> {
        let length = reader.read_u32::<BigEndian>()? as usize;
        if length < HEADER_LEN {
            return Err(Error::Malformed(format!("packet length {} is shorter than its header", length)));
        }
        if length > MAX_PACKET_LEN {
            return Err(Error::Malformed(format!("packet length {} is too large", length)));
        }
        let id = reader.read_u32::<BigEndian>()?;
        let flags = reader.read_u8()?;
        let header = if flags & REPLY_FLAG != 0 {
            Err(reader.read_u16::<BigEndian>()?)
        } else {
            Ok(Command::new(reader.read_u8()?, reader.read_u8()?))
        };
        let data_len = length - HEADER_LEN;
        let mut data = vec![];
        reader.by_ref().take(data_len as u64).read_to_end(&mut data)?;
        if data.len() < data_len {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("packet ended after {} of {} data bytes", data.len(), data_len),
            )));
        }

        Ok(match header {
            Ok(command) => Packet::Command { id, command, data },
            Err(error_code) => Packet::Reply {
                id,
                error_code,
                data,
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_header() {
        let mut bytes = vec![];
        Packet::Command {
            id: 3,
            command: Command::VM_CREATE_STRING,
            data: vec![0xaa, 0xbb],
        }
        .write_to(&mut bytes)
        .unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 13, 0, 0, 0, 3, 0, 1, 11, 0xaa, 0xbb]);
    }

    #[test]
    fn reply_round_trip() {
        let reply = Packet::Reply {
            id: 7,
            error_code: 13,
            data: vec![1, 2, 3],
        };
        let mut bytes = vec![];
        reply.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[8..11], &[0x80, 0, 13]);
        assert_eq!(Packet::read_from(&mut bytes.as_slice()).unwrap(), reply);
    }

    #[test]
    fn short_packets_are_rejected() {
        let bytes = [0u8, 0, 0, 5, 0, 0, 0, 1, 0, 1, 1];
        assert!(matches!(
            Packet::read_from(&mut bytes.as_slice()),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            Packet::read_from(&mut [0u8, 0, 0, 20, 0, 0].as_slice()),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn oversized_packets_are_rejected() {
        // Nothing past the length is needed to reject the packet
        let bytes = [0xffu8, 0xff, 0xff, 0xff];
        assert!(matches!(
            Packet::read_from(&mut bytes.as_slice()),
            Err(Error::Malformed(message)) if message.contains("too large")
        ));

        // Claims a megabyte of data but carries two bytes
        let mut bytes = vec![0, 0x10, 0, 0, 0, 0, 0, 1, 0x80, 0, 0];
        bytes.extend_from_slice(&[1, 2]);
        assert!(matches!(
            Packet::read_from(&mut bytes.as_slice()),
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::VM_ID_SIZES.to_string(), "VirtualMachine.IDSizes");
        assert_eq!(Command::new(99, 1).to_string(), "command (99, 1)");
    }
}

use super::{DataReader, DataWriter, Error, MethodId, ReferenceTypeId, ThreadId};
use std::io;

pub mod event_kind {
    pub const SINGLE_STEP: u8 = 1;
    pub const BREAKPOINT: u8 = 2;
    pub const THREAD_START: u8 = 6;
    pub const THREAD_DEATH: u8 = 7;
    pub const CLASS_PREPARE: u8 = 8;
    pub const METHOD_ENTRY: u8 = 40;
    pub const METHOD_EXIT: u8 = 41;
    pub const VM_START: u8 = 90;
    pub const VM_DEATH: u8 = 99;
}

/// Which threads the target suspended when an event fired
pub mod suspend_policy {
    pub const NONE: u8 = 0;
    pub const EVENT_THREAD: u8 = 1;
    pub const ALL: u8 = 2;
}

/// Executable position in the target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub type_tag: u8,
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

impl Location {
    pub fn read(reader: &mut DataReader<'_>) -> Result<Location, Error> {
        Ok(Location {
            type_tag: reader.read_u8()?,
            class_id: reader.read_reference_type_id()?,
            method_id: reader.read_method_id()?,
            index: reader.read_i64()? as u64,
        })
    }

    pub fn write(&self, writer: &mut DataWriter) -> io::Result<()> {
        writer.write_u8(self.type_tag)?;
        writer.write_reference_type_id(self.class_id)?;
        writer.write_method_id(self.method_id)?;
        writer.write_i64(self.index as i64)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    VmStart {
        request_id: i32,
        thread: ThreadId,
    },
    VmDeath {
        request_id: i32,
    },
    ThreadStart {
        request_id: i32,
        thread: ThreadId,
    },
    ThreadDeath {
        request_id: i32,
        thread: ThreadId,
    },
    ClassPrepare {
        request_id: i32,
        thread: ThreadId,
        type_tag: u8,
        class_id: ReferenceTypeId,
        signature: String,
        status: i32,
    },

    /// Breakpoints, single steps, method entries and exits all land the thread at a location
    Located {
        kind: u8,
        request_id: i32,
        thread: ThreadId,
        location: Location,
    },
}

impl Event {
    pub fn kind(&self) -> u8 {
        match self {
            Event::VmStart { .. } => event_kind::VM_START,
            Event::VmDeath { .. } => event_kind::VM_DEATH,
            Event::ThreadStart { .. } => event_kind::THREAD_START,
            Event::ThreadDeath { .. } => event_kind::THREAD_DEATH,
            Event::ClassPrepare { .. } => event_kind::CLASS_PREPARE,
            Event::Located { kind, .. } => *kind,
        }
    }

    pub fn request_id(&self) -> i32 {
        match self {
            Event::VmStart { request_id, .. }
            | Event::VmDeath { request_id }
            | Event::ThreadStart { request_id, .. }
            | Event::ThreadDeath { request_id, .. }
            | Event::ClassPrepare { request_id, .. }
            | Event::Located { request_id, .. } => *request_id,
        }
    }

    /// Thread the event happened on, if any
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            Event::VmDeath { .. } => None,
            Event::VmStart { thread, .. }
            | Event::ThreadStart { thread, .. }
            | Event::ThreadDeath { thread, .. }
            | Event::ClassPrepare { thread, .. }
            | Event::Located { thread, .. } => Some(*thread),
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Event::Located { location, .. } => Some(*location),
            _ => None,
        }
    }

    fn read(reader: &mut DataReader<'_>) -> Result<Event, Error> {
        let kind = reader.read_u8()?;
        let request_id = reader.read_i32()?;
        Ok(match kind {
            event_kind::VM_DEATH => Event::VmDeath { request_id },
            event_kind::VM_START => Event::VmStart {
                request_id,
                thread: reader.read_object_id()?,
            },
            event_kind::THREAD_START => Event::ThreadStart {
                request_id,
                thread: reader.read_object_id()?,
            },
            event_kind::THREAD_DEATH => Event::ThreadDeath {
                request_id,
                thread: reader.read_object_id()?,
            },
            event_kind::CLASS_PREPARE => Event::ClassPrepare {
                request_id,
                thread: reader.read_object_id()?,
                type_tag: reader.read_u8()?,
                class_id: reader.read_reference_type_id()?,
                signature: reader.read_string()?,
                status: reader.read_i32()?,
            },
            event_kind::SINGLE_STEP
            | event_kind::BREAKPOINT
            | event_kind::METHOD_ENTRY
            | event_kind::METHOD_EXIT => Event::Located {
                kind,
                request_id,
                thread: reader.read_object_id()?,
                location: Location::read(reader)?,
            },
            other => return Err(Error::Malformed(format!("unsupported event kind {}", other))),
        })
    }
}

/// Events delivered together in one `Event.Composite` command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

impl EventSet {
    pub fn parse(reader: &mut DataReader<'_>) -> Result<EventSet, Error> {
        let suspend_policy = reader.read_u8()?;
        let count = reader.read_len()?;
        let mut events = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            events.push(Event::read(reader)?);
        }
        Ok(EventSet {
            suspend_policy,
            events,
        })
    }
}

/// Restriction on which events a request reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventModifier {
    /// Report only the n-th occurrence, then cancel the request
    Count(i32),

    /// Only classes matching the pattern (which may start or end with `*`)
    ClassMatch(String),

    LocationOnly(Location),
}

impl EventModifier {
    fn write(&self, writer: &mut DataWriter) -> io::Result<()> {
        match self {
            EventModifier::Count(count) => {
                writer.write_u8(1)?;
                writer.write_i32(*count)
            }
            EventModifier::ClassMatch(pattern) => {
                writer.write_u8(5)?;
                writer.write_string(pattern)
            }
            EventModifier::LocationOnly(location) => {
                writer.write_u8(7)?;
                location.write(writer)
            }
        }
    }
}

/// Arguments of `EventRequest.Set`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRequest {
    pub event_kind: u8,
    pub suspend_policy: u8,
    pub modifiers: Vec<EventModifier>,
}

impl EventRequest {
    pub fn write(&self, writer: &mut DataWriter) -> io::Result<()> {
        writer.write_u8(self.event_kind)?;
        writer.write_u8(self.suspend_policy)?;
        writer.write_len(self.modifiers.len())?;
        for modifier in &self.modifiers {
            modifier.write(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jdwp::IdSizes;

    #[test]
    fn method_entry_set() {
        let sizes = IdSizes::default();
        let mut writer = DataWriter::new(sizes);
        writer.write_u8(suspend_policy::EVENT_THREAD).unwrap();
        writer.write_i32(2).unwrap();
        writer.write_u8(event_kind::METHOD_ENTRY).unwrap();
        writer.write_i32(4).unwrap();
        writer.write_object_id(0x51).unwrap();
        let location = Location {
            type_tag: 1,
            class_id: 0x60,
            method_id: 0x61,
            index: 0,
        };
        location.write(&mut writer).unwrap();
        writer.write_u8(event_kind::VM_DEATH).unwrap();
        writer.write_i32(0).unwrap();
        let bytes = writer.into_bytes();

        let set = EventSet::parse(&mut DataReader::new(&bytes, sizes)).unwrap();
        assert_eq!(set.suspend_policy, suspend_policy::EVENT_THREAD);
        assert_eq!(set.events.len(), 2);
        assert_eq!(set.events[0].kind(), event_kind::METHOD_ENTRY);
        assert_eq!(set.events[0].request_id(), 4);
        assert_eq!(set.events[0].thread(), Some(0x51));
        assert_eq!(set.events[0].location(), Some(location));
        assert_eq!(set.events[1], Event::VmDeath { request_id: 0 });
    }

    #[test]
    fn request_encoding() {
        let request = EventRequest {
            event_kind: event_kind::BREAKPOINT,
            suspend_policy: suspend_policy::ALL,
            modifiers: vec![EventModifier::Count(1), EventModifier::ClassMatch(String::from("a.*"))],
        };
        let mut writer = DataWriter::new(IdSizes::default());
        request.write(&mut writer).unwrap();
        assert_eq!(
            writer.into_bytes(),
            vec![2, 2, 0, 0, 0, 2, 1, 0, 0, 0, 1, 5, 0, 0, 0, 3, b'a', b'.', b'*']
        );
    }
}

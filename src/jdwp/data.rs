use super::Error;
use crate::jvm::class_file::{decode_modified_utf8, encode_modified_utf8};
use crate::remote::{ObjectKind, ObjectRef, PrimitiveValue, RemoteValue};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io;

pub type ObjectId = u64;
pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type ThreadId = u64;

/// Sizes (in bytes) of the variably sized identifiers, as reported by `VirtualMachine.IDSizes`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSizes {
    pub field_id: usize,
    pub method_id: usize,
    pub object_id: usize,
    pub reference_type_id: usize,
    pub frame_id: usize,
}

impl Default for IdSizes {
    fn default() -> Self {
        IdSizes {
            field_id: 8,
            method_id: 8,
            object_id: 8,
            reference_type_id: 8,
            frame_id: 8,
        }
    }
}

impl IdSizes {
    pub fn parse(reader: &mut DataReader<'_>) -> Result<IdSizes, Error> {
        let mut size = || -> Result<usize, Error> {
            let size = reader.read_i32()?;
            if (1..=8).contains(&size) {
                Ok(size as usize)
            } else {
                Err(Error::Malformed(format!("unsupported identifier size {}", size)))
            }
        };
        Ok(IdSizes {
            field_id: size()?,
            method_id: size()?,
            object_id: size()?,
            reference_type_id: size()?,
            frame_id: size()?,
        })
    }
}

/// Tags preceding values (and some object ids) in packets
pub mod tag {
    pub const ARRAY: u8 = b'[';
    pub const BYTE: u8 = b'B';
    pub const CHAR: u8 = b'C';
    pub const OBJECT: u8 = b'L';
    pub const FLOAT: u8 = b'F';
    pub const DOUBLE: u8 = b'D';
    pub const INT: u8 = b'I';
    pub const LONG: u8 = b'J';
    pub const SHORT: u8 = b'S';
    pub const VOID: u8 = b'V';
    pub const BOOLEAN: u8 = b'Z';
    pub const STRING: u8 = b's';
    pub const THREAD: u8 = b't';
    pub const THREAD_GROUP: u8 = b'g';
    pub const CLASS_LOADER: u8 = b'l';
    pub const CLASS_OBJECT: u8 = b'c';
}

/// Tags for kinds of reference types
pub mod type_tag {
    pub const CLASS: u8 = 1;
    pub const INTERFACE: u8 = 2;
    pub const ARRAY: u8 = 3;
}

pub fn object_kind(value_tag: u8) -> Option<ObjectKind> {
    Some(match value_tag {
        tag::OBJECT => ObjectKind::Object,
        tag::STRING => ObjectKind::String,
        tag::THREAD => ObjectKind::Thread,
        tag::THREAD_GROUP => ObjectKind::ThreadGroup,
        tag::CLASS_LOADER => ObjectKind::ClassLoader,
        tag::CLASS_OBJECT => ObjectKind::ClassObject,
        tag::ARRAY => ObjectKind::Array,
        _ => return None,
    })
}

pub fn object_tag(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Object => tag::OBJECT,
        ObjectKind::String => tag::STRING,
        ObjectKind::Thread => tag::THREAD,
        ObjectKind::ThreadGroup => tag::THREAD_GROUP,
        ObjectKind::ClassLoader => tag::CLASS_LOADER,
        ObjectKind::ClassObject => tag::CLASS_OBJECT,
        ObjectKind::Array => tag::ARRAY,
    }
}

fn primitive_tag(value: &PrimitiveValue) -> u8 {
    match value {
        PrimitiveValue::Boolean(_) => tag::BOOLEAN,
        PrimitiveValue::Byte(_) => tag::BYTE,
        PrimitiveValue::Char(_) => tag::CHAR,
        PrimitiveValue::Short(_) => tag::SHORT,
        PrimitiveValue::Int(_) => tag::INT,
        PrimitiveValue::Long(_) => tag::LONG,
        PrimitiveValue::Float(_) => tag::FLOAT,
        PrimitiveValue::Double(_) => tag::DOUBLE,
    }
}

/// Builds the data part of a command packet
pub struct DataWriter {
    bytes: Vec<u8>,
    sizes: IdSizes,
}

impl DataWriter {
    pub fn new(sizes: IdSizes) -> DataWriter {
        DataWriter {
            bytes: vec![],
            sizes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.bytes.write_u8(value)
    }

    pub fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.bytes.write_i32::<BigEndian>(value)
    }

    pub fn write_i64(&mut self, value: i64) -> io::Result<()> {
        self.bytes.write_i64::<BigEndian>(value)
    }

    /// Length as a JDWP `int`
    pub fn write_len(&mut self, len: usize) -> io::Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "length does not fit in an int")
        })?;
        self.write_i32(len)
    }

    pub fn write_string(&mut self, value: &str) -> io::Result<()> {
        let encoded = encode_modified_utf8(value);
        self.write_len(encoded.len())?;
        self.bytes.extend_from_slice(&encoded);
        Ok(())
    }

    fn write_id(&mut self, id: u64, size: usize) -> io::Result<()> {
        self.bytes.write_uint::<BigEndian>(id, size)
    }

    pub fn write_object_id(&mut self, id: ObjectId) -> io::Result<()> {
        self.write_id(id, self.sizes.object_id)
    }

    pub fn write_reference_type_id(&mut self, id: ReferenceTypeId) -> io::Result<()> {
        self.write_id(id, self.sizes.reference_type_id)
    }

    pub fn write_method_id(&mut self, id: MethodId) -> io::Result<()> {
        self.write_id(id, self.sizes.method_id)
    }

    fn write_primitive(&mut self, value: &PrimitiveValue) -> io::Result<()> {
        match value {
            PrimitiveValue::Boolean(value) => self.bytes.write_u8(u8::from(*value)),
            PrimitiveValue::Byte(value) => self.bytes.write_i8(*value),
            PrimitiveValue::Char(value) => self.bytes.write_u16::<BigEndian>(*value),
            PrimitiveValue::Short(value) => self.bytes.write_i16::<BigEndian>(*value),
            PrimitiveValue::Int(value) => self.bytes.write_i32::<BigEndian>(*value),
            PrimitiveValue::Long(value) => self.bytes.write_i64::<BigEndian>(*value),
            PrimitiveValue::Float(value) => self.bytes.write_f32::<BigEndian>(*value),
            PrimitiveValue::Double(value) => self.bytes.write_f64::<BigEndian>(*value),
        }
    }

    /// Value preceded by its tag (used for method arguments)
    pub fn write_tagged_value(&mut self, value: &RemoteValue) -> io::Result<()> {
        match value {
            RemoteValue::Void => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "void is not a value",
            )),
            RemoteValue::Null => {
                self.write_u8(tag::OBJECT)?;
                self.write_object_id(0)
            }
            RemoteValue::Primitive(primitive) => {
                self.write_u8(primitive_tag(primitive))?;
                self.write_primitive(primitive)
            }
            RemoteValue::Object(object) => {
                self.write_u8(object_tag(object.kind))?;
                self.write_object_id(object.id)
            }
        }
    }

    /// Value without its tag (used for array elements, whose type is known)
    pub fn write_untagged_value(&mut self, value: &RemoteValue) -> io::Result<()> {
        match value {
            RemoteValue::Void => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "void is not a value",
            )),
            RemoteValue::Null => self.write_object_id(0),
            RemoteValue::Primitive(primitive) => self.write_primitive(primitive),
            RemoteValue::Object(object) => self.write_object_id(object.id),
        }
    }
}

/// Decodes the data part of a reply or event packet
pub struct DataReader<'a> {
    data: &'a [u8],
    sizes: IdSizes,
}

fn truncated(_: io::Error) -> Error {
    Error::Malformed(String::from("packet data ended unexpectedly"))
}

impl<'a> DataReader<'a> {
    pub fn new(data: &'a [u8], sizes: IdSizes) -> DataReader<'a> {
        DataReader { data, sizes }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.data.read_u8().map_err(truncated)
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.data.read_i32::<BigEndian>().map_err(truncated)
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        self.data.read_i64::<BigEndian>().map_err(truncated)
    }

    /// Non-negative `int` used as a count
    pub fn read_len(&mut self) -> Result<usize, Error> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| Error::Malformed(format!("negative length {}", len)))
    }

    pub fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_len()?;
        if len > self.data.len() {
            return Err(Error::Malformed(String::from("string runs past the end of the packet")));
        }
        let (bytes, rest) = self.data.split_at(len);
        self.data = rest;
        decode_modified_utf8(bytes)
            .or_else(|_| String::from_utf8(bytes.to_vec()).map_err(|err| err.to_string()))
            .map_err(Error::Malformed)
    }

    fn read_id(&mut self, size: usize) -> Result<u64, Error> {
        self.data.read_uint::<BigEndian>(size).map_err(truncated)
    }

    pub fn read_object_id(&mut self) -> Result<ObjectId, Error> {
        self.read_id(self.sizes.object_id)
    }

    pub fn read_reference_type_id(&mut self) -> Result<ReferenceTypeId, Error> {
        self.read_id(self.sizes.reference_type_id)
    }

    pub fn read_method_id(&mut self) -> Result<MethodId, Error> {
        self.read_id(self.sizes.method_id)
    }

    /// Tag followed by an object id, `None` for `null`
    pub fn read_tagged_object(&mut self) -> Result<Option<ObjectRef>, Error> {
        let value_tag = self.read_u8()?;
        let kind = object_kind(value_tag)
            .ok_or_else(|| Error::Malformed(format!("tag {:?} is not an object tag", value_tag as char)))?;
        let id = self.read_object_id()?;
        Ok(if id == 0 {
            None
        } else {
            Some(ObjectRef::new(id, kind))
        })
    }

    pub fn read_tagged_value(&mut self) -> Result<RemoteValue, Error> {
        let value_tag = self.read_u8()?;
        let primitive = match value_tag {
            tag::VOID => return Ok(RemoteValue::Void),
            tag::BOOLEAN => PrimitiveValue::Boolean(self.read_bool()?),
            tag::BYTE => PrimitiveValue::Byte(self.data.read_i8().map_err(truncated)?),
            tag::CHAR => PrimitiveValue::Char(self.data.read_u16::<BigEndian>().map_err(truncated)?),
            tag::SHORT => PrimitiveValue::Short(self.data.read_i16::<BigEndian>().map_err(truncated)?),
            tag::INT => PrimitiveValue::Int(self.read_i32()?),
            tag::LONG => PrimitiveValue::Long(self.read_i64()?),
            tag::FLOAT => PrimitiveValue::Float(self.data.read_f32::<BigEndian>().map_err(truncated)?),
            tag::DOUBLE => PrimitiveValue::Double(self.data.read_f64::<BigEndian>().map_err(truncated)?),
            other => {
                let kind = object_kind(other)
                    .ok_or_else(|| Error::Malformed(format!("unknown value tag {:?}", other as char)))?;
                let id = self.read_object_id()?;
                return Ok(if id == 0 {
                    RemoteValue::Null
                } else {
                    RemoteValue::Object(ObjectRef::new(id, kind))
                });
            }
        };
        Ok(RemoteValue::Primitive(primitive))
    }
}

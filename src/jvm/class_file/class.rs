use super::{
    Attribute, ClassConstantIndex, ClassReader, Constant, ConstantIndex, Deserialize, Serialize,
    Utf8ConstantIndex, Version,
};
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, MethodAccessFlags, Name,
};
use crate::util::{Offset, OffsetVec};
use byteorder::WriteBytesExt;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

/// Byte offsets of interesting points in a parsed class file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Offset of `constant_pool_count`
    pub constant_pool_count: usize,

    /// Offset of the first byte after the constant pool (ie. of `access_flags`)
    pub constants_end: usize,
}

impl Layout {
    /// Offset of the `super_class` index
    pub fn super_class(&self) -> usize {
        self.constants_end + 4
    }
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a complete class file
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        ClassFile::parse_with_layout(bytes).map(|(class, _)| class)
    }

    /// Parse a complete class file, also reporting where its sections start
    ///
    /// Access flags are read leniently (unknown bits are dropped) since a parsed class is used for
    /// inspection, not written back out.
    pub fn parse_with_layout(bytes: &[u8]) -> Result<(ClassFile, Layout), Error> {
        let mut reader = ClassReader::new(bytes);
        if reader.read_bytes(4)? != ClassFile::MAGIC {
            return Err(Error::Malformed {
                offset: 0,
                message: String::from("missing 0xCAFEBABE magic header"),
            });
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        let version = Version {
            major_version,
            minor_version,
        };

        let constant_pool_count = reader.position();
        let constants = OffsetVec::<Constant>::deserialize(&mut reader)?;
        let constants_end = reader.position();

        let access_flags = ClassAccessFlags::deserialize(&mut reader)?;
        let this_class = ClassConstantIndex::deserialize(&mut reader)?;
        let super_class = ClassConstantIndex::deserialize(&mut reader)?;
        let interfaces = Vec::<ClassConstantIndex>::deserialize(&mut reader)?;
        let fields = Vec::<Field>::deserialize(&mut reader)?;
        let methods = Vec::<Method>::deserialize(&mut reader)?;
        let attributes = Vec::<Attribute>::deserialize(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(reader.malformed("trailing bytes after class file"));
        }

        let class = ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        class.class_name(this_class).ok_or_else(|| Error::Malformed {
            offset: constants_end + 2,
            message: String::from("this_class is not a class constant"),
        })?;
        Ok((
            class,
            Layout {
                constant_pool_count,
                constants_end,
            },
        ))
    }

    /// Look up any constant
    pub fn constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get_offset(Offset(index.0 as usize))
    }

    /// Look up a `Utf8` constant
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Option<&str> {
        match self.constant(index.0) {
            Some(Constant::Utf8(utf8)) => Some(utf8),
            _ => None,
        }
    }

    /// Look up the name of a `Class` constant
    pub fn class_name(&self, index: ClassConstantIndex) -> Option<&str> {
        match self.constant(index.0) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => None,
        }
    }

    /// Binary name of the class defined in this file
    pub fn this_class_name(&self) -> Option<BinaryName> {
        self.class_name(self.this_class)
            .map(|name| BinaryName::from_string(name.to_owned()))
            .and_then(Result::ok)
    }

    /// Binary name of the super class (`None` only for `java/lang/Object`)
    pub fn super_class_name(&self) -> Option<BinaryName> {
        if self.super_class.0 == ConstantIndex::ZERO {
            return None;
        }
        self.class_name(self.super_class)
            .map(|name| BinaryName::from_string(name.to_owned()))
            .and_then(Result::ok)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Find a method by name and descriptor
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods.iter().find(|method| {
            self.utf8(method.name_index) == Some(name)
                && self.utf8(method.descriptor_index) == Some(descriptor)
        })
    }

    /// Find an attribute by name
    pub fn find_attribute<'a>(&self, attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
        attributes
            .iter()
            .find(|attribute| self.utf8(attribute.name_index) == Some(name))
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.5
#[derive(Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Field {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        Ok(Field {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::<Attribute>::deserialize(reader)?,
        })
    }
}

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6
#[derive(Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::<Attribute>::deserialize(reader)?,
        })
    }
}

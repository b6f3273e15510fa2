use crate::jvm::class_file::{Attribute, AttributeLike, ClassReader, Deserialize, Serialize};
use crate::jvm::{Error, MethodDescriptor, RenderDescriptor};
use crate::jvm::{BinaryName, Name};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::convert::identity;
use std::hash::Hash;

/// Class file constants pool builder
///
/// The pool is append only and only after the pool is fully built up, it can be consumed into a
/// regular [`OffsetVec`]. Lookups are keyed by the rendered names and descriptors, so asking for
/// the same class or method twice returns the same index.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    classes: HashMap<String, ClassConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            classes: HashMap::new(),
            methodrefs: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            longs: HashMap::new(),
            name_and_types: HashMap::new(),
            utf8s: HashMap::new(),
        }
    }

    /// Resume appending to the constants of an existing class file
    ///
    /// Only `Utf8` and `Class` entries are indexed for reuse: that is all the rewriting of
    /// existing classes needs, and it leaves every pre-existing index untouched.
    pub fn from_existing(constants: &OffsetVec<Constant>) -> ConstantsPool {
        let mut pool = ConstantsPool::new();
        for (_, constant) in constants.iter() {
            pool.constants.push(constant.clone());
        }
        for (offset, constant) in constants.iter() {
            let index = ConstantIndex(offset.0 as u16);
            if let Constant::Utf8(utf8) = constant {
                pool.utf8s.entry(utf8.clone()).or_insert(Utf8ConstantIndex(index));
            }
        }
        for (offset, constant) in constants.iter() {
            let index = ConstantIndex(offset.0 as u16);
            if let Constant::Class(Utf8ConstantIndex(name_index)) = constant {
                let name = match constants.get_offset(Offset(name_index.0 as usize)) {
                    Some(Constant::Utf8(name)) => name.clone(),
                    _ => continue,
                };
                pool.classes.entry(name).or_insert(ClassConstantIndex(index));
            }
        }
        pool
    }

    /// Number of slots used so far (this is the `constant_pool_count` of the class file)
    pub fn slot_count(&self) -> u16 {
        self.constants.offset_len().0 as u16
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Constants appended at or after the given index
    pub fn constants_from(&self, start: u16) -> impl Iterator<Item = &Constant> + '_ {
        self.constants
            .iter()
            .filter(move |(offset, _)| offset.0 >= start as usize)
            .map(|(_, constant)| constant)
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(push_constant(&mut self.constants, constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a `CONSTANT_Class_info` for a class name in internal form (or an array
    /// descriptor)
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.classes.get(name) {
            return Ok(*idx);
        }
        let name_utf8 = self.get_utf8(name)?;
        interned(
            &mut self.constants,
            &mut self.classes,
            name.to_owned(),
            Constant::Class(name_utf8),
            ClassConstantIndex,
        )
    }

    /// Get or insert a `CONSTANT_String_info` (an `ldc`-able `java.lang.String`)
    pub fn get_string(&mut self, string: &str) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(string)?;
        interned(
            &mut self.constants,
            &mut self.strings,
            utf8,
            Constant::String(utf8),
            StringConstantIndex,
        )
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        interned(
            &mut self.constants,
            &mut self.integers,
            integer,
            Constant::Integer(integer),
            identity,
        )
    }

    /// Get or insert a long constant (this uses up two slots)
    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        interned(
            &mut self.constants,
            &mut self.longs,
            long,
            Constant::Long(long),
            identity,
        )
    }

    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        interned(
            &mut self.constants,
            &mut self.name_and_types,
            (name, descriptor),
            Constant::NameAndType { name, descriptor },
            NameAndTypeConstantIndex,
        )
    }

    /// Get or insert a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        class: &BinaryName,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(class.as_str())?;
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor.render())?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        interned(
            &mut self.constants,
            &mut self.methodrefs,
            (class, name_and_type, is_interface),
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            },
            MethodRefConstantIndex,
        )
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let info = attribute.to_bytes().map_err(Error::IoError)?;
        Ok(Attribute { name_index, info })
    }
}

/// Append a constant, unless it would not fit below index 65535 (8-byte constants take two
/// slots)
fn push_constant(
    constants: &mut OffsetVec<Constant>,
    constant: Constant,
) -> Result<ConstantIndex, ConstantPoolOverflow> {
    let offset = constants.offset_len().0 as u16;
    if offset.checked_add(constant.width() as u16).is_none() {
        return Err(ConstantPoolOverflow { constant, offset });
    }
    constants.push(constant);
    Ok(ConstantIndex(offset))
}

/// Index of the entry for `key`, appending `constant` if there is none yet
fn interned<K: Eq + Hash, I: Copy>(
    constants: &mut OffsetVec<Constant>,
    entries: &mut HashMap<K, I>,
    key: K,
    constant: Constant,
    wrap: fn(ConstantIndex) -> I,
) -> Result<I, ConstantPoolOverflow> {
    if let Some(idx) = entries.get(&key) {
        return Ok(*idx);
    }
    let idx = wrap(push_constant(constants, constant)?);
    entries.insert(key, idx);
    Ok(idx)
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle { handle_kind: u8, member: ConstantIndex },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

/// `tag` bytes of the `cp_info` structures
mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => tag::UTF8,
            Constant::Integer(_) => tag::INTEGER,
            Constant::Float(_) => tag::FLOAT,
            Constant::Long(_) => tag::LONG,
            Constant::Double(_) => tag::DOUBLE,
            Constant::Class(_) => tag::CLASS,
            Constant::String(_) => tag::STRING,
            Constant::FieldRef(..) => tag::FIELDREF,
            Constant::MethodRef { is_interface: false, .. } => tag::METHODREF,
            Constant::MethodRef { is_interface: true, .. } => tag::INTERFACE_METHODREF,
            Constant::NameAndType { .. } => tag::NAME_AND_TYPE,
            Constant::MethodHandle { .. } => tag::METHOD_HANDLE,
            Constant::MethodType { .. } => tag::METHOD_TYPE,
            Constant::Dynamic { .. } => tag::DYNAMIC,
            Constant::InvokeDynamic { .. } => tag::INVOKE_DYNAMIC,
            Constant::Module(_) => tag::MODULE,
            Constant::Package(_) => tag::PACKAGE,
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8(string) => {
                let encoded = encode_modified_utf8(string);
                (encoded.len() as u16).serialize(writer)?;
                writer.write_all(&encoded)
            }
            Constant::Integer(value) => value.serialize(writer),
            Constant::Float(value) => value.serialize(writer),
            Constant::Long(value) => value.serialize(writer),
            Constant::Double(value) => value.serialize(writer),
            Constant::Class(utf8)
            | Constant::String(utf8)
            | Constant::MethodType { descriptor: utf8 }
            | Constant::Module(utf8)
            | Constant::Package(utf8) => utf8.serialize(writer),
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                class.serialize(writer)?;
                name_and_type.serialize(writer)
            }
            Constant::NameAndType { name, descriptor } => {
                name.serialize(writer)?;
                descriptor.serialize(writer)
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                handle_kind.serialize(writer)?;
                member.serialize(writer)
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor: name_and_type,
            } => {
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)
            }
        }
    }
}

impl Deserialize for Constant {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        fn utf8(reader: &mut ClassReader<'_>) -> Result<Utf8ConstantIndex, Error> {
            reader.read_u16().map(|idx| Utf8ConstantIndex(ConstantIndex(idx)))
        }
        fn class(reader: &mut ClassReader<'_>) -> Result<ClassConstantIndex, Error> {
            reader.read_u16().map(|idx| ClassConstantIndex(ConstantIndex(idx)))
        }
        fn name_and_type(reader: &mut ClassReader<'_>) -> Result<NameAndTypeConstantIndex, Error> {
            reader.read_u16().map(|idx| NameAndTypeConstantIndex(ConstantIndex(idx)))
        }

        let tag_offset = reader.position();
        let constant = match reader.read_u8()? {
            tag::UTF8 => {
                let len = reader.read_u16()? as usize;
                let bytes = reader.read_bytes(len)?;
                let string = decode_modified_utf8(bytes).map_err(|message| Error::Malformed {
                    offset: tag_offset,
                    message,
                })?;
                Constant::Utf8(string)
            }
            tag::INTEGER => Constant::Integer(reader.read_i32()?),
            tag::FLOAT => Constant::Float(reader.read_f32()?),
            tag::LONG => Constant::Long(reader.read_i64()?),
            tag::DOUBLE => Constant::Double(reader.read_f64()?),
            tag::CLASS => Constant::Class(utf8(reader)?),
            tag::STRING => Constant::String(utf8(reader)?),
            tag::FIELDREF => Constant::FieldRef(class(reader)?, name_and_type(reader)?),
            found @ (tag::METHODREF | tag::INTERFACE_METHODREF) => Constant::MethodRef {
                class: class(reader)?,
                name_and_type: name_and_type(reader)?,
                is_interface: found == tag::INTERFACE_METHODREF,
            },
            tag::NAME_AND_TYPE => Constant::NameAndType {
                name: utf8(reader)?,
                descriptor: utf8(reader)?,
            },
            tag::METHOD_HANDLE => Constant::MethodHandle {
                handle_kind: reader.read_u8()?,
                member: ConstantIndex(reader.read_u16()?),
            },
            tag::METHOD_TYPE => Constant::MethodType {
                descriptor: utf8(reader)?,
            },
            tag::DYNAMIC => Constant::Dynamic {
                bootstrap_method: reader.read_u16()?,
                name_and_type: name_and_type(reader)?,
            },
            tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method: reader.read_u16()?,
                method_descriptor: name_and_type(reader)?,
            },
            tag::MODULE => Constant::Module(utf8(reader)?),
            tag::PACKAGE => Constant::Package(utf8(reader)?),
            other => {
                return Err(Error::Malformed {
                    offset: tag_offset,
                    message: format!("unknown constant pool tag {}", other),
                })
            }
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Unpaired surrogates have no `String` representation, so they are rejected along with any
/// other invalid byte sequence.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let continuation = |offset: usize| -> Result<u16, String> {
            match bytes.get(idx + offset) {
                Some(b) if b & 0b1100_0000 == 0b1000_0000 => Ok((b & 0x3F) as u16),
                _ => Err(format!("invalid modified UTF-8 sequence at byte {}", idx)),
            }
        };
        let b = bytes[idx];
        if b & 0b1000_0000 == 0 && b != 0 {
            units.push(b as u16);
            idx += 1;
        } else if b & 0b1110_0000 == 0b1100_0000 {
            units.push(((b & 0x1F) as u16) << 6 | continuation(1)?);
            idx += 2;
        } else if b & 0b1111_0000 == 0b1110_0000 {
            units.push(((b & 0x0F) as u16) << 12 | continuation(1)? << 6 | continuation(2)?);
            idx += 3;
        } else {
            return Err(format!("invalid modified UTF-8 byte {:#04x} at {}", b, idx));
        }
    }
    String::from_utf16(&units).map_err(|_| String::from("unpaired surrogate in modified UTF-8"))
}


/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. From
/// JVMS 4.4.5:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

impl ConstantIndex {
    /// Index `0` is never a valid constant, and is used to mean "absent" (eg. the super class of
    /// `java/lang/Object`)
    pub const ZERO: ConstantIndex = ConstantIndex(0);
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

macro_rules! constant_index_impls {
    ($($index:ident),*) => {
        $(
            impl From<$index> for ConstantIndex {
                fn from(index: $index) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $index {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $index {
                fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
                    reader.read_u16().map(|idx| $index(ConstantIndex(idx)))
                }
            }
        )*
    };
}

constant_index_impls!(
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    ClassConstantIndex,
    MethodRefConstantIndex
);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// The `constant_pool_count` is the next free offset, followed by the constants themselves
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// Reads `constant_pool_count` followed by the constants, taking care to skip the unusable slot
/// after 8-byte constants
impl Deserialize for OffsetVec<Constant> {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        let count = reader.read_u16()?;
        if count == 0 {
            return Err(reader.malformed("constant_pool_count must be at least 1"));
        }
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count as usize {
            let constant = Constant::deserialize(reader)?;
            constants.push(constant);
        }
        if constants.offset_len().0 != count as usize {
            return Err(reader.malformed("8-byte constant overruns constant_pool_count"));
        }
        Ok(constants)
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;
    use crate::jvm::FieldType;

    #[test]
    fn entries_are_shared() {
        let mut pool = ConstantsPool::new();
        let object = pool.get_class("java/lang/Object").unwrap();
        let again = pool.get_class("java/lang/Object").unwrap();
        assert_eq!(object, again);
        assert_eq!(object.0, ConstantIndex(2));

        let long = pool.get_long(1).unwrap();
        let next = pool.get_utf8("next").unwrap();
        assert_eq!(long, ConstantIndex(3));
        assert_eq!(next.0, ConstantIndex(5));
        assert_eq!(pool.slot_count(), 6);
    }

    #[test]
    fn method_refs_render_descriptors() {
        let mut pool = ConstantsPool::new();
        let descriptor = MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::STRING)],
            return_type: None,
        };
        let first = pool
            .get_method_ref(&BinaryName::STRINGBUILDER, "<init>", &descriptor, false)
            .unwrap();
        let second = pool
            .get_method_ref(&BinaryName::STRINGBUILDER, "<init>", &descriptor, false)
            .unwrap();
        assert_eq!(first, second);

        let constants = pool.into_offset_vec();
        let rendered: Vec<&str> = constants
            .iter()
            .filter_map(|(_, c)| match c {
                Constant::Utf8(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            rendered,
            vec!["java/lang/StringBuilder", "<init>", "(Ljava/lang/String;)V"]
        );
    }

    #[test]
    fn pool_reads_back() {
        let mut pool = ConstantsPool::new();
        pool.get_string("hello").unwrap();
        pool.get_long(-7).unwrap();
        pool.get_class("Foo").unwrap();
        let constants = pool.into_offset_vec();

        let bytes = constants.to_bytes().unwrap();
        let parsed = OffsetVec::<Constant>::deserialize(&mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(parsed, constants);
    }

    #[test]
    fn existing_entries_are_reused() {
        let mut pool = ConstantsPool::new();
        pool.get_class("Foo").unwrap();
        pool.get_long(3).unwrap();
        pool.get_class("java/lang/Object").unwrap();
        let constants = pool.into_offset_vec();

        let mut resumed = ConstantsPool::from_existing(&constants);
        assert_eq!(resumed.get_class("Foo").unwrap().0, ConstantIndex(2));
        assert_eq!(resumed.get_utf8("java/lang/Object").unwrap().0, ConstantIndex(5));
        assert_eq!(resumed.slot_count(), 7);
        let added = resumed.get_class("Bar").unwrap();
        assert_eq!(added.0, ConstantIndex(8));
        assert_eq!(resumed.constants_from(7).count(), 2);
    }
}

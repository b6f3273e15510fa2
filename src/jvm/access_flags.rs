use crate::jvm::class_file::{ClassReader, Deserialize, Serialize};
use crate::jvm::Error;
use bitflags::bitflags;
use byteorder::WriteBytesExt;

bitflags! {
    /// Flags in the `access_flags` item of a class file
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;

        /// Always set by modern compilers (`invokespecial` uses the new semantics)
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Flags of an entry in the `InnerClasses` attribute
    ///
    /// Unlike [`ClassAccessFlags`], these record what the source said (`private`, `static`) for
    /// nested classes.
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.6-300-D.1-D.1
    pub struct InnerClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccessFlags {
    /// Whether the method can be the target of a call with no receiver
    pub fn is_static(&self) -> bool {
        self.contains(MethodAccessFlags::STATIC)
    }

    /// Whether only the declaring class may call the method
    pub fn is_private(&self) -> bool {
        self.contains(MethodAccessFlags::PRIVATE)
    }
}

/// Flags are a bare `u2`, bits we don't know about are dropped
macro_rules! flags_codec {
    ($($flags:ident),*) => {
        $(
            impl Serialize for $flags {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.bits().serialize(writer)
                }
            }

            impl Deserialize for $flags {
                fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
                    reader.read_u16().map($flags::from_bits_truncate)
                }
            }
        )*
    };
}

flags_codec!(
    ClassAccessFlags,
    MethodAccessFlags,
    FieldAccessFlags,
    InnerClassAccessFlags
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_bits_are_dropped() {
        let bytes = [0x00, 0x09, 0x20, 0x0a];
        let mut reader = ClassReader::new(&bytes);
        let public_static = MethodAccessFlags::deserialize(&mut reader).unwrap();
        assert!(public_static.is_static());
        assert!(!public_static.is_private());
        let private_static = MethodAccessFlags::deserialize(&mut reader).unwrap();
        assert_eq!(private_static, MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC);

        let mut reader = ClassReader::new(&[0x80, 0x21]);
        let class = ClassAccessFlags::deserialize(&mut reader).unwrap();
        assert_eq!(
            class,
            ClassAccessFlags::MODULE | ClassAccessFlags::SUPER | ClassAccessFlags::PUBLIC
        );
        assert_eq!(class.to_bytes().unwrap(), vec![0x80, 0x21]);
        assert!(MethodAccessFlags::deserialize(&mut reader).is_err());
    }
}

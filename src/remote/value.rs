use crate::jvm::{BaseType, BinaryName, FieldType, RefType};
use std::fmt;

/// Primitive value, as carried by the wire protocol
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PrimitiveValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl PrimitiveValue {
    pub fn base_type(&self) -> BaseType {
        match self {
            PrimitiveValue::Boolean(_) => BaseType::Boolean,
            PrimitiveValue::Byte(_) => BaseType::Byte,
            PrimitiveValue::Char(_) => BaseType::Char,
            PrimitiveValue::Short(_) => BaseType::Short,
            PrimitiveValue::Int(_) => BaseType::Int,
            PrimitiveValue::Long(_) => BaseType::Long,
            PrimitiveValue::Float(_) => BaseType::Float,
            PrimitiveValue::Double(_) => BaseType::Double,
        }
    }
}

/// Renders the value the way Java's string conversion would
impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Boolean(value) => write!(f, "{}", value),
            PrimitiveValue::Byte(value) => write!(f, "{}", value),
            PrimitiveValue::Char(value) => match char::from_u32(u32::from(*value)) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "\\u{:04x}", value),
            },
            PrimitiveValue::Short(value) => write!(f, "{}", value),
            PrimitiveValue::Int(value) => write!(f, "{}", value),
            PrimitiveValue::Long(value) => write!(f, "{}", value),
            PrimitiveValue::Float(value) => write!(f, "{:?}", value),
            PrimitiveValue::Double(value) => write!(f, "{:?}", value),
        }
    }
}

/// What sort of object a remote handle points at
///
/// The wire protocol tags object values with this, which saves a round trip when deciding how to
/// display or use an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Object,
    String,
    Thread,
    ThreadGroup,
    ClassLoader,
    ClassObject,
    Array,
}

/// Handle to an object living in the target process
///
/// A handle does not keep its object alive: it has to be pinned (see
/// [`SuspendContext::pin`](super::SuspendContext::pin)) before the next remote call that could let
/// the garbage collector run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub id: u64,
    pub kind: ObjectKind,
}

impl ObjectRef {
    pub fn new(id: u64, kind: ObjectKind) -> ObjectRef {
        ObjectRef { id, kind }
    }
}

/// Handle to a class (or array type) loaded in the target process
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteClass {
    pub id: u64,

    /// Name as written in Java source (`java.net.URL`, `byte[]`, `pkg.Outer$Inner`)
    pub name: String,
}

/// Result of a remote computation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RemoteValue {
    /// Result of a `void` method
    Void,
    Null,
    Primitive(PrimitiveValue),
    Object(ObjectRef),
}

impl RemoteValue {
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            RemoteValue::Object(object) => Some(*object),
            _ => None,
        }
    }

    /// Whether the value could be passed where `field_type` is expected
    ///
    /// Reference types can't be checked without asking the target, so any object (or `null`) is
    /// accepted for them.
    pub fn fits(&self, field_type: &FieldType<BinaryName>) -> bool {
        match (self, field_type) {
            (RemoteValue::Primitive(value), FieldType::Base(base)) => value.base_type() == *base,
            (RemoteValue::Null, FieldType::Ref(_)) => true,
            (RemoteValue::Object(object), FieldType::Ref(ref_type)) => match ref_type {
                RefType::Object(_) => true,
                RefType::PrimitiveArray(_) | RefType::ObjectArray(_) => {
                    object.kind == ObjectKind::Array
                }
            },
            _ => false,
        }
    }

    /// Short description of the kind of value (used in error messages)
    pub fn describe_kind(&self) -> String {
        match self {
            RemoteValue::Void => String::from("void"),
            RemoteValue::Null => String::from("null"),
            RemoteValue::Primitive(value) => value.base_type().java_name().to_owned(),
            RemoteValue::Object(object) => format!("{:?}", object.kind).to_lowercase(),
        }
    }
}

impl From<PrimitiveValue> for RemoteValue {
    fn from(value: PrimitiveValue) -> Self {
        RemoteValue::Primitive(value)
    }
}

impl From<ObjectRef> for RemoteValue {
    fn from(object: ObjectRef) -> Self {
        RemoteValue::Object(object)
    }
}

impl From<Option<ObjectRef>> for RemoteValue {
    fn from(object: Option<ObjectRef>) -> Self {
        object.map_or(RemoteValue::Null, RemoteValue::Object)
    }
}

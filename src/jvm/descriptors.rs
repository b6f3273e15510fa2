use super::{BinaryName, Name};
use crate::util::Width;
use std::error::Error;
use std::fmt;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor that must span all of `source`
    fn parse(source: &str) -> Result<Self, DescriptorError> {
        let mut cursor = Cursor { source, position: 0 };
        let parsed = Self::parse_from(&mut cursor)?;
        match cursor.peek() {
            None => Ok(parsed),
            Some(c) => Err(cursor.error(format!("unexpected trailing '{}'", c))),
        }
    }

    /// Parse a descriptor prefix, leaving the cursor just after it
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError>;
}

/// Position in a descriptor being parsed
pub struct Cursor<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), DescriptorError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}' but input ended", expected))),
        }
    }

    /// Everything up to (and excluding) the next `terminator`, which is consumed
    fn take_until(&mut self, terminator: char) -> Result<&'a str, DescriptorError> {
        let rest = &self.source[self.position..];
        match rest.find(terminator) {
            Some(end) => {
                self.position += end + terminator.len_utf8();
                Ok(&rest[..end])
            }
            None => Err(self.error(format!("missing '{}'", terminator))),
        }
    }

    fn error(&self, message: String) -> DescriptorError {
        DescriptorError {
            descriptor: self.source.to_owned(),
            position: self.position,
            message,
        }
    }
}

/// Malformed field or method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorError {
    pub descriptor: String,
    pub position: usize,
    pub message: String,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at offset {} of {:?}",
            self.message, self.position, self.descriptor
        )
    }
}

impl Error for DescriptorError {}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Keyword used for the type in Java source
    pub const fn java_name(&self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }

    /// Inverse of [`BaseType::java_name`]
    pub fn from_java_name(name: &str) -> Option<BaseType> {
        Some(match name {
            "byte" => BaseType::Byte,
            "char" => BaseType::Char,
            "double" => BaseType::Double,
            "float" => BaseType::Float,
            "int" => BaseType::Int,
            "long" => BaseType::Long,
            "short" => BaseType::Short,
            "boolean" => BaseType::Boolean,
            _ => return None,
        })
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl BaseType {
    fn from_descriptor_char(c: char) -> Option<BaseType> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError> {
        match cursor.bump() {
            Some(c) => BaseType::from_descriptor_char(c)
                .ok_or_else(|| cursor.error(format!("'{}' is not a primitive type", c))),
            None => Err(cursor.error("missing primitive type".to_owned())),
        }
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError> {
        cursor.expect('L')?;
        let name = cursor.take_until(';')?;
        BinaryName::from_string(name.to_owned()).map_err(|msg| cursor.error(msg))
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for RefType<C> {
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError> {
        if cursor.peek() != Some('[') {
            return C::parse_from(cursor).map(RefType::Object);
        }
        let mut dimensions = 0;
        while cursor.peek() == Some('[') {
            cursor.bump();
            dimensions += 1;
        }
        let additional_dimensions = dimensions - 1;
        Ok(if cursor.peek() == Some('L') {
            RefType::ObjectArray(ArrayType {
                additional_dimensions,
                element_type: C::parse_from(cursor)?,
            })
        } else {
            RefType::PrimitiveArray(ArrayType {
                additional_dimensions,
                element_type: BaseType::parse_from(cursor)?,
            })
        })
    }
}

impl<C> RefType<C> {
    pub fn array(field_type: FieldType<C>) -> RefType<C> {
        match field_type {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
            FieldType::Ref(RefType::ObjectArray(arr)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub fn array(field_type: FieldType<C>) -> FieldType<C> {
        FieldType::Ref(RefType::array(field_type))
    }

    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn boolean() -> FieldType<C> {
        FieldType::Base(BaseType::Boolean)
    }

    pub const fn byte() -> FieldType<C> {
        FieldType::Base(BaseType::Byte)
    }
}

impl FieldType<BinaryName> {
    /// Parse the spelling used in Java source and by JDI (`int`, `byte[]`, `java.net.URL[]`)
    pub fn from_java_name(name: &str) -> std::result::Result<Self, String> {
        let mut element = name.trim();
        let mut dimensions = 0;
        while let Some(stripped) = element.strip_suffix("[]") {
            element = stripped.trim_end();
            dimensions += 1;
        }
        let mut field_type = match BaseType::from_java_name(element) {
            Some(base_type) => FieldType::Base(base_type),
            None => FieldType::object(BinaryName::from_java_name(element)?),
        };
        for _ in 0..dimensions {
            field_type = FieldType::array(field_type);
        }
        Ok(field_type)
    }

    /// Inverse of [`FieldType::from_java_name`]
    pub fn java_name(&self) -> String {
        fn brackets(dimensions: usize) -> String {
            "[]".repeat(dimensions + 1)
        }
        match self {
            FieldType::Base(base_type) => base_type.java_name().to_owned(),
            FieldType::Ref(RefType::Object(class)) => class.to_java_name(),
            FieldType::Ref(RefType::ObjectArray(arr)) => {
                arr.element_type.to_java_name() + &brackets(arr.additional_dimensions)
            }
            FieldType::Ref(RefType::PrimitiveArray(arr)) => {
                arr.element_type.java_name().to_owned() + &brackets(arr.additional_dimensions)
            }
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError> {
        match cursor.peek() {
            Some('L' | '[') => RefType::parse_from(cursor).map(FieldType::Ref),
            _ => BaseType::parse_from(cursor).map(FieldType::Base),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,
    pub return_type: Option<FieldType<Class>>, // `None` is for `void` (ie. no return)
}

impl<C> MethodDescriptor<C> {
    /// Total length of parameters (not the same as the length of the vector),
    /// which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(|p| p.width()).sum::<usize>()
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, DescriptorError> {
        cursor.expect('(')?;
        let mut parameters = vec![];
        loop {
            match cursor.peek() {
                Some(')') => break,
                None => return Err(cursor.error("unclosed parameter list".to_owned())),
                Some(_) => parameters.push(FieldType::parse_from(cursor)?),
            }
        }
        cursor.expect(')')?;

        let return_type = if cursor.peek() == Some('V') {
            cursor.bump();
            None
        } else {
            Some(FieldType::parse_from(cursor)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    type FT = FieldType<BinaryName>;

    const INT: FT = FieldType::Base(BaseType::Int);
    const LONG: FT = FieldType::Base(BaseType::Long);
    const OBJECT: FT = FieldType::object(BinaryName::OBJECT);
    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn field_types() {
        round_trip("I", INT);
        round_trip("Ljava/lang/Object;", OBJECT);
        round_trip::<FT>("[[B", FieldType::array(FieldType::array(FieldType::byte())));
        round_trip("[Ljava/lang/String;", FieldType::array(STRING));
    }

    #[test]
    fn method_descriptors() {
        round_trip(
            "(Ljava/lang/String;[BII)Ljava/lang/Class;",
            MethodDescriptor {
                parameters: vec![
                    STRING,
                    FieldType::array(FieldType::byte()),
                    INT,
                    INT,
                ],
                return_type: Some(FieldType::object(BinaryName::CLASS)),
            },
        );
        round_trip(
            "()V",
            MethodDescriptor {
                parameters: Vec::<FT>::new(),
                return_type: None,
            },
        );
        assert!(MethodDescriptor::<BinaryName>::parse("(I").is_err());
        let err = MethodDescriptor::<BinaryName>::parse("(IQ)V").unwrap_err();
        assert_eq!(err.position, 3);
        assert_eq!(err.message, "'Q' is not a primitive type");
        assert!(FT::parse("Ljava/lang/Object").is_err());
        assert!(FT::parse("II").is_err());
    }

    #[test]
    fn parameter_length_counts_wide_slots() {
        let desc: MethodDescriptor<BinaryName> =
            MethodDescriptor::parse("(JILjava/lang/Object;)V").unwrap();
        assert_eq!(desc.parameter_length(false), 4);
        assert_eq!(desc.parameter_length(true), 5);
        assert_eq!(desc.parameters[0], LONG);
    }

    #[test]
    fn java_names() {
        assert_eq!(FT::from_java_name("byte[]").unwrap().render(), "[B");
        assert_eq!(
            FT::from_java_name("java.net.URL[]").unwrap().render(),
            "[Ljava/net/URL;"
        );
        assert_eq!(
            FT::from_java_name("java.net.URLClassLoader").unwrap().render(),
            "Ljava/net/URLClassLoader;"
        );
        assert_eq!(FT::from_java_name("int[][]").unwrap().java_name(), "int[][]");
        assert_eq!(STRING.java_name(), "java.lang.String");
    }
}

use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in their internal form (`java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

/// Renders the name the way Java source code (and `ClassLoader.defineClass`) spells it
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(&self.to_java_name())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Instance initializer, the one name allowed angle brackets here
    pub const INIT: Self = Self::name("<init>");

    // JDK names
    pub const APPEND: Self = Self::name("append");
    pub const DEFINECLASS: Self = Self::name("defineClass");
    pub const GETMESSAGE: Self = Self::name("getMessage");
    pub const LOADCLASS: Self = Self::name("loadClass");
    pub const TOSTRING: Self = Self::name("toString");

    /// Marker carried by the names of classes generated for an evaluation
    pub const GENERATEDEVALUATIONCLASS: Self = Self::name("GeneratedEvaluationClass");
}

impl BinaryName {
    /// Build a binary name from the dotted form used in Java source (`java.lang.Object`)
    pub fn from_java_name(name: &str) -> Result<BinaryName, String> {
        BinaryName::from_string(name.replace('.', "/"))
    }

    /// Dotted form of the name (`java.lang.Object`), nested classes keep their `$`
    pub fn to_java_name(&self) -> String {
        self.as_str().replace('/', ".")
    }

    /// Name of a nested class inside this one (`Outer$Inner`)
    pub fn nested(&self, inner: &UnqualifiedName) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}${}", self.as_str(), inner.as_str())))
    }

    /// Package portion of the name, if any (`java/lang` for `java/lang/Object`)
    pub fn package(&self) -> Option<&str> {
        self.as_str().rfind('/').map(|idx| &self.as_str()[..idx])
    }

    /// Last segment of the name, without the package (`Outer$Inner` for `a/b/Outer$Inner`)
    pub fn class_segment(&self) -> &str {
        let name = self.as_str();
        match name.rfind('/') {
            Some(idx) => &name[idx + 1..],
            None => name,
        }
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLASSLOADER: Self = Self::name("java/lang/ClassLoader");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALSTATEEXCEPTION: Self = Self::name("java/lang/IllegalStateException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const MATH: Self = Self::name("java/lang/Math");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const STRINGBUILDER: Self = Self::name("java/lang/StringBuilder");
    pub const SYSTEM: Self = Self::name("java/lang/System");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const UNSUPPORTEDOPERATIONEXCEPTION: Self =
        Self::name("java/lang/UnsupportedOperationException");
    pub const URL: Self = Self::name("java/net/URL");
    pub const URLCLASSLOADER: Self = Self::name("java/net/URLClassLoader");

    /// Base class whose subclasses skip bytecode verification and access checks (JDK 8)
    pub const MAGICACCESSORIMPL: Self = Self::name("sun/reflect/MagicAccessorImpl");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn java_and_binary_forms() {
        let name = BinaryName::from_java_name("dummy.GeneratedEvaluationClass").unwrap();
        assert_eq!(name.as_str(), "dummy/GeneratedEvaluationClass");
        assert_eq!(name.to_java_name(), "dummy.GeneratedEvaluationClass");
        assert_eq!(name.package(), Some("dummy"));

        let nested = name.nested(&UnqualifiedName::from_string("Helper".to_owned()).unwrap());
        assert_eq!(nested.as_str(), "dummy/GeneratedEvaluationClass$Helper");
        assert_eq!(nested.class_segment(), "GeneratedEvaluationClass$Helper");
        assert_eq!(BinaryName::OBJECT.package(), Some("java/lang"));
    }

    #[test]
    fn invalid_names() {
        assert!(BinaryName::from_java_name("").is_err());
        assert!(BinaryName::from_java_name("a..b").is_err());
        assert!(UnqualifiedName::from_string("a;b".to_owned()).is_err());
        assert!(UnqualifiedName::from_string("a/b".to_owned()).is_err());
    }
}

use crate::jvm::class_file::ClassFile;
use crate::jvm::{
    self, BaseType, BinaryName, FieldType, MethodDescriptor, Name,
    ParseDescriptor, RefType,
};
use std::collections::{HashMap, HashSet};

/// What the compiler needs to know about a class it did not compile itself
#[derive(Clone, Debug, PartialEq)]
pub struct ClassData {
    pub name: BinaryName,
    pub superclass: Option<BinaryName>,
    pub interfaces: Vec<BinaryName>,
    pub is_interface: bool,
    pub methods: Vec<MethodData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodData {
    pub name: String,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_static: bool,
}

/// Source of class definitions for name resolution
pub trait ClassPath {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData>;
}

impl<C: ClassPath + ?Sized> ClassPath for &C {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        (**self).find_class(name)
    }
}

impl<C: ClassPath + ?Sized> ClassPath for Box<C> {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        (**self).find_class(name)
    }
}

impl ClassPath for HashMap<BinaryName, ClassData> {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.get(name)
    }
}

/// Several class paths, searched in order
#[derive(Default)]
pub struct ClassPathChain {
    paths: Vec<Box<dyn ClassPath>>,
}

impl ClassPathChain {
    pub fn new() -> ClassPathChain {
        ClassPathChain { paths: vec![] }
    }

    /// Add a class path to be searched after the ones already added
    pub fn push<C: ClassPath + 'static>(&mut self, class_path: C) {
        self.paths.push(Box::new(class_path));
    }

    pub fn with<C: ClassPath + 'static>(mut self, class_path: C) -> ClassPathChain {
        self.push(class_path);
        self
    }
}

impl ClassPath for ClassPathChain {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.paths.iter().find_map(|path| path.find_class(name))
    }
}

/// Application classes given as compiled class files
#[derive(Default)]
pub struct ClassFileClassPath {
    classes: HashMap<BinaryName, ClassData>,
}

impl ClassFileClassPath {
    pub fn new() -> ClassFileClassPath {
        ClassFileClassPath {
            classes: HashMap::new(),
        }
    }

    /// Read the signature of a compiled class
    ///
    /// Private methods and methods whose descriptors mention unsupported types are still
    /// recorded; overload resolution simply never picks them.
    pub fn add_class_file(&mut self, bytes: &[u8]) -> Result<BinaryName, jvm::Error> {
        let class = ClassFile::parse(bytes)?;
        let malformed = |message: &str| jvm::Error::Malformed {
            offset: 0,
            message: message.to_owned(),
        };

        let name = class
            .this_class_name()
            .ok_or_else(|| malformed("invalid this_class name"))?;
        let interfaces = class
            .interfaces
            .iter()
            .filter_map(|interface| class.class_name(*interface))
            .map(|interface| BinaryName::from_string(interface.to_owned()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| malformed(&err))?;

        let mut methods = vec![];
        for method in &class.methods {
            if method.access_flags.is_private() {
                continue;
            }
            let (name, descriptor) = match (
                class.utf8(method.name_index),
                class.utf8(method.descriptor_index),
            ) {
                (Some(name), Some(descriptor)) => (name, descriptor),
                _ => return Err(malformed("method name or descriptor is not a Utf8 constant")),
            };
            if name == "<clinit>" {
                continue;
            }
            let descriptor = MethodDescriptor::parse(descriptor)
                .map_err(|err| jvm::Error::BadDescriptor(err.to_string()))?;
            methods.push(MethodData {
                name: name.to_owned(),
                descriptor,
                is_static: method.access_flags.is_static(),
            });
        }

        let data = ClassData {
            name: name.clone(),
            superclass: class.super_class_name(),
            interfaces,
            is_interface: class.is_interface(),
            methods,
        };
        self.classes.insert(name.clone(), data);
        Ok(name)
    }
}

impl ClassPath for ClassFileClassPath {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }
}

/// The part of `java.lang` that expression wrappers use
pub struct PlatformClassPath {
    classes: HashMap<BinaryName, ClassData>,
}

/// `(name, descriptor, is_static)`
type MethodTable = &'static [(&'static str, &'static str, bool)];

const THROWABLE_METHODS: MethodTable = &[
    ("<init>", "()V", false),
    ("<init>", "(Ljava/lang/String;)V", false),
    ("<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V", false),
    ("getMessage", "()Ljava/lang/String;", false),
    ("getCause", "()Ljava/lang/Throwable;", false),
];

const EXCEPTION_CONSTRUCTORS: MethodTable = &[
    ("<init>", "()V", false),
    ("<init>", "(Ljava/lang/String;)V", false),
    ("<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V", false),
];

impl PlatformClassPath {
    pub fn new() -> PlatformClassPath {
        let mut classes = HashMap::new();
        let mut add = |name: BinaryName,
                       superclass: Option<BinaryName>,
                       interfaces: &[BinaryName],
                       is_interface: bool,
                       methods: MethodTable| {
            let methods = methods
                .iter()
                .filter_map(|(method, descriptor, is_static)| {
                    Some(MethodData {
                        name: String::from(*method),
                        descriptor: MethodDescriptor::parse(descriptor).ok()?,
                        is_static: *is_static,
                    })
                })
                .collect();
            let data = ClassData {
                name: name.clone(),
                superclass,
                interfaces: interfaces.to_vec(),
                is_interface,
                methods,
            };
            classes.insert(name, data);
        };
        let object = || Some(BinaryName::OBJECT);

        add(
            BinaryName::OBJECT,
            None,
            &[],
            false,
            &[
                ("<init>", "()V", false),
                ("toString", "()Ljava/lang/String;", false),
                ("hashCode", "()I", false),
                ("equals", "(Ljava/lang/Object;)Z", false),
                ("getClass", "()Ljava/lang/Class;", false),
            ],
        );
        add(
            BinaryName::STRING,
            object(),
            &[
                BinaryName::SERIALIZABLE,
                BinaryName::COMPARABLE,
                BinaryName::CHARSEQUENCE,
            ],
            false,
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/String;)V", false),
                ("length", "()I", false),
                ("isEmpty", "()Z", false),
                ("concat", "(Ljava/lang/String;)Ljava/lang/String;", false),
                ("substring", "(I)Ljava/lang/String;", false),
                ("substring", "(II)Ljava/lang/String;", false),
                ("indexOf", "(Ljava/lang/String;)I", false),
                ("contains", "(Ljava/lang/CharSequence;)Z", false),
                ("startsWith", "(Ljava/lang/String;)Z", false),
                ("toUpperCase", "()Ljava/lang/String;", false),
                ("toLowerCase", "()Ljava/lang/String;", false),
                ("trim", "()Ljava/lang/String;", false),
                ("valueOf", "(Z)Ljava/lang/String;", true),
                ("valueOf", "(I)Ljava/lang/String;", true),
                ("valueOf", "(J)Ljava/lang/String;", true),
                ("valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", true),
            ],
        );
        add(
            BinaryName::CHARSEQUENCE,
            object(),
            &[],
            true,
            &[
                ("length", "()I", false),
                ("toString", "()Ljava/lang/String;", false),
            ],
        );
        add(BinaryName::COMPARABLE, object(), &[], true, &[]);
        add(BinaryName::SERIALIZABLE, object(), &[], true, &[]);
        add(
            BinaryName::STRINGBUILDER,
            object(),
            &[BinaryName::SERIALIZABLE, BinaryName::CHARSEQUENCE],
            false,
            &[
                ("<init>", "()V", false),
                ("<init>", "(Ljava/lang/String;)V", false),
                ("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", false),
                ("append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;", false),
                ("append", "(Z)Ljava/lang/StringBuilder;", false),
                ("append", "(I)Ljava/lang/StringBuilder;", false),
                ("append", "(J)Ljava/lang/StringBuilder;", false),
                ("length", "()I", false),
                ("reverse", "()Ljava/lang/StringBuilder;", false),
                ("toString", "()Ljava/lang/String;", false),
            ],
        );
        add(
            BinaryName::NUMBER,
            object(),
            &[BinaryName::SERIALIZABLE],
            false,
            &[("intValue", "()I", false), ("longValue", "()J", false)],
        );
        add(
            BinaryName::INTEGER,
            Some(BinaryName::NUMBER),
            &[BinaryName::COMPARABLE],
            false,
            &[
                ("valueOf", "(I)Ljava/lang/Integer;", true),
                ("parseInt", "(Ljava/lang/String;)I", true),
                ("toString", "(I)Ljava/lang/String;", true),
                ("intValue", "()I", false),
            ],
        );
        add(
            BinaryName::LONG,
            Some(BinaryName::NUMBER),
            &[BinaryName::COMPARABLE],
            false,
            &[
                ("valueOf", "(J)Ljava/lang/Long;", true),
                ("parseLong", "(Ljava/lang/String;)J", true),
                ("toString", "(J)Ljava/lang/String;", true),
                ("longValue", "()J", false),
            ],
        );
        add(
            BinaryName::BOOLEAN,
            object(),
            &[BinaryName::SERIALIZABLE, BinaryName::COMPARABLE],
            false,
            &[
                ("valueOf", "(Z)Ljava/lang/Boolean;", true),
                ("parseBoolean", "(Ljava/lang/String;)Z", true),
                ("booleanValue", "()Z", false),
            ],
        );
        add(
            BinaryName::MATH,
            object(),
            &[],
            false,
            &[
                ("abs", "(I)I", true),
                ("abs", "(J)J", true),
                ("max", "(II)I", true),
                ("max", "(JJ)J", true),
                ("min", "(II)I", true),
                ("min", "(JJ)J", true),
                ("addExact", "(II)I", true),
                ("addExact", "(JJ)J", true),
                ("multiplyExact", "(II)I", true),
                ("multiplyExact", "(JJ)J", true),
            ],
        );
        add(
            BinaryName::SYSTEM,
            object(),
            &[],
            false,
            &[
                ("currentTimeMillis", "()J", true),
                ("nanoTime", "()J", true),
                ("identityHashCode", "(Ljava/lang/Object;)I", true),
                ("getProperty", "(Ljava/lang/String;)Ljava/lang/String;", true),
            ],
        );
        add(
            BinaryName::CLASS,
            object(),
            &[BinaryName::SERIALIZABLE],
            false,
            &[
                ("getName", "()Ljava/lang/String;", false),
                ("getSimpleName", "()Ljava/lang/String;", false),
            ],
        );
        add(
            BinaryName::CLASSLOADER,
            object(),
            &[],
            false,
            &[(
                "loadClass",
                "(Ljava/lang/String;)Ljava/lang/Class;",
                false,
            )],
        );
        add(
            BinaryName::THROWABLE,
            object(),
            &[BinaryName::SERIALIZABLE],
            false,
            THROWABLE_METHODS,
        );
        add(
            BinaryName::EXCEPTION,
            Some(BinaryName::THROWABLE),
            &[],
            false,
            EXCEPTION_CONSTRUCTORS,
        );
        add(
            BinaryName::ERROR,
            Some(BinaryName::THROWABLE),
            &[],
            false,
            EXCEPTION_CONSTRUCTORS,
        );
        add(
            BinaryName::RUNTIMEEXCEPTION,
            Some(BinaryName::EXCEPTION),
            &[],
            false,
            EXCEPTION_CONSTRUCTORS,
        );
        for exception in [
            BinaryName::ARITHMETICEXCEPTION,
            BinaryName::ILLEGALARGUMENTEXCEPTION,
            BinaryName::ILLEGALSTATEEXCEPTION,
            BinaryName::UNSUPPORTEDOPERATIONEXCEPTION,
        ] {
            add(
                exception,
                Some(BinaryName::RUNTIMEEXCEPTION),
                &[],
                false,
                EXCEPTION_CONSTRUCTORS,
            );
        }

        PlatformClassPath { classes }
    }
}

impl Default for PlatformClassPath {
    fn default() -> Self {
        PlatformClassPath::new()
    }
}

impl ClassPath for PlatformClassPath {
    fn find_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }
}

/// Query if one reference type is assignable to another (`isJavaAssignable` in the verifier)
///
/// Note: if some of the types queried aren't on the class path, this may return false negatives.
pub fn is_java_assignable(
    class_path: &dyn ClassPath,
    sub_type: &RefType<BinaryName>,
    super_type: &RefType<BinaryName>,
) -> bool {
    match (sub_type, super_type) {
        // Special superclass and interfaces of all arrays
        (RefType::PrimitiveArray(_) | RefType::ObjectArray(_), RefType::Object(object_type)) => {
            object_type == &BinaryName::OBJECT || object_type == &BinaryName::SERIALIZABLE
        }

        (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

        // Cursed (unsound) covariance of arrays
        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
            if arr1.additional_dimensions == arr2.additional_dimensions {
                is_subclass(class_path, &arr1.element_type, &arr2.element_type)
            } else {
                arr1.additional_dimensions > arr2.additional_dimensions
                    && (arr2.element_type == BinaryName::OBJECT
                        || arr2.element_type == BinaryName::SERIALIZABLE)
            }
        }

        (RefType::Object(class1), RefType::Object(class2)) => {
            is_subclass(class_path, class1, class2)
        }

        _ => false,
    }
}

/// Whether there is a path from `sub_class` to `super_class` through super type edges
pub fn is_subclass(class_path: &dyn ClassPath, sub_class: &BinaryName, super_class: &BinaryName) -> bool {
    if super_class == &BinaryName::OBJECT {
        return true;
    }
    let mut to_visit: Vec<&BinaryName> = vec![sub_class];
    let mut visited: HashSet<&BinaryName> = to_visit.iter().cloned().collect();
    while let Some(next) = to_visit.pop() {
        if next == super_class {
            return true;
        }
        if let Some(class_data) = class_path.find_class(next) {
            for parent in class_data.superclass.iter().chain(&class_data.interfaces) {
                if visited.insert(parent) {
                    to_visit.push(parent);
                }
            }
        }
    }
    false
}

/// Methods with the given name visible on a class, most derived first
///
/// Overridden methods (same name and descriptor) only show up once, with the class declaring
/// the most derived version.
pub fn visible_methods<'a>(
    class_path: &'a dyn ClassPath,
    class: &'a BinaryName,
    name: &str,
) -> Vec<(&'a ClassData, &'a MethodData)> {
    static OBJECT: BinaryName = BinaryName::OBJECT;

    let mut found: Vec<(&ClassData, &MethodData)> = vec![];
    let mut to_visit: Vec<&BinaryName> = vec![class];
    let mut visited: HashSet<&BinaryName> = HashSet::new();
    let mut reached_object = false;

    while !to_visit.is_empty() {
        let next = to_visit.remove(0);
        if !visited.insert(next) {
            continue;
        }
        reached_object |= next == &BinaryName::OBJECT;
        if let Some(class_data) = class_path.find_class(next) {
            for method in &class_data.methods {
                let constructor = method.name == "<init>";
                if method.name != name || (constructor && next != class) {
                    continue;
                }
                if !found.iter().any(|(_, m)| m.descriptor == method.descriptor) {
                    found.push((class_data, method));
                }
            }
            to_visit.extend(class_data.superclass.iter());
            to_visit.extend(class_data.interfaces.iter());
        }

        // Interfaces still have the public methods of `Object`
        if to_visit.is_empty() && !reached_object && name != "<init>" {
            reached_object = true;
            to_visit.push(&OBJECT);
        }
    }
    found
}

/// Primitive widening conversion (JLS 5.1.2), restricted to the integral types
pub fn widens_to(from: BaseType, to: BaseType) -> bool {
    use BaseType::*;
    from == to
        || matches!(
            (from, to),
            (Byte, Short | Int | Long) | (Short, Int | Long) | (Char, Int | Long) | (Int, Long)
        )
}

/// Field type of a primitive keyword (`int`, `long`, ...)
pub fn primitive(name: &str) -> Option<FieldType<BinaryName>> {
    BaseType::from_java_name(name).map(FieldType::Base)
}

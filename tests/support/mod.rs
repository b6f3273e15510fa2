//! A stand-in for a suspended JVM
//!
//! Classes handed to `defineClass` are parsed and their straight-line bytecode is interpreted, so
//! that evaluations run end to end without a real target. A handful of platform methods
//! (`StringBuilder`, `String`, `Math`, exception constructors) are implemented natively.

#![allow(dead_code)]

use jeval::jvm::class_file::{ClassFile, Code, Constant, ConstantIndex, Version};
use jeval::jvm::{
    BaseType, BinaryName, FieldType, MethodDescriptor, Name, ParseDescriptor, RenderDescriptor,
};
use jeval::remote::{
    check_arguments, Cancellation, InvokeTarget, ObjectKind, ObjectRef, PrimitiveValue,
    RemoteClass, RemoteError, RemoteRuntime, RemoteValue, TargetException,
};
use std::collections::{HashMap, HashSet};

const URL_CLASS_LOADER: &str = "java.net.URLClassLoader";

/// Classes every loader can see
const PLATFORM_CLASSES: &[&str] = &[
    "java.lang.Object",
    "java.lang.String",
    "java.lang.StringBuilder",
    "java.lang.Math",
    "java.lang.ClassLoader",
    "java.lang.RuntimeException",
    "java.lang.IllegalStateException",
    "java.lang.IllegalArgumentException",
    "java.lang.Exception",
    "java.lang.Throwable",
    "java.net.URL",
    "java.net.URL[]",
    URL_CLASS_LOADER,
    "byte[]",
];

#[derive(Debug)]
enum HeapObject {
    Str(String),
    Builder(String),
    Array(Vec<RemoteValue>),
    Loader { parent: Option<ObjectRef> },
    Throwable { class: String, message: Option<String> },

    /// Allocated by `new`, not yet constructed (or an object with no interesting state)
    Plain { class: String },
    ClassObject(u64),
}

struct LoadedClass {
    name: String,
    loader: Option<ObjectRef>,
    file: Option<ClassFile>,
}

/// One remote operation, as observed by the target
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ResolveClass(String),
    NewInstance(String),
    Invoke(String),
    MirrorString(String),
    NewArray(String, usize),
    SetArray(usize),

    /// Object handed back by the previous call
    Returned(u64),
    Pin(u64),
}

/// Class defined through `defineClass`
#[derive(Clone, Debug, PartialEq)]
pub struct Defined {
    pub name: String,
    pub superclass: Option<String>,
    pub version: Version,
    pub loader: ObjectRef,
}

pub struct FakeVm {
    objects: HashMap<u64, HeapObject>,
    classes: Vec<LoadedClass>,
    next_id: u64,
    app_loader: ObjectRef,

    pub version: String,
    pub calls: Vec<Call>,
    pub defined: Vec<Defined>,
    pub loaders: Vec<ObjectRef>,
    pub pinned: HashSet<u64>,

    /// Every pin, in order, even those later released
    pub pin_log: Vec<u64>,
    pub resumed: bool,

    /// Cancelled as soon as a class gets defined
    pub cancel_on_define: Option<Cancellation>,

    /// Cancelled when the named method returns
    pub cancel_on_invoke: Option<(String, Cancellation)>,
}

impl FakeVm {
    pub fn new() -> FakeVm {
        let mut vm = FakeVm {
            objects: HashMap::new(),
            classes: vec![],
            next_id: 1000,
            app_loader: ObjectRef::new(0, ObjectKind::ClassLoader),
            version: String::from("1.8.0_292"),
            calls: vec![],
            defined: vec![],
            loaders: vec![],
            pinned: HashSet::new(),
            pin_log: vec![],
            resumed: false,
            cancel_on_define: None,
            cancel_on_invoke: None,
        };
        for name in PLATFORM_CLASSES {
            vm.classes.push(LoadedClass {
                name: (*name).to_owned(),
                loader: None,
                file: None,
            });
        }
        vm.app_loader = vm.alloc(ObjectKind::ClassLoader, HeapObject::Loader { parent: None });
        vm
    }

    pub fn app_loader(&self) -> ObjectRef {
        self.app_loader
    }

    /// Make a class part of the debuggee (defined by the application class loader)
    pub fn preload(&mut self, bytes: &[u8]) {
        let file = ClassFile::parse(bytes).unwrap();
        let name = file.this_class_name().unwrap().to_java_name();
        self.classes.push(LoadedClass {
            name,
            loader: Some(self.app_loader),
            file: Some(file),
        });
    }

    pub fn string(&self, object: ObjectRef) -> Option<&str> {
        match self.objects.get(&object.id) {
            Some(HeapObject::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Remote invocations, by method name
    pub fn invoked(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Invoke(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether every object handed back was pinned before anything else reached the target
    pub fn pinned_right_away(&self) -> bool {
        self.calls.iter().enumerate().all(|(index, call)| match call {
            Call::Returned(id) => self.calls.get(index + 1) == Some(&Call::Pin(*id)),
            _ => true,
        })
    }

    /// Objects handed back to the debugger
    pub fn returned(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Returned(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn hand_back(&mut self, object: ObjectRef) -> ObjectRef {
        self.calls.push(Call::Returned(object.id));
        object
    }

    fn alloc(&mut self, kind: ObjectKind, object: HeapObject) -> ObjectRef {
        self.next_id += 1;
        self.objects.insert(self.next_id, object);
        ObjectRef::new(self.next_id, kind)
    }

    fn alloc_string(&mut self, value: String) -> RemoteValue {
        RemoteValue::Object(self.alloc(ObjectKind::String, HeapObject::Str(value)))
    }

    fn object(&self, object: ObjectRef) -> Result<&HeapObject, RemoteError> {
        self.objects
            .get(&object.id)
            .ok_or(RemoteError::Jdwp(20))
    }

    fn class(&self, id: u64) -> Result<&LoadedClass, RemoteError> {
        self.classes
            .get(id as usize)
            .ok_or_else(|| RemoteError::Protocol(format!("no class {}", id)))
    }

    /// Whether `ancestor` is `loader` or one of its parents
    fn delegates_to(&self, loader: Option<ObjectRef>, ancestor: Option<ObjectRef>) -> bool {
        let mut current = loader;
        loop {
            if current == ancestor {
                return true;
            }
            match current.and_then(|loader| self.objects.get(&loader.id)) {
                Some(HeapObject::Loader { parent }) => current = *parent,
                _ => return false,
            }
        }
    }

    fn find_class(&self, name: &str, loader: Option<ObjectRef>) -> Option<u64> {
        self.classes
            .iter()
            .position(|class| class.name == name && self.delegates_to(loader, class.loader))
            .map(|idx| idx as u64)
    }

    fn throw(&mut self, class: &str, message: Option<String>) -> RemoteError {
        let exception = self.alloc(
            ObjectKind::Object,
            HeapObject::Throwable {
                class: class.to_owned(),
                message: message.clone(),
            },
        );
        RemoteError::Exception(TargetException {
            exception,
            class_name: class.to_owned(),
            message,
        })
    }

    /// Java's string conversion of a value
    fn stringify(&self, value: &RemoteValue) -> String {
        match value {
            RemoteValue::Void => String::new(),
            RemoteValue::Null => String::from("null"),
            RemoteValue::Primitive(primitive) => primitive.to_string(),
            RemoteValue::Object(object) => match self.objects.get(&object.id) {
                Some(HeapObject::Str(value)) | Some(HeapObject::Builder(value)) => value.clone(),
                Some(HeapObject::Throwable {
                    class,
                    message: Some(message),
                }) => format!("{}: {}", class, message),
                Some(HeapObject::Throwable { class, .. }) | Some(HeapObject::Plain { class }) => {
                    format!("{}@{:x}", class, object.id)
                }
                _ => format!("java.lang.Object@{:x}", object.id),
            },
        }
    }

    fn define_class(
        &mut self,
        loader: ObjectRef,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        let name = match args[0].as_object() {
            Some(name) => self.string(name).map(str::to_owned),
            None => None,
        };
        let bytes: Option<Vec<u8>> = match args[1].as_object().and_then(|array| self.objects.get(&array.id)) {
            Some(HeapObject::Array(values)) => Some(
                values
                    .iter()
                    .map(|value| match value {
                        RemoteValue::Primitive(PrimitiveValue::Byte(b)) => *b as u8,
                        _ => 0,
                    })
                    .collect(),
            ),
            _ => None,
        };
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => return Err(self.throw("java.lang.NullPointerException", None)),
        };
        let file = match ClassFile::parse(&bytes) {
            Ok(file) => file,
            Err(err) => return Err(self.throw("java.lang.ClassFormatError", Some(err.to_string()))),
        };
        let defined_name = file.this_class_name().map(|name| name.to_java_name());
        if defined_name.is_none() || (name.is_some() && name != defined_name) {
            return Err(self.throw("java.lang.NoClassDefFoundError", name));
        }
        let defined_name = defined_name.unwrap_or_default();
        if self.find_class(&defined_name, Some(loader)).is_some() {
            return Err(self.throw("java.lang.LinkageError", Some(format!(
                "duplicate class definition: {}",
                defined_name
            ))));
        }

        self.defined.push(Defined {
            name: defined_name.clone(),
            superclass: file.super_class_name().map(|name| name.as_str().to_owned()),
            version: file.version,
            loader,
        });
        self.classes.push(LoadedClass {
            name: defined_name,
            loader: Some(loader),
            file: Some(file),
        });
        if let Some(cancellation) = &self.cancel_on_define {
            cancellation.cancel();
        }
        let class_id = self.classes.len() as u64 - 1;
        Ok(RemoteValue::Object(self.alloc(
            ObjectKind::ClassObject,
            HeapObject::ClassObject(class_id),
        )))
    }

    /// Call a static method, interpreting it when it comes from a class file
    fn call_static(
        &mut self,
        class_id: u64,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue, RemoteError> {
        let class = self.class(class_id)?;
        let file = match &class.file {
            Some(file) => file,
            None => {
                let class_name = class.name.clone();
                return self.native_static(&class_name, name, descriptor, &args);
            }
        };
        let method = file
            .find_method(name, &descriptor.render())
            .ok_or_else(|| RemoteError::Type(format!("no method {}", name)))?;
        let attribute = file
            .find_attribute(&method.attributes, "Code")
            .ok_or_else(|| RemoteError::Protocol(String::from("no code")))?;
        let code =
            Code::parse(&attribute.info).map_err(|err| RemoteError::Protocol(err.to_string()))?;
        let loader = class.loader;

        // Parameters occupy the first locals (two slots for `long`)
        let mut locals = vec![RemoteValue::Void; usize::from(code.max_locals).max(1)];
        let mut slot = 0;
        for (arg, parameter) in args.into_iter().zip(&descriptor.parameters) {
            locals[slot] = widen(arg);
            slot += if *parameter == FieldType::long() { 2 } else { 1 };
        }
        let value = self.interpret(class_id, loader, &code.code_array.0, locals)?;
        Ok(narrow(value, descriptor.return_type.as_ref()))
    }

    fn interpret(
        &mut self,
        class_id: u64,
        loader: Option<ObjectRef>,
        code: &[u8],
        mut locals: Vec<RemoteValue>,
    ) -> Result<RemoteValue, RemoteError> {
        let mut stack: Vec<RemoteValue> = vec![];
        let mut pc = 0;
        let u8_at = |pc: usize| code[pc];
        let u16_at = |pc: usize| u16::from_be_bytes([code[pc], code[pc + 1]]);

        loop {
            let opcode = u8_at(pc);
            pc += 1;
            match opcode {
                0x01 => stack.push(RemoteValue::Null),
                0x02..=0x08 => stack.push(int(opcode as i32 - 0x03)),
                0x09 | 0x0a => stack.push(long(opcode as i64 - 0x09)),
                0x10 => {
                    stack.push(int(u8_at(pc) as i8 as i32));
                    pc += 1;
                }
                0x11 => {
                    stack.push(int(u16_at(pc) as i16 as i32));
                    pc += 2;
                }
                0x12 | 0x13 | 0x14 => {
                    let index = if opcode == 0x12 {
                        let index = u16::from(u8_at(pc));
                        pc += 1;
                        index
                    } else {
                        let index = u16_at(pc);
                        pc += 2;
                        index
                    };
                    let value = self.load_constant(class_id, index)?;
                    stack.push(value);
                }
                0x15 | 0x16 | 0x19 => {
                    stack.push(locals[usize::from(u8_at(pc))]);
                    pc += 1;
                }
                0x1a..=0x1d => stack.push(locals[usize::from(opcode - 0x1a)]),
                0x1e..=0x21 => stack.push(locals[usize::from(opcode - 0x1e)]),
                0x2a..=0x2d => stack.push(locals[usize::from(opcode - 0x2a)]),
                0x36 | 0x37 | 0x3a => {
                    locals[usize::from(u8_at(pc))] = pop(&mut stack)?;
                    pc += 1;
                }
                0x3b..=0x3e => locals[usize::from(opcode - 0x3b)] = pop(&mut stack)?,
                0x3f..=0x42 => locals[usize::from(opcode - 0x3f)] = pop(&mut stack)?,
                0x4b..=0x4e => locals[usize::from(opcode - 0x4b)] = pop(&mut stack)?,
                0xc4 => {
                    let wide_opcode = u8_at(pc);
                    let index = usize::from(u16_at(pc + 1));
                    pc += 3;
                    match wide_opcode {
                        0x15 | 0x16 | 0x19 => stack.push(locals[index]),
                        _ => locals[index] = pop(&mut stack)?,
                    }
                }
                0x57 => {
                    pop(&mut stack)?;
                }
                0x58 => {
                    // A `long` is one entry here, but two slots to the bytecode
                    if !matches!(pop(&mut stack)?, RemoteValue::Primitive(PrimitiveValue::Long(_))) {
                        pop(&mut stack)?;
                    }
                }
                0x59 => {
                    let top = pop(&mut stack)?;
                    stack.push(top);
                    stack.push(top);
                }
                0x60..=0x71 => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    let value = match (lhs, rhs) {
                        (
                            RemoteValue::Primitive(PrimitiveValue::Int(a)),
                            RemoteValue::Primitive(PrimitiveValue::Int(b)),
                        ) => match opcode {
                            0x60 => int(a.wrapping_add(b)),
                            0x64 => int(a.wrapping_sub(b)),
                            0x68 => int(a.wrapping_mul(b)),
                            0x6c | 0x70 if b == 0 => {
                                return Err(self.throw(
                                    "java.lang.ArithmeticException",
                                    Some(String::from("/ by zero")),
                                ))
                            }
                            0x6c => int(a.wrapping_div(b)),
                            _ => int(a.wrapping_rem(b)),
                        },
                        (
                            RemoteValue::Primitive(PrimitiveValue::Long(a)),
                            RemoteValue::Primitive(PrimitiveValue::Long(b)),
                        ) => match opcode {
                            0x61 => long(a.wrapping_add(b)),
                            0x65 => long(a.wrapping_sub(b)),
                            0x69 => long(a.wrapping_mul(b)),
                            0x6d | 0x71 if b == 0 => {
                                return Err(self.throw(
                                    "java.lang.ArithmeticException",
                                    Some(String::from("/ by zero")),
                                ))
                            }
                            0x6d => long(a.wrapping_div(b)),
                            _ => long(a.wrapping_rem(b)),
                        },
                        _ => return Err(verify_error(opcode)),
                    };
                    stack.push(value);
                }
                0x74 => match pop(&mut stack)? {
                    RemoteValue::Primitive(PrimitiveValue::Int(a)) => stack.push(int(a.wrapping_neg())),
                    _ => return Err(verify_error(opcode)),
                },
                0x75 => match pop(&mut stack)? {
                    RemoteValue::Primitive(PrimitiveValue::Long(a)) => stack.push(long(a.wrapping_neg())),
                    _ => return Err(verify_error(opcode)),
                },
                0x85 => match pop(&mut stack)? {
                    RemoteValue::Primitive(PrimitiveValue::Int(a)) => stack.push(long(i64::from(a))),
                    _ => return Err(verify_error(opcode)),
                },
                0xac | 0xad | 0xb0 => return pop(&mut stack),
                0xb1 => return Ok(RemoteValue::Void),
                0xb6..=0xb9 => {
                    let (class, name, descriptor) = self.method_ref(class_id, u16_at(pc))?;
                    pc += if opcode == 0xb9 { 4 } else { 2 };
                    let descriptor = MethodDescriptor::<BinaryName>::parse(&descriptor)
                        .map_err(|err| RemoteError::Protocol(err.to_string()))?;

                    let mut args = vec![];
                    for _ in &descriptor.parameters {
                        args.push(pop(&mut stack)?);
                    }
                    args.reverse();
                    let result = if opcode == 0xb8 {
                        let class_name = class.replace('/', ".");
                        let class_id = match self.find_class(&class_name, loader) {
                            Some(class_id) => class_id,
                            None => {
                                return Err(
                                    self.throw("java.lang.NoClassDefFoundError", Some(class))
                                )
                            }
                        };
                        self.call_static(class_id, &name, &descriptor, args)?
                    } else {
                        let receiver = pop(&mut stack)?;
                        self.native_instance(receiver, &name, &descriptor, &args)?
                    };
                    if result != RemoteValue::Void {
                        stack.push(widen(result));
                    }
                }
                0xbb => {
                    let class = self.class_ref(class_id, u16_at(pc))?;
                    pc += 2;
                    let object = self.alloc(
                        ObjectKind::Object,
                        HeapObject::Plain {
                            class: class.replace('/', "."),
                        },
                    );
                    stack.push(RemoteValue::Object(object));
                }
                0xbf => {
                    return match pop(&mut stack)? {
                        RemoteValue::Object(exception) => match self.object(exception)? {
                            HeapObject::Throwable { class, message } => {
                                Err(RemoteError::Exception(TargetException {
                                    exception,
                                    class_name: class.clone(),
                                    message: message.clone(),
                                }))
                            }
                            _ => Err(verify_error(opcode)),
                        },
                        _ => Err(self.throw("java.lang.NullPointerException", None)),
                    }
                }
                0xc0 => pc += 2,
                _ => return Err(verify_error(opcode)),
            }
        }
    }

    fn load_constant(&mut self, class_id: u64, index: u16) -> Result<RemoteValue, RemoteError> {
        let file = self.class_file(class_id)?;
        let value = match file.constant(ConstantIndex(index)) {
            Some(Constant::Integer(value)) => int(*value),
            Some(Constant::Long(value)) => long(*value),
            Some(Constant::String(utf8)) => {
                let string = file.utf8(*utf8).unwrap_or_default().to_owned();
                return Ok(self.alloc_string(string));
            }
            other => return Err(RemoteError::Protocol(format!("cannot load {:?}", other))),
        };
        Ok(value)
    }

    fn class_file(&self, class_id: u64) -> Result<&ClassFile, RemoteError> {
        self.class(class_id)?
            .file
            .as_ref()
            .ok_or_else(|| RemoteError::Protocol(String::from("not a loaded class file")))
    }

    fn class_ref(&self, class_id: u64, index: u16) -> Result<String, RemoteError> {
        let file = self.class_file(class_id)?;
        match file.constant(ConstantIndex(index)) {
            Some(Constant::Class(name)) => Ok(file.utf8(*name).unwrap_or_default().to_owned()),
            other => Err(RemoteError::Protocol(format!("not a class: {:?}", other))),
        }
    }

    /// Class, name, and descriptor of a method reference
    fn method_ref(&self, class_id: u64, index: u16) -> Result<(String, String, String), RemoteError> {
        let file = self.class_file(class_id)?;
        let (class, name_and_type) = match file.constant(ConstantIndex(index)) {
            Some(Constant::MethodRef {
                class,
                name_and_type,
                ..
            }) => (*class, *name_and_type),
            other => return Err(RemoteError::Protocol(format!("not a method: {:?}", other))),
        };
        match file.constant(name_and_type.0) {
            Some(Constant::NameAndType { name, descriptor }) => Ok((
                file.class_name(class).unwrap_or_default().to_owned(),
                file.utf8(*name).unwrap_or_default().to_owned(),
                file.utf8(*descriptor).unwrap_or_default().to_owned(),
            )),
            other => Err(RemoteError::Protocol(format!("not a name and type: {:?}", other))),
        }
    }

    fn native_static(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        use PrimitiveValue::{Int, Long};
        let value = match (class, name, args) {
            ("java.lang.Math", "max", [RemoteValue::Primitive(Int(a)), RemoteValue::Primitive(Int(b))]) => int(*a.max(b)),
            ("java.lang.Math", "max", [RemoteValue::Primitive(Long(a)), RemoteValue::Primitive(Long(b))]) => long(*a.max(b)),
            ("java.lang.Math", "min", [RemoteValue::Primitive(Int(a)), RemoteValue::Primitive(Int(b))]) => int(*a.min(b)),
            ("java.lang.Math", "min", [RemoteValue::Primitive(Long(a)), RemoteValue::Primitive(Long(b))]) => long(*a.min(b)),
            ("java.lang.Math", "abs", [RemoteValue::Primitive(Int(a))]) => int(a.wrapping_abs()),
            ("java.lang.Math", "abs", [RemoteValue::Primitive(Long(a))]) => long(a.wrapping_abs()),
            ("java.lang.String", "valueOf", [value]) => {
                let value = narrow(*value, descriptor.parameters.first());
                let string = self.stringify(&value);
                self.alloc_string(string)
            }
            _ => {
                return Err(RemoteError::Protocol(format!(
                    "unsupported native {}.{}{}",
                    class,
                    name,
                    descriptor.render()
                )))
            }
        };
        Ok(value)
    }

    fn native_instance(
        &mut self,
        receiver: RemoteValue,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        let receiver = match receiver {
            RemoteValue::Object(receiver) => receiver,
            _ => return Err(self.throw("java.lang.NullPointerException", None)),
        };
        let rendered = descriptor.render();
        let object = self.object(receiver)?;

        let value = match (object, name) {
            (HeapObject::Plain { class }, "<init>") => {
                let class = class.clone();
                let argument = args.first().map(|arg| self.stringify(arg));
                let replacement = match class.as_str() {
                    "java.lang.StringBuilder" => HeapObject::Builder(argument.unwrap_or_default()),
                    "java.lang.Object" => HeapObject::Plain { class },
                    _ => HeapObject::Throwable {
                        class,
                        message: args.first().and_then(|arg| match arg {
                            RemoteValue::Object(_) => argument.clone(),
                            _ => None,
                        }),
                    },
                };
                self.objects.insert(receiver.id, replacement);
                RemoteValue::Void
            }
            (HeapObject::Builder(_), "append") => {
                let appended = narrow(args[0], descriptor.parameters.first());
                let appended = self.stringify(&appended);
                if let Some(HeapObject::Builder(contents)) = self.objects.get_mut(&receiver.id) {
                    contents.push_str(&appended);
                }
                RemoteValue::Object(receiver)
            }
            (HeapObject::Builder(contents), "toString") => {
                let contents = contents.clone();
                self.alloc_string(contents)
            }
            (HeapObject::Builder(contents), "length") | (HeapObject::Str(contents), "length") => {
                int(contents.encode_utf16().count() as i32)
            }
            (HeapObject::Str(_), "toString") => RemoteValue::Object(receiver),
            (HeapObject::Str(contents), "toUpperCase") => {
                let upper = contents.to_uppercase();
                self.alloc_string(upper)
            }
            (HeapObject::Str(contents), "isEmpty") => {
                RemoteValue::Primitive(PrimitiveValue::Boolean(contents.is_empty()))
            }
            (HeapObject::Str(contents), "concat") => {
                let joined = format!("{}{}", contents, self.stringify(&args[0]));
                self.alloc_string(joined)
            }
            (HeapObject::Str(contents), "substring") => {
                let start = match args[0] {
                    RemoteValue::Primitive(PrimitiveValue::Int(start)) => start as usize,
                    _ => 0,
                };
                let rest: String = contents.chars().skip(start).collect();
                self.alloc_string(rest)
            }
            (HeapObject::Throwable { message, .. }, "getMessage") => match message.clone() {
                Some(message) => self.alloc_string(message),
                None => RemoteValue::Null,
            },
            (HeapObject::Loader { .. }, "defineClass")
                if rendered == "(Ljava/lang/String;[BII)Ljava/lang/Class;" =>
            {
                return self.define_class(receiver, args);
            }
            (_, "toString") => {
                let string = self.stringify(&RemoteValue::Object(receiver));
                self.alloc_string(string)
            }
            (other, _) => {
                return Err(RemoteError::Protocol(format!(
                    "unsupported native {}{} on {:?}",
                    name, rendered, other
                )))
            }
        };
        Ok(narrow(value, descriptor.return_type.as_ref()))
    }
}

impl Default for FakeVm {
    fn default() -> Self {
        FakeVm::new()
    }
}

impl RemoteRuntime for FakeVm {
    fn resolve_class(
        &mut self,
        name: &str,
        loader: Option<ObjectRef>,
    ) -> Result<RemoteClass, RemoteError> {
        self.calls.push(Call::ResolveClass(name.to_owned()));
        match self.find_class(name, loader) {
            Some(id) => Ok(RemoteClass {
                id,
                name: name.to_owned(),
            }),
            None => Err(RemoteError::ClassNotFound(name.to_owned())),
        }
    }

    fn new_instance(
        &mut self,
        class: &RemoteClass,
        constructor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<ObjectRef, RemoteError> {
        self.calls.push(Call::NewInstance(class.name.clone()));
        check_arguments(constructor, args)?;
        if class.name == URL_CLASS_LOADER {
            let loader = self.alloc(
                ObjectKind::ClassLoader,
                HeapObject::Loader {
                    parent: args.get(1).and_then(RemoteValue::as_object),
                },
            );
            self.loaders.push(loader);
            return Ok(self.hand_back(loader));
        }

        let object = self.alloc(
            ObjectKind::Object,
            HeapObject::Plain {
                class: class.name.clone(),
            },
        );
        self.native_instance(RemoteValue::Object(object), "<init>", constructor, args)?;
        Ok(self.hand_back(object))
    }

    fn invoke_method(
        &mut self,
        target: &InvokeTarget,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        self.calls.push(Call::Invoke(name.to_owned()));
        check_arguments(descriptor, args)?;
        for arg in args {
            if let RemoteValue::Object(object) = arg {
                self.object(*object)?;
            }
        }
        let value = match target {
            InvokeTarget::Static(class) => self.call_static(class.id, name, descriptor, args.to_vec()),
            InvokeTarget::Instance(object) => {
                self.native_instance(RemoteValue::Object(*object), name, descriptor, args)
            }
        }?;
        if let Some((method, cancellation)) = &self.cancel_on_invoke {
            if method == name {
                cancellation.cancel();
            }
        }
        if let RemoteValue::Object(object) = value {
            self.hand_back(object);
        }
        Ok(value)
    }

    fn mirror_string(&mut self, value: &str) -> Result<ObjectRef, RemoteError> {
        self.calls.push(Call::MirrorString(value.to_owned()));
        let string = self.alloc(ObjectKind::String, HeapObject::Str(value.to_owned()));
        Ok(self.hand_back(string))
    }

    fn new_array(&mut self, array_class: &RemoteClass, length: usize) -> Result<ObjectRef, RemoteError> {
        self.calls.push(Call::NewArray(array_class.name.clone(), length));
        let element = if array_class.name == "byte[]" {
            RemoteValue::Primitive(PrimitiveValue::Byte(0))
        } else {
            RemoteValue::Null
        };
        let array = self.alloc(ObjectKind::Array, HeapObject::Array(vec![element; length]));
        Ok(self.hand_back(array))
    }

    fn set_array_element(
        &mut self,
        array: ObjectRef,
        index: usize,
        value: RemoteValue,
    ) -> Result<(), RemoteError> {
        match self.objects.get_mut(&array.id) {
            Some(HeapObject::Array(values)) if index < values.len() => {
                values[index] = value;
                Ok(())
            }
            _ => Err(RemoteError::Type(format!("bad array store at {}", index))),
        }
    }

    fn set_array_region(
        &mut self,
        array: ObjectRef,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), RemoteError> {
        self.calls.push(Call::SetArray(values.len()));
        for (offset, value) in values.iter().enumerate() {
            self.set_array_element(array, first + offset, *value)?;
        }
        Ok(())
    }

    fn pin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        self.calls.push(Call::Pin(object.id));
        self.object(object)?;
        self.pinned.insert(object.id);
        self.pin_log.push(object.id);
        Ok(())
    }

    fn unpin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        self.pinned.remove(&object.id);
        Ok(())
    }

    fn platform_version(&mut self) -> Result<String, RemoteError> {
        Ok(self.version.clone())
    }

    fn context_class_loader(&mut self) -> Result<Option<ObjectRef>, RemoteError> {
        Ok(Some(self.app_loader))
    }

    fn resume(&mut self) -> Result<(), RemoteError> {
        self.resumed = true;
        Ok(())
    }
}

fn int(value: i32) -> RemoteValue {
    RemoteValue::Primitive(PrimitiveValue::Int(value))
}

fn long(value: i64) -> RemoteValue {
    RemoteValue::Primitive(PrimitiveValue::Long(value))
}

fn pop(stack: &mut Vec<RemoteValue>) -> Result<RemoteValue, RemoteError> {
    stack
        .pop()
        .ok_or_else(|| RemoteError::Protocol(String::from("operand stack underflow")))
}

fn verify_error(opcode: u8) -> RemoteError {
    RemoteError::Protocol(format!("unexpected opcode 0x{:02x}", opcode))
}

/// Sub-int values live on the operand stack as `int`
fn widen(value: RemoteValue) -> RemoteValue {
    match value {
        RemoteValue::Primitive(PrimitiveValue::Boolean(b)) => int(i32::from(b)),
        RemoteValue::Primitive(PrimitiveValue::Byte(b)) => int(i32::from(b)),
        RemoteValue::Primitive(PrimitiveValue::Short(s)) => int(i32::from(s)),
        RemoteValue::Primitive(PrimitiveValue::Char(c)) => int(i32::from(c)),
        other => other,
    }
}

/// Give an operand stack value the type a descriptor expects
fn narrow(value: RemoteValue, field_type: Option<&FieldType<BinaryName>>) -> RemoteValue {
    match (value, field_type) {
        (RemoteValue::Primitive(PrimitiveValue::Int(i)), Some(FieldType::Base(base))) => {
            match base {
                BaseType::Boolean => RemoteValue::Primitive(PrimitiveValue::Boolean(i != 0)),
                BaseType::Char => RemoteValue::Primitive(PrimitiveValue::Char(i as u16)),
                BaseType::Byte => RemoteValue::Primitive(PrimitiveValue::Byte(i as i8)),
                BaseType::Short => RemoteValue::Primitive(PrimitiveValue::Short(i as i16)),
                _ => value,
            }
        }
        _ => value,
    }
}

use super::{
    suspend_policy, Connection, Error, Location, MethodInfo, ReferenceTypeId, ThreadId,
    INVOKE_SINGLE_THREADED,
};
use crate::jvm::{
    BinaryName, FieldType, MethodDescriptor, Name, ParseDescriptor, RenderDescriptor,
    UnqualifiedName,
};
use crate::remote::{
    check_arguments, InvokeTarget, ObjectKind, ObjectRef, RemoteClass, RemoteError,
    RemoteRuntime, RemoteValue, TargetException,
};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::io::{Read, Write};

/// [`RemoteRuntime`] over a JDWP connection, running code on one suspended thread
pub struct JdwpRuntime<S> {
    connection: Connection<S>,
    thread: ThreadId,

    /// Where the thread is suspended, if known
    location: Option<Location>,

    /// Suspend policy of the event that stopped the thread (decides how to resume)
    suspend_policy: u8,

    /// Methods declared by each class seen so far
    methods: HashMap<ReferenceTypeId, Vec<MethodInfo>>,
}

impl<S: Read + Write> JdwpRuntime<S> {
    pub fn new(connection: Connection<S>, thread: ThreadId, suspend_policy: u8) -> JdwpRuntime<S> {
        JdwpRuntime {
            connection,
            thread,
            location: None,
            suspend_policy,
            methods: HashMap::new(),
        }
    }

    /// Record where the thread is suspended (its class loader becomes the context loader)
    pub fn at(mut self, location: Location) -> JdwpRuntime<S> {
        self.location = Some(location);
        self
    }

    pub fn connection(&mut self) -> &mut Connection<S> {
        &mut self.connection
    }

    /// Methods declared by a class, fetched once per connection
    fn declared_methods(&mut self, class: ReferenceTypeId) -> Result<&[MethodInfo], Error> {
        if !self.methods.contains_key(&class) {
            let methods = self.connection.methods(class)?;
            trace!("class {} declares {} method(s)", class, methods.len());
            self.methods.insert(class, methods);
        }
        Ok(self.methods.get(&class).map_or(&[][..], Vec::as_slice))
    }

    /// Find a method by name and descriptor, walking up the superclass chain
    fn find_method(
        &mut self,
        class: ReferenceTypeId,
        name: &str,
        signature: &str,
        inherited: bool,
    ) -> Result<MethodInfo, RemoteError> {
        let mut current = Some(class);
        while let Some(class) = current {
            let found = self
                .declared_methods(class)?
                .iter()
                .find(|method| method.name == name && method.signature == signature)
                .cloned();
            if let Some(method) = found {
                return Ok(method);
            }
            current = if inherited {
                self.connection.superclass(class)?
            } else {
                None
            };
        }
        Err(RemoteError::Type(format!(
            "no method {}{} in class {}",
            name, signature, class
        )))
    }

    fn class_name(&mut self, class: ReferenceTypeId) -> Result<String, RemoteError> {
        let signature = self.connection.signature(class)?;
        match FieldType::<BinaryName>::parse(&signature) {
            Ok(field_type) => Ok(field_type.java_name()),
            Err(_) => Err(RemoteError::Protocol(format!(
                "bad class signature {:?}",
                signature
            ))),
        }
    }

    /// Class name and message of an exception thrown in the target
    fn describe_exception(&mut self, exception: ObjectRef) -> TargetException {
        if let Err(err) = self.connection.disable_collection(exception.id) {
            debug!("could not pin exception {}: {}", exception.id, err);
        }
        let class_name = self
            .connection
            .object_reference_type(exception.id)
            .map_err(RemoteError::from)
            .and_then(|(_, class)| self.class_name(class))
            .unwrap_or_else(|err| {
                warn!("could not find the class of exception {}: {}", exception.id, err);
                String::from("java.lang.Throwable")
            });
        let message = self.exception_message(exception).unwrap_or_else(|err| {
            warn!("could not get the message of exception {}: {}", exception.id, err);
            None
        });
        if let Err(err) = self.connection.enable_collection(exception.id) {
            debug!("could not unpin exception {}: {}", exception.id, err);
        }
        TargetException {
            exception,
            class_name,
            message,
        }
    }

    fn exception_message(&mut self, exception: ObjectRef) -> Result<Option<String>, RemoteError> {
        let (_, class) = self.connection.object_reference_type(exception.id)?;
        let method = self.find_method(
            class,
            UnqualifiedName::GETMESSAGE.as_str(),
            "()Ljava/lang/String;",
            true,
        )?;
        let reply = self.connection.invoke_instance(
            exception.id,
            self.thread,
            class,
            method.id,
            &[],
            INVOKE_SINGLE_THREADED,
        )?;
        if reply.exception.is_some() {
            return Ok(None);
        }
        match reply.value {
            RemoteValue::Object(message) => Ok(Some(self.connection.string_value(message.id)?)),
            _ => Ok(None),
        }
    }

    fn checked<T>(&mut self, value: T, exception: Option<ObjectRef>) -> Result<T, RemoteError> {
        match exception {
            None => Ok(value),
            Some(exception) => Err(RemoteError::Exception(self.describe_exception(exception))),
        }
    }

    /// Among candidate classes, the one visible from the loader
    fn visible_from(
        &mut self,
        candidates: &[ReferenceTypeId],
        loader: Option<ObjectRef>,
    ) -> Result<Option<ReferenceTypeId>, RemoteError> {
        match loader {
            None => {
                for candidate in candidates {
                    if self.connection.class_loader(*candidate)? == 0 {
                        return Ok(Some(*candidate));
                    }
                }
                Ok(None)
            }
            Some(loader) => {
                let visible = self.connection.visible_classes(loader.id)?;
                Ok(candidates
                    .iter()
                    .copied()
                    .find(|candidate| visible.iter().any(|(_, id)| id == candidate)))
            }
        }
    }

    /// Ask the loader to load a class that the target has not loaded yet
    fn load_class(&mut self, name: &str, loader: ObjectRef) -> Result<RemoteClass, RemoteError> {
        let not_found = || RemoteError::ClassNotFound(name.to_owned());
        if name.ends_with("[]") {
            return Err(not_found());
        }

        debug!("asking class loader {} to load {}", loader.id, name);
        let (_, loader_class) = self.connection.object_reference_type(loader.id)?;
        let method = self.find_method(
            loader_class,
            UnqualifiedName::LOADCLASS.as_str(),
            "(Ljava/lang/String;)Ljava/lang/Class;",
            true,
        )?;
        let name_string = self.connection.create_string(name)?;
        self.connection.disable_collection(name_string)?;
        let reply = self.connection.invoke_instance(
            loader.id,
            self.thread,
            loader_class,
            method.id,
            &[RemoteValue::Object(ObjectRef::new(name_string, ObjectKind::String))],
            INVOKE_SINGLE_THREADED,
        );
        self.connection.enable_collection(name_string)?;
        let reply = reply?;

        if let Some(exception) = reply.exception {
            let exception = self.describe_exception(exception);
            debug!("loadClass({}) threw {}", name, exception);
            return Err(not_found());
        }
        let class_object = reply.value.as_object().ok_or_else(not_found)?;
        let (_, class) = self.connection.reflected_type(class_object.id)?;
        Ok(RemoteClass {
            id: class,
            name: name.to_owned(),
        })
    }

    /// Text shown for a value (strings by content, other objects through `toString()`)
    pub fn render(&mut self, value: &RemoteValue) -> Result<String, RemoteError> {
        match value {
            RemoteValue::Void => Ok(String::from("void")),
            RemoteValue::Null => Ok(String::from("null")),
            RemoteValue::Primitive(primitive) => Ok(primitive.to_string()),
            RemoteValue::Object(object) if object.kind == ObjectKind::String => {
                Ok(format!("{:?}", self.connection.string_value(object.id)?))
            }
            RemoteValue::Object(object) => {
                let (_, class) = self.connection.object_reference_type(object.id)?;
                let class_name = self.class_name(class)?;
                let method = self.find_method(
                    class,
                    UnqualifiedName::TOSTRING.as_str(),
                    "()Ljava/lang/String;",
                    true,
                )?;
                let reply = self.connection.invoke_instance(
                    object.id,
                    self.thread,
                    class,
                    method.id,
                    &[],
                    INVOKE_SINGLE_THREADED,
                )?;
                let text = match self.checked(reply.value, reply.exception)? {
                    RemoteValue::Object(text) => self.connection.string_value(text.id)?,
                    _ => String::from("null"),
                };
                Ok(format!("{} ({})", text, class_name))
            }
        }
    }
}

impl<S: Read + Write> RemoteRuntime for JdwpRuntime<S> {
    fn resolve_class(
        &mut self,
        name: &str,
        loader: Option<ObjectRef>,
    ) -> Result<RemoteClass, RemoteError> {
        let field_type = FieldType::<BinaryName>::from_java_name(name)
            .map_err(|_| RemoteError::ClassNotFound(name.to_owned()))?;
        let candidates: Vec<ReferenceTypeId> = self
            .connection
            .classes_by_signature(&field_type.render())?
            .iter()
            .map(|class| class.id)
            .collect();

        if let Some(id) = self.visible_from(&candidates, loader)? {
            return Ok(RemoteClass {
                id,
                name: name.to_owned(),
            });
        }
        match loader {
            Some(loader) => self.load_class(name, loader),
            None => Err(RemoteError::ClassNotFound(name.to_owned())),
        }
    }

    fn new_instance(
        &mut self,
        class: &RemoteClass,
        constructor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<ObjectRef, RemoteError> {
        check_arguments(constructor, args)?;
        let method = self.find_method(
            class.id,
            UnqualifiedName::INIT.as_str(),
            &constructor.render(),
            false,
        )?;
        let reply = self.connection.new_instance(
            class.id,
            self.thread,
            method.id,
            args,
            INVOKE_SINGLE_THREADED,
        )?;
        self.checked(reply.value, reply.exception)?
            .ok_or_else(|| RemoteError::Protocol(format!("new {} returned null", class.name)))
    }

    fn invoke_method(
        &mut self,
        target: &InvokeTarget,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        check_arguments(descriptor, args)?;
        let signature = descriptor.render();
        let reply = match target {
            InvokeTarget::Static(class) => {
                let method = self.find_method(class.id, name, &signature, true)?;
                self.connection.invoke_static(
                    class.id,
                    self.thread,
                    method.id,
                    args,
                    INVOKE_SINGLE_THREADED,
                )?
            }
            InvokeTarget::Instance(object) => {
                let (_, class) = self.connection.object_reference_type(object.id)?;
                let method = self.find_method(class, name, &signature, true)?;
                self.connection.invoke_instance(
                    object.id,
                    self.thread,
                    class,
                    method.id,
                    args,
                    INVOKE_SINGLE_THREADED,
                )?
            }
        };
        self.checked(reply.value, reply.exception)
    }

    fn mirror_string(&mut self, value: &str) -> Result<ObjectRef, RemoteError> {
        let id = self.connection.create_string(value)?;
        Ok(ObjectRef::new(id, ObjectKind::String))
    }

    fn new_array(
        &mut self,
        array_class: &RemoteClass,
        length: usize,
    ) -> Result<ObjectRef, RemoteError> {
        Ok(self.connection.new_array(array_class.id, length)?)
    }

    fn set_array_element(
        &mut self,
        array: ObjectRef,
        index: usize,
        value: RemoteValue,
    ) -> Result<(), RemoteError> {
        self.set_array_region(array, index, &[value])
    }

    fn set_array_region(
        &mut self,
        array: ObjectRef,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), RemoteError> {
        Ok(self.connection.set_array_values(array.id, first, values)?)
    }

    fn pin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        Ok(self.connection.disable_collection(object.id)?)
    }

    fn unpin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        Ok(self.connection.enable_collection(object.id)?)
    }

    fn platform_version(&mut self) -> Result<String, RemoteError> {
        Ok(self.connection.version()?.vm_version)
    }

    fn context_class_loader(&mut self) -> Result<Option<ObjectRef>, RemoteError> {
        let location = match self.location {
            Some(location) => location,
            None => return Ok(None),
        };
        let loader = self.connection.class_loader(location.class_id)?;
        Ok(if loader == 0 {
            None
        } else {
            Some(ObjectRef::new(loader, ObjectKind::ClassLoader))
        })
    }

    fn resume(&mut self) -> Result<(), RemoteError> {
        match self.suspend_policy {
            suspend_policy::NONE => Ok(()),
            suspend_policy::ALL => Ok(self.connection.resume_vm()?),
            _ => Ok(self.connection.resume_thread(self.thread)?),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jdwp::testing::ScriptedStream;
    use crate::jdwp::{error_code, tag, IdSizes};
    use crate::remote::PrimitiveValue;

    fn runtime(script: ScriptedStream) -> JdwpRuntime<ScriptedStream> {
        JdwpRuntime::new(Connection::open(script).unwrap(), 1, suspend_policy::EVENT_THREAD)
    }

    fn descriptor(source: &str) -> MethodDescriptor<BinaryName> {
        MethodDescriptor::parse(source).unwrap()
    }

    #[test]
    fn bootstrap_class_lookup() {
        let mut script = ScriptedStream::new();
        script.handshake(IdSizes::default());
        script.reply(2, 0, |writer| {
            writer.write_i32(1)?;
            writer.write_u8(3)?;
            writer.write_reference_type_id(0x30)?;
            writer.write_i32(7)
        });
        script.reply(3, 0, |writer| writer.write_object_id(0));

        let mut runtime = runtime(script);
        let class = runtime.resolve_class("byte[]", None).unwrap();
        assert_eq!(class.id, 0x30);
        assert_eq!(class.name, "byte[]");
    }

    #[test]
    fn exception_is_described() {
        let mut script = ScriptedStream::new();
        script.handshake(IdSizes::default());
        // Methods of the class
        script.reply(2, 0, |writer| {
            writer.write_i32(1)?;
            writer.write_method_id(0x50)?;
            writer.write_string("boom")?;
            writer.write_string("()I")?;
            writer.write_i32(9)
        });
        // InvokeMethod: threw
        script.reply(3, 0, |writer| {
            writer.write_u8(tag::INT)?;
            writer.write_i32(0)?;
            writer.write_u8(tag::OBJECT)?;
            writer.write_object_id(0x99)
        });
        // DisableCollection, ReferenceType, Signature
        script.reply(4, 0, |_| Ok(()));
        script.reply(5, 0, |writer| {
            writer.write_u8(1)?;
            writer.write_reference_type_id(0x70)
        });
        script.reply(6, 0, |writer| writer.write_string("Ljava/lang/RuntimeException;"));
        // ReferenceType, Methods (getMessage), InvokeMethod, StringReference.Value
        script.reply(7, 0, |writer| {
            writer.write_u8(1)?;
            writer.write_reference_type_id(0x70)
        });
        script.reply(8, 0, |writer| {
            writer.write_i32(1)?;
            writer.write_method_id(0x71)?;
            writer.write_string("getMessage")?;
            writer.write_string("()Ljava/lang/String;")?;
            writer.write_i32(1)
        });
        script.reply(9, 0, |writer| {
            writer.write_u8(tag::STRING)?;
            writer.write_object_id(0x72)?;
            writer.write_u8(tag::OBJECT)?;
            writer.write_object_id(0)
        });
        script.reply(10, 0, |writer| writer.write_string("x"));
        // EnableCollection
        script.reply(11, 0, |_| Ok(()));

        let mut runtime = runtime(script);
        let class = RemoteClass {
            id: 0x40,
            name: String::from("Eval"),
        };
        match runtime.invoke_method(&InvokeTarget::Static(class), "boom", &descriptor("()I"), &[]) {
            Err(RemoteError::Exception(exception)) => {
                assert_eq!(exception.class_name, "java.lang.RuntimeException");
                assert_eq!(exception.description(), "x");
                assert_eq!(exception.exception.id, 0x99);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn thread_state_errors() {
        let mut script = ScriptedStream::new();
        script.handshake(IdSizes::default());
        script.reply(2, 0, |writer| {
            writer.write_i32(1)?;
            writer.write_method_id(0x50)?;
            writer.write_string("f")?;
            writer.write_string("(J)V")?;
            writer.write_i32(9)
        });
        script.reply(3, error_code::THREAD_NOT_SUSPENDED, |_| Ok(()));

        let mut runtime = runtime(script);
        let class = RemoteClass {
            id: 0x40,
            name: String::from("Eval"),
        };
        let long = RemoteValue::Primitive(PrimitiveValue::Long(3));
        assert!(matches!(
            runtime.invoke_method(&InvokeTarget::Static(class.clone()), "f", &descriptor("(J)V"), &[long]),
            Err(RemoteError::IllegalState(_))
        ));

        // Rejected before anything is sent
        let int = RemoteValue::Primitive(PrimitiveValue::Int(3));
        assert!(matches!(
            runtime.invoke_method(&InvokeTarget::Static(class), "f", &descriptor("(J)V"), &[int]),
            Err(RemoteError::Type(_))
        ));
    }
}

use super::{
    Command, Connection, DataReader, DataWriter, Error, EventRequest, MethodId, ObjectId,
    ReferenceTypeId, ThreadId,
};
use crate::remote::{ObjectRef, RemoteValue};
use std::io::{self, Read, Write};

/// Invoke with only the event thread resumed
pub const INVOKE_SINGLE_THREADED: i32 = 0x01;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,

    /// Value of the `java.version` property
    pub vm_version: String,
    pub vm_name: String,
}

/// Class known to the target, as returned by `ClassesBySignature`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedClass {
    pub type_tag: u8,
    pub id: ReferenceTypeId,
    pub status: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: MethodId,
    pub name: String,
    pub signature: String,
    pub modifiers: i32,
}

/// Outcome of a method invocation: exactly one of the two is meaningful
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeReply<T> {
    pub value: T,
    pub exception: Option<ObjectRef>,
}

fn write_arguments(writer: &mut DataWriter, args: &[RemoteValue]) -> io::Result<()> {
    writer.write_len(args.len())?;
    for arg in args {
        writer.write_tagged_value(arg)?;
    }
    Ok(())
}

fn read_type_ids(reader: &mut DataReader<'_>) -> Result<Vec<(u8, ReferenceTypeId)>, Error> {
    let count = reader.read_len()?;
    let mut classes = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        classes.push((reader.read_u8()?, reader.read_reference_type_id()?));
    }
    Ok(classes)
}

impl<S: Read + Write> Connection<S> {
    pub fn version(&mut self) -> Result<VmVersion, Error> {
        let reply = self.request(Command::VM_VERSION, |_| Ok(()))?;
        let mut reader = self.reader(&reply);
        Ok(VmVersion {
            description: reader.read_string()?,
            jdwp_major: reader.read_i32()?,
            jdwp_minor: reader.read_i32()?,
            vm_version: reader.read_string()?,
            vm_name: reader.read_string()?,
        })
    }

    /// Loaded classes with this signature (`Ljava/lang/String;`), one per defining loader
    pub fn classes_by_signature(&mut self, signature: &str) -> Result<Vec<LoadedClass>, Error> {
        let reply = self.request(Command::VM_CLASSES_BY_SIGNATURE, |writer| {
            writer.write_string(signature)
        })?;
        let mut reader = self.reader(&reply);
        let count = reader.read_len()?;
        let mut classes = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            classes.push(LoadedClass {
                type_tag: reader.read_u8()?,
                id: reader.read_reference_type_id()?,
                status: reader.read_i32()?,
            });
        }
        Ok(classes)
    }

    pub fn all_threads(&mut self) -> Result<Vec<ThreadId>, Error> {
        let reply = self.request(Command::VM_ALL_THREADS, |_| Ok(()))?;
        let mut reader = self.reader(&reply);
        let count = reader.read_len()?;
        (0..count).map(|_| reader.read_object_id()).collect()
    }

    pub fn resume_vm(&mut self) -> Result<(), Error> {
        self.request(Command::VM_RESUME, |_| Ok(()))?;
        Ok(())
    }

    pub fn create_string(&mut self, value: &str) -> Result<ObjectId, Error> {
        let reply = self.request(Command::VM_CREATE_STRING, |writer| writer.write_string(value))?;
        self.reader(&reply).read_object_id()
    }

    /// JNI signature of a reference type
    pub fn signature(&mut self, class: ReferenceTypeId) -> Result<String, Error> {
        let reply = self.request(Command::REFERENCE_TYPE_SIGNATURE, |writer| {
            writer.write_reference_type_id(class)
        })?;
        self.reader(&reply).read_string()
    }

    /// Defining loader of a class (`0` for the bootstrap loader)
    pub fn class_loader(&mut self, class: ReferenceTypeId) -> Result<ObjectId, Error> {
        let reply = self.request(Command::REFERENCE_TYPE_CLASS_LOADER, |writer| {
            writer.write_reference_type_id(class)
        })?;
        self.reader(&reply).read_object_id()
    }

    /// Methods declared directly in a class
    pub fn methods(&mut self, class: ReferenceTypeId) -> Result<Vec<MethodInfo>, Error> {
        let reply = self.request(Command::REFERENCE_TYPE_METHODS, |writer| {
            writer.write_reference_type_id(class)
        })?;
        let mut reader = self.reader(&reply);
        let count = reader.read_len()?;
        let mut methods = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            methods.push(MethodInfo {
                id: reader.read_method_id()?,
                name: reader.read_string()?,
                signature: reader.read_string()?,
                modifiers: reader.read_i32()?,
            });
        }
        Ok(methods)
    }

    /// Super class (`None` for `java.lang.Object` and interfaces)
    pub fn superclass(&mut self, class: ReferenceTypeId) -> Result<Option<ReferenceTypeId>, Error> {
        let reply = self.request(Command::CLASS_TYPE_SUPERCLASS, |writer| {
            writer.write_reference_type_id(class)
        })?;
        let superclass = self.reader(&reply).read_reference_type_id()?;
        Ok(if superclass == 0 { None } else { Some(superclass) })
    }

    pub fn invoke_static(
        &mut self,
        class: ReferenceTypeId,
        thread: ThreadId,
        method: MethodId,
        args: &[RemoteValue],
        options: i32,
    ) -> Result<InvokeReply<RemoteValue>, Error> {
        let reply = self.request(Command::CLASS_TYPE_INVOKE_METHOD, |writer| {
            writer.write_reference_type_id(class)?;
            writer.write_object_id(thread)?;
            writer.write_method_id(method)?;
            write_arguments(writer, args)?;
            writer.write_i32(options)
        })?;
        let mut reader = self.reader(&reply);
        Ok(InvokeReply {
            value: reader.read_tagged_value()?,
            exception: reader.read_tagged_object()?,
        })
    }

    pub fn invoke_instance(
        &mut self,
        object: ObjectId,
        thread: ThreadId,
        class: ReferenceTypeId,
        method: MethodId,
        args: &[RemoteValue],
        options: i32,
    ) -> Result<InvokeReply<RemoteValue>, Error> {
        let reply = self.request(Command::OBJECT_INVOKE_METHOD, |writer| {
            writer.write_object_id(object)?;
            writer.write_object_id(thread)?;
            writer.write_reference_type_id(class)?;
            writer.write_method_id(method)?;
            write_arguments(writer, args)?;
            writer.write_i32(options)
        })?;
        let mut reader = self.reader(&reply);
        Ok(InvokeReply {
            value: reader.read_tagged_value()?,
            exception: reader.read_tagged_object()?,
        })
    }

    pub fn new_instance(
        &mut self,
        class: ReferenceTypeId,
        thread: ThreadId,
        constructor: MethodId,
        args: &[RemoteValue],
        options: i32,
    ) -> Result<InvokeReply<Option<ObjectRef>>, Error> {
        let reply = self.request(Command::CLASS_TYPE_NEW_INSTANCE, |writer| {
            writer.write_reference_type_id(class)?;
            writer.write_object_id(thread)?;
            writer.write_method_id(constructor)?;
            write_arguments(writer, args)?;
            writer.write_i32(options)
        })?;
        let mut reader = self.reader(&reply);
        Ok(InvokeReply {
            value: reader.read_tagged_object()?,
            exception: reader.read_tagged_object()?,
        })
    }

    pub fn new_array(&mut self, array_type: ReferenceTypeId, length: usize) -> Result<ObjectRef, Error> {
        let reply = self.request(Command::ARRAY_TYPE_NEW_INSTANCE, |writer| {
            writer.write_reference_type_id(array_type)?;
            writer.write_len(length)
        })?;
        self.reader(&reply)
            .read_tagged_object()?
            .ok_or_else(|| Error::Malformed(String::from("new array is null")))
    }

    /// Set consecutive elements (values are written untagged, matching the component type)
    pub fn set_array_values(
        &mut self,
        array: ObjectId,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), Error> {
        self.request(Command::ARRAY_SET_VALUES, |writer| {
            writer.write_object_id(array)?;
            writer.write_len(first)?;
            writer.write_len(values.len())?;
            for value in values {
                writer.write_untagged_value(value)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Runtime type of an object
    pub fn object_reference_type(&mut self, object: ObjectId) -> Result<(u8, ReferenceTypeId), Error> {
        let reply = self.request(Command::OBJECT_REFERENCE_TYPE, |writer| {
            writer.write_object_id(object)
        })?;
        let mut reader = self.reader(&reply);
        Ok((reader.read_u8()?, reader.read_reference_type_id()?))
    }

    pub fn disable_collection(&mut self, object: ObjectId) -> Result<(), Error> {
        self.request(Command::OBJECT_DISABLE_COLLECTION, |writer| {
            writer.write_object_id(object)
        })?;
        Ok(())
    }

    pub fn enable_collection(&mut self, object: ObjectId) -> Result<(), Error> {
        self.request(Command::OBJECT_ENABLE_COLLECTION, |writer| {
            writer.write_object_id(object)
        })?;
        Ok(())
    }

    pub fn string_value(&mut self, string: ObjectId) -> Result<String, Error> {
        let reply = self.request(Command::STRING_VALUE, |writer| writer.write_object_id(string))?;
        self.reader(&reply).read_string()
    }

    pub fn thread_name(&mut self, thread: ThreadId) -> Result<String, Error> {
        let reply = self.request(Command::THREAD_NAME, |writer| writer.write_object_id(thread))?;
        self.reader(&reply).read_string()
    }

    pub fn resume_thread(&mut self, thread: ThreadId) -> Result<(), Error> {
        self.request(Command::THREAD_RESUME, |writer| writer.write_object_id(thread))?;
        Ok(())
    }

    /// Classes for which the loader is an initiating loader
    pub fn visible_classes(&mut self, loader: ObjectId) -> Result<Vec<(u8, ReferenceTypeId)>, Error> {
        let reply = self.request(Command::CLASS_LOADER_VISIBLE_CLASSES, |writer| {
            writer.write_object_id(loader)
        })?;
        read_type_ids(&mut self.reader(&reply))
    }

    /// Reference type mirrored by a `java.lang.Class` object
    pub fn reflected_type(&mut self, class_object: ObjectId) -> Result<(u8, ReferenceTypeId), Error> {
        let reply = self.request(Command::CLASS_OBJECT_REFLECTED_TYPE, |writer| {
            writer.write_object_id(class_object)
        })?;
        let mut reader = self.reader(&reply);
        Ok((reader.read_u8()?, reader.read_reference_type_id()?))
    }

    /// Register an event request, returning its id
    pub fn set_event_request(&mut self, request: &EventRequest) -> Result<i32, Error> {
        let reply = self.request(Command::EVENT_REQUEST_SET, |writer| request.write(writer))?;
        self.reader(&reply).read_i32()
    }

    pub fn clear_event_request(&mut self, event_kind: u8, request_id: i32) -> Result<(), Error> {
        self.request(Command::EVENT_REQUEST_CLEAR, |writer| {
            writer.write_u8(event_kind)?;
            writer.write_i32(request_id)
        })?;
        Ok(())
    }
}

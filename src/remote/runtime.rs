use super::{ObjectRef, PrimitiveValue, RemoteClass, RemoteError, RemoteValue};
use crate::jvm::{BinaryName, MethodDescriptor, RenderDescriptor};

/// Receiver of a remote method invocation
#[derive(Clone, Debug, PartialEq)]
pub enum InvokeTarget {
    Static(RemoteClass),
    Instance(ObjectRef),
}

/// Operations on a suspended target process
///
/// Every call blocks until the target answers and is never retried. Object handles returned are
/// not pinned: callers go through [`SuspendContext`](super::SuspendContext), which pins them.
pub trait RemoteRuntime {
    /// Find a class (by Java name, eg. `java.net.URL[]`) as seen from a class loader (`None` for
    /// the bootstrap loader)
    fn resolve_class(
        &mut self,
        name: &str,
        loader: Option<ObjectRef>,
    ) -> Result<RemoteClass, RemoteError>;

    /// Allocate and construct an object
    fn new_instance(
        &mut self,
        class: &RemoteClass,
        constructor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<ObjectRef, RemoteError>;

    /// Invoke a static or instance method on the suspended thread
    fn invoke_method(
        &mut self,
        target: &InvokeTarget,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError>;

    /// Primitive values travel inline, so mirroring them needs no remote call
    fn mirror_primitive(&self, value: PrimitiveValue) -> RemoteValue {
        RemoteValue::Primitive(value)
    }

    fn mirror_string(&mut self, value: &str) -> Result<ObjectRef, RemoteError>;

    fn new_array(&mut self, array_class: &RemoteClass, length: usize)
        -> Result<ObjectRef, RemoteError>;

    fn set_array_element(
        &mut self,
        array: ObjectRef,
        index: usize,
        value: RemoteValue,
    ) -> Result<(), RemoteError>;

    /// Set consecutive elements of an array, starting at `first`
    fn set_array_region(
        &mut self,
        array: ObjectRef,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), RemoteError> {
        for (offset, value) in values.iter().enumerate() {
            self.set_array_element(array, first + offset, *value)?;
        }
        Ok(())
    }

    /// Prevent the object from being garbage collected
    fn pin(&mut self, object: ObjectRef) -> Result<(), RemoteError>;

    /// Undo [`RemoteRuntime::pin`]
    fn unpin(&mut self, object: ObjectRef) -> Result<(), RemoteError>;

    /// Version string of the target platform (eg. `17.0.2` or `1.8.0_292`)
    fn platform_version(&mut self) -> Result<String, RemoteError>;

    /// Class loader of the class whose code the thread is suspended in (`None` for bootstrap)
    fn context_class_loader(&mut self) -> Result<Option<ObjectRef>, RemoteError>;

    /// Let the suspended thread continue
    fn resume(&mut self) -> Result<(), RemoteError>;
}

impl<R: RemoteRuntime + ?Sized> RemoteRuntime for &mut R {
    fn resolve_class(
        &mut self,
        name: &str,
        loader: Option<ObjectRef>,
    ) -> Result<RemoteClass, RemoteError> {
        (**self).resolve_class(name, loader)
    }

    fn new_instance(
        &mut self,
        class: &RemoteClass,
        constructor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<ObjectRef, RemoteError> {
        (**self).new_instance(class, constructor, args)
    }

    fn invoke_method(
        &mut self,
        target: &InvokeTarget,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        (**self).invoke_method(target, name, descriptor, args)
    }

    fn mirror_primitive(&self, value: PrimitiveValue) -> RemoteValue {
        (**self).mirror_primitive(value)
    }

    fn mirror_string(&mut self, value: &str) -> Result<ObjectRef, RemoteError> {
        (**self).mirror_string(value)
    }

    fn new_array(
        &mut self,
        array_class: &RemoteClass,
        length: usize,
    ) -> Result<ObjectRef, RemoteError> {
        (**self).new_array(array_class, length)
    }

    fn set_array_element(
        &mut self,
        array: ObjectRef,
        index: usize,
        value: RemoteValue,
    ) -> Result<(), RemoteError> {
        (**self).set_array_element(array, index, value)
    }

    fn set_array_region(
        &mut self,
        array: ObjectRef,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), RemoteError> {
        (**self).set_array_region(array, first, values)
    }

    fn pin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        (**self).pin(object)
    }

    fn unpin(&mut self, object: ObjectRef) -> Result<(), RemoteError> {
        (**self).unpin(object)
    }

    fn platform_version(&mut self) -> Result<String, RemoteError> {
        (**self).platform_version()
    }

    fn context_class_loader(&mut self) -> Result<Option<ObjectRef>, RemoteError> {
        (**self).context_class_loader()
    }

    fn resume(&mut self) -> Result<(), RemoteError> {
        (**self).resume()
    }
}

/// Check that arguments match a method descriptor in number and kind
pub fn check_arguments(
    descriptor: &MethodDescriptor<BinaryName>,
    args: &[RemoteValue],
) -> Result<(), RemoteError> {
    if descriptor.parameters.len() != args.len() {
        return Err(RemoteError::Type(format!(
            "{} expects {} argument(s) but got {}",
            descriptor.render(),
            descriptor.parameters.len(),
            args.len()
        )));
    }
    for (idx, (parameter, arg)) in descriptor.parameters.iter().zip(args).enumerate() {
        if !arg.fits(parameter) {
            return Err(RemoteError::Type(format!(
                "argument {} of {} is {} but should be {}",
                idx,
                descriptor.render(),
                arg.describe_kind(),
                parameter.render()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;
    use crate::remote::ObjectKind;

    #[test]
    fn argument_checks() {
        let define: MethodDescriptor<BinaryName> =
            MethodDescriptor::parse("(Ljava/lang/String;[BII)Ljava/lang/Class;").unwrap();
        let name = RemoteValue::Object(ObjectRef::new(1, ObjectKind::String));
        let bytes = RemoteValue::Object(ObjectRef::new(2, ObjectKind::Array));
        let zero = RemoteValue::Primitive(PrimitiveValue::Int(0));

        assert!(check_arguments(&define, &[name, bytes, zero, zero]).is_ok());
        assert!(matches!(
            check_arguments(&define, &[name, bytes, zero]),
            Err(RemoteError::Type(_))
        ));
        let long = RemoteValue::Primitive(PrimitiveValue::Long(0));
        match check_arguments(&define, &[name, bytes, zero, long]) {
            Err(RemoteError::Type(message)) => {
                assert_eq!(
                    message,
                    "argument 3 of (Ljava/lang/String;[BII)Ljava/lang/Class; is long but should be I"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

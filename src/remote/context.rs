use super::{InvokeTarget, ObjectRef, RemoteClass, RemoteError, RemoteRuntime, RemoteValue};
use crate::jvm::{BinaryName, MethodDescriptor};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between an evaluation and whoever may want to stop it
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Objects pinned in the target, in the order they were pinned
#[derive(Debug, Default)]
pub struct PinSet {
    pinned: Vec<ObjectRef>,
}

impl PinSet {
    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.pinned.contains(object)
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRef> {
        self.pinned.iter()
    }
}

/// A target thread suspended for the duration of some evaluations
///
/// The context owns the runtime exclusively, so holding `&mut SuspendContext` is what guarantees a
/// single evaluation at a time. Objects created through the context are pinned right away and
/// stay pinned until the context is resumed or dropped. After cancellation, operations through the
/// context fail with [`RemoteError::Cancelled`] without reaching the target.
pub struct SuspendContext<R: RemoteRuntime> {
    runtime: R,
    pins: PinSet,
    cancellation: Cancellation,
}

impl<R: RemoteRuntime> SuspendContext<R> {
    pub fn new(runtime: R) -> SuspendContext<R> {
        SuspendContext::with_cancellation(runtime, Cancellation::new())
    }

    pub fn with_cancellation(runtime: R, cancellation: Cancellation) -> SuspendContext<R> {
        SuspendContext {
            runtime,
            pins: PinSet::default(),
            cancellation,
        }
    }

    /// Direct access to the runtime (results are not pinned)
    pub fn runtime(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    fn ensure_active(&self) -> Result<(), RemoteError> {
        if self.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Pin an object until the context is released (pinning twice is a no-op)
    ///
    /// Once cancelled, nothing is pinned: the object is left for the target to collect.
    pub fn pin(&mut self, object: ObjectRef) -> Result<ObjectRef, RemoteError> {
        if !self.pins.contains(&object) {
            self.ensure_active()?;
            self.runtime.pin(object)?;
            self.pins.pinned.push(object);
        }
        Ok(object)
    }

    /// Pin the value if it is an object
    pub fn pin_value(&mut self, value: RemoteValue) -> Result<RemoteValue, RemoteError> {
        if let RemoteValue::Object(object) = value {
            self.pin(object)?;
        }
        Ok(value)
    }

    pub fn resolve_class(
        &mut self,
        name: &str,
        loader: Option<ObjectRef>,
    ) -> Result<RemoteClass, RemoteError> {
        self.ensure_active()?;
        self.runtime.resolve_class(name, loader)
    }

    /// Construct an object, pinned
    pub fn new_instance(
        &mut self,
        class: &RemoteClass,
        constructor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<ObjectRef, RemoteError> {
        self.ensure_active()?;
        let object = self.runtime.new_instance(class, constructor, args)?;
        self.pin(object)
    }

    /// Invoke a method, pinning the result if it is an object
    pub fn invoke_method(
        &mut self,
        target: &InvokeTarget,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
        args: &[RemoteValue],
    ) -> Result<RemoteValue, RemoteError> {
        self.ensure_active()?;
        let value = self.runtime.invoke_method(target, name, descriptor, args)?;
        self.pin_value(value)
    }

    /// Create a string, pinned
    pub fn mirror_string(&mut self, value: &str) -> Result<ObjectRef, RemoteError> {
        self.ensure_active()?;
        let string = self.runtime.mirror_string(value)?;
        self.pin(string)
    }

    /// Create an array, pinned
    pub fn new_array(
        &mut self,
        array_class: &RemoteClass,
        length: usize,
    ) -> Result<ObjectRef, RemoteError> {
        self.ensure_active()?;
        let array = self.runtime.new_array(array_class, length)?;
        self.pin(array)
    }

    pub fn set_array_region(
        &mut self,
        array: ObjectRef,
        first: usize,
        values: &[RemoteValue],
    ) -> Result<(), RemoteError> {
        self.ensure_active()?;
        self.runtime.set_array_region(array, first, values)
    }

    /// Unpin everything, even if some unpins fail (the first failure is returned)
    pub fn release_pins(&mut self) -> Result<(), RemoteError> {
        let mut result = Ok(());
        let pinned = std::mem::take(&mut self.pins.pinned);
        debug!("releasing {} pinned object(s)", pinned.len());
        for object in pinned {
            if let Err(err) = self.runtime.unpin(object) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Release every pin and let the thread run again
    pub fn resume(mut self) -> Result<(), RemoteError> {
        let released = self.release_pins();
        self.runtime.resume()?;
        released
    }
}

impl<R: RemoteRuntime> Drop for SuspendContext<R> {
    fn drop(&mut self) {
        if let Err(err) = self.release_pins() {
            warn!("failed to release pinned objects: {}", err);
        }
    }
}

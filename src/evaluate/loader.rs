//! Fresh class loaders in the target, and defining classes through them

use super::{EvaluateError, Settings};
use crate::compile::CompiledUnit;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name, UnqualifiedName};
use crate::remote::{
    InvokeTarget, ObjectRef, PrimitiveValue, RemoteClass, RemoteError, RemoteRuntime,
    RemoteValue, SuspendContext,
};
use log::debug;

/// Create an empty `URLClassLoader` whose parent is the suspended frame's class loader
///
/// Both the loader and its (empty) `URL[]` are pinned in the context.
pub fn provision_loader<R: RemoteRuntime>(
    context: &mut SuspendContext<R>,
    settings: &Settings,
) -> Result<ObjectRef, RemoteError> {
    let parent = context.runtime().context_class_loader()?;
    let loader_class =
        context.resolve_class(&settings.class_loader_class.to_java_name(), parent)?;
    let urls_class = context.resolve_class(
        &FieldType::array(FieldType::object(settings.url_class.clone())).java_name(),
        parent,
    )?;

    let urls = context.new_array(&urls_class, 0)?;
    let constructor = MethodDescriptor {
        parameters: vec![
            FieldType::array(FieldType::object(settings.url_class.clone())),
            FieldType::object(BinaryName::CLASSLOADER),
        ],
        return_type: None,
    };
    let loader = context.new_instance(
        &loader_class,
        &constructor,
        &[RemoteValue::Object(urls), RemoteValue::from(parent)],
    )?;
    debug!(
        "created {} {} with parent {:?}",
        loader_class.name,
        loader.id,
        parent.map(|parent| parent.id)
    );
    Ok(loader)
}

/// `ClassLoader.defineClass(String, byte[], int, int)`
fn define_class_descriptor() -> MethodDescriptor<BinaryName> {
    MethodDescriptor {
        parameters: vec![
            FieldType::object(BinaryName::STRING),
            FieldType::array(FieldType::byte()),
            FieldType::int(),
            FieldType::int(),
        ],
        return_type: Some(FieldType::object(BinaryName::CLASS)),
    }
}

/// Define classes (in order) through `loader`, then look up the class named `generated_name`
///
/// Classes defined before a failure stay defined: the loader is thrown away with them.
pub fn define_classes<R: RemoteRuntime>(
    context: &mut SuspendContext<R>,
    loader: ObjectRef,
    units: &[CompiledUnit],
    generated_name: &str,
) -> Result<RemoteClass, EvaluateError> {
    let byte_array = FieldType::<BinaryName>::array(FieldType::byte()).java_name();
    let byte_array_class = context
        .resolve_class(&byte_array, None)
        .map_err(EvaluateError::from_environment)?;
    let define_class = define_class_descriptor();

    for unit in units {
        let length = i32::try_from(unit.bytes.len()).map_err(|_| {
            EvaluateError::Tooling(format!("class {} is too large", unit.qualified_name))
        })?;
        let define = |context: &mut SuspendContext<R>| -> Result<(), RemoteError> {
            let name = context.mirror_string(&unit.qualified_name)?;
            let bytes = context.new_array(&byte_array_class, unit.bytes.len())?;
            let values: Vec<RemoteValue> = unit
                .bytes
                .iter()
                .map(|byte| RemoteValue::Primitive(PrimitiveValue::Byte(*byte as i8)))
                .collect();
            context.set_array_region(bytes, 0, &values)?;
            context.invoke_method(
                &InvokeTarget::Instance(loader),
                UnqualifiedName::DEFINECLASS.as_str(),
                &define_class,
                &[
                    RemoteValue::Object(name),
                    RemoteValue::Object(bytes),
                    RemoteValue::Primitive(PrimitiveValue::Int(0)),
                    RemoteValue::Primitive(PrimitiveValue::Int(length)),
                ],
            )?;
            Ok(())
        };
        define(context).map_err(EvaluateError::from_environment)?;
        debug!("defined {} ({} bytes)", unit.qualified_name, length);
    }

    context
        .resolve_class(generated_name, Some(loader))
        .map_err(|err| match err {
            RemoteError::Cancelled => EvaluateError::Cancelled,
            err => {
                debug!("generated class {} is not visible: {}", generated_name, err);
                EvaluateError::ClassResolution(generated_name.to_owned())
            }
        })
}

//! In-place rewriting of existing class files

use super::class_file::{ClassFile, ConstantsPool, Serialize};
use super::{BinaryName, Error, Name};
use log::debug;
use std::borrow::Cow;

/// Re-point the super class of a compiled class from `from` to `to`
///
/// The class is fully parsed (so malformed input is always rejected), but the output is spliced
/// together from the input bytes: existing constants keep their indices and every member,
/// attribute, and byte of code is carried over untouched. The only changes are up to two
/// constants appended to the pool (a `Utf8` and a `Class` for `to`, unless they already exist),
/// the adjusted `constant_pool_count`, and the `super_class` index.
///
/// Classes whose super class is not `from`, and interfaces, are returned unchanged. Since a
/// rewritten class no longer extends `from`, rewriting is idempotent.
pub fn rewrite_superclass<'a>(
    bytes: &'a [u8],
    from: &BinaryName,
    to: &BinaryName,
) -> Result<Cow<'a, [u8]>, Error> {
    let (class, layout) = ClassFile::parse_with_layout(bytes)?;
    let this_class = class.class_name(class.this_class).unwrap_or("<unknown>");

    if class.is_interface() {
        debug!("Not rewriting interface {}", this_class);
        return Ok(Cow::Borrowed(bytes));
    }
    match class.super_class_name() {
        Some(super_class) if super_class == *from => (),
        _ => return Ok(Cow::Borrowed(bytes)),
    }

    let mut constants = ConstantsPool::from_existing(&class.constants);
    let old_count = constants.slot_count();
    let super_class = constants.get_class(to.as_str())?;

    let mut output = Vec::with_capacity(bytes.len() + to.as_str().len() + 8);
    output.extend_from_slice(&bytes[..layout.constant_pool_count]);
    constants.slot_count().serialize(&mut output)?;
    output.extend_from_slice(&bytes[layout.constant_pool_count + 2..layout.constants_end]);
    for constant in constants.constants_from(old_count) {
        constant.serialize(&mut output)?;
    }
    let super_offset = layout.super_class();
    output.extend_from_slice(&bytes[layout.constants_end..super_offset]);
    super_class.serialize(&mut output)?;
    output.extend_from_slice(&bytes[super_offset + 2..]);

    debug!(
        "Rewrote super class of {} from {} to {}",
        this_class,
        from.as_str(),
        to.as_str()
    );
    Ok(Cow::Owned(output))
}

//! Class file generation from attributed classes

use super::ast::{BinOp, Modifiers};
use super::attr::{LocalId, Type, Typed, TypedKind, TypedMethod, TypedStmt};
use crate::jvm::class_file::{
    ClassFile, ConstantsPool, InnerClass, InnerClasses, Method, Serialize, SourceFile, Version,
};
use crate::jvm::code::{CodeBuilder, Instruction, InvokeType};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, Error, FieldType, InnerClassAccessFlags,
    MethodAccessFlags, MethodDescriptor, Name, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::Width;
use log::trace;

/// Fully attributed class, ready to be written out
#[derive(Debug)]
pub struct TypedClass {
    pub name: BinaryName,
    pub modifiers: Modifiers,

    /// Enclosing class, for nested classes
    pub outer: Option<BinaryName>,

    /// Classes declared directly inside this one
    pub members: Vec<(BinaryName, Modifiers)>,
    pub methods: Vec<TypedMethod>,

    /// Name of the source file the class came from
    pub source_file: String,
}

/// Simple name of a (possibly nested) class
fn inner_name(name: &BinaryName) -> &str {
    name.class_segment().rsplit('$').next().unwrap_or_default()
}

fn class_access_flags(modifiers: &Modifiers) -> ClassAccessFlags {
    let mut flags = ClassAccessFlags::SUPER;
    // A nested `protected` class is public at the class file level, `private` is package-private
    flags.set(
        ClassAccessFlags::PUBLIC,
        modifiers.is_public || modifiers.is_protected,
    );
    flags.set(ClassAccessFlags::FINAL, modifiers.is_final);
    flags.set(ClassAccessFlags::ABSTRACT, modifiers.is_abstract);
    flags
}

fn inner_class_access_flags(modifiers: &Modifiers) -> InnerClassAccessFlags {
    let mut flags = InnerClassAccessFlags::empty();
    flags.set(InnerClassAccessFlags::PUBLIC, modifiers.is_public);
    flags.set(InnerClassAccessFlags::PROTECTED, modifiers.is_protected);
    flags.set(InnerClassAccessFlags::PRIVATE, modifiers.is_private);
    flags.set(InnerClassAccessFlags::STATIC, modifiers.is_static);
    flags.set(InnerClassAccessFlags::FINAL, modifiers.is_final);
    flags.set(InnerClassAccessFlags::ABSTRACT, modifiers.is_abstract);
    flags
}

/// Produce the bytes of the class file for one class
pub fn generate(class: &TypedClass, version: Version) -> Result<Vec<u8>, Error> {
    let mut constants = ConstantsPool::new();
    let this_class = constants.get_class(class.name.as_str())?;
    let super_class = constants.get_class(BinaryName::OBJECT.as_str())?;

    let mut methods = vec![default_constructor(&mut constants)?];
    for method in &class.methods {
        methods.push(generate_method(&mut constants, method)?);
    }

    let source_file = constants.get_utf8(class.source_file.as_str())?;
    let mut attributes = vec![constants.get_attribute(SourceFile(source_file))?];

    let mut inner_classes = vec![];
    let entries = class
        .outer
        .iter()
        .map(|outer| (&class.name, outer, &class.modifiers))
        .chain(
            class
                .members
                .iter()
                .map(|(member, modifiers)| (member, &class.name, modifiers)),
        );
    for (inner, outer, modifiers) in entries {
        inner_classes.push(InnerClass {
            inner_class: constants.get_class(inner.as_str())?,
            outer_class: constants.get_class(outer.as_str())?,
            inner_name: constants.get_utf8(inner_name(inner))?,
            access_flags: inner_class_access_flags(modifiers),
        });
    }
    if !inner_classes.is_empty() {
        attributes.push(constants.get_attribute(InnerClasses(inner_classes))?);
    }

    let class_file = ClassFile {
        version,
        constants: constants.into_offset_vec(),
        access_flags: class_access_flags(&class.modifiers),
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods,
        attributes,
    };
    trace!("generated {:?} with {} methods", class.name, class_file.methods.len());
    Ok(class_file.to_bytes()?)
}

/// `public <init>()` delegating to `Object`
fn default_constructor(constants: &mut ConstantsPool) -> Result<Method, Error> {
    let name_index = constants.get_utf8(UnqualifiedName::INIT.as_str())?;
    let descriptor = MethodDescriptor {
        parameters: vec![],
        return_type: None,
    };
    let descriptor_index = constants.get_utf8(descriptor.render())?;

    let mut code = CodeBuilder::new(constants, 1);
    code.push_instruction(Instruction::ALoad(0))?;
    code.invoke(InvokeType::Special, &BinaryName::OBJECT, UnqualifiedName::INIT.as_str(), descriptor)?;
    code.push_instruction(Instruction::Return)?;

    Ok(Method {
        access_flags: MethodAccessFlags::PUBLIC,
        name_index,
        descriptor_index,
        attributes: vec![code.result()?],
    })
}

fn generate_method(constants: &mut ConstantsPool, method: &TypedMethod) -> Result<Method, Error> {
    let signature = &method.signature;
    let name_index = constants.get_utf8(signature.name.as_str())?;
    let descriptor_index = constants.get_utf8(signature.descriptor.render())?;

    // Parameters occupy the first slots (there is no `this`, methods are static)
    let mut slots = vec![None; method.locals.len()];
    let mut next_slot = 0;
    for (slot, parameter) in slots.iter_mut().zip(&signature.descriptor.parameters) {
        *slot = Some(u16::try_from(next_slot).map_err(|_| Error::FrameOverflow)?);
        next_slot += parameter.width();
    }

    let mut generator = MethodGenerator {
        code: CodeBuilder::new(constants, next_slot),
        locals: &method.locals,
        slots,
    };
    for stmt in &method.body {
        generator.statement(stmt, signature.descriptor.return_type.as_ref())?;
    }
    if method.falls_through {
        generator.code.return_value::<BinaryName>(None)?;
    }

    Ok(Method {
        access_flags: signature.access_flags,
        name_index,
        descriptor_index,
        attributes: vec![generator.code.result()?],
    })
}

struct MethodGenerator<'a, 'c> {
    code: CodeBuilder<'c>,
    locals: &'a [FieldType<BinaryName>],
    slots: Vec<Option<u16>>,
}

impl<'a, 'c> MethodGenerator<'a, 'c> {
    fn slot(&self, local: LocalId) -> Result<u16, Error> {
        self.slots
            .get(local)
            .copied()
            .flatten()
            .ok_or_else(|| Error::BadDescriptor(format!("local {} used before its declaration", local)))
    }

    fn statement(
        &mut self,
        stmt: &TypedStmt,
        return_type: Option<&FieldType<BinaryName>>,
    ) -> Result<(), Error> {
        match stmt {
            TypedStmt::Declare { local, init } => {
                let locals = self.locals;
                let field_type = &locals[*local];
                let slot = self.code.fresh_local(field_type)?;
                self.slots[*local] = Some(slot);
                if let Some(init) = init {
                    self.expression(init)?;
                    self.code.store(field_type, slot)?;
                }
                Ok(())
            }
            TypedStmt::Store { local, value } => {
                let slot = self.slot(*local)?;
                self.expression(value)?;
                self.code.store(&self.locals[*local], slot)
            }
            TypedStmt::Return(value) => {
                if let Some(value) = value {
                    self.expression(value)?;
                }
                self.code.return_value(return_type)
            }
            TypedStmt::Throw(value) => {
                self.expression(value)?;
                self.code.push_instruction(Instruction::AThrow)
            }
            TypedStmt::Expr(expr) => {
                self.expression(expr)?;
                match &expr.ty {
                    Type::Value(field_type) => self.code.pop(field_type),
                    Type::Null => self.code.push_instruction(Instruction::Pop),
                    Type::Void => Ok(()),
                }
            }
        }
    }

    fn expression(&mut self, typed: &Typed) -> Result<(), Error> {
        let is_long = matches!(typed.ty, Type::Value(FieldType::Base(BaseType::Long)));
        match &typed.kind {
            TypedKind::Int(value) => self.code.push_int(*value),
            TypedKind::Long(value) => self.code.push_long(*value),
            TypedKind::Str(value) => self.code.push_string(value),
            TypedKind::Bool(value) => self.code.push_int(i32::from(*value)),
            TypedKind::Null => self.code.push_instruction(Instruction::AConstNull),

            TypedKind::Local(local) => {
                let slot = self.slot(*local)?;
                self.code.load(&self.locals[*local], slot)
            }

            TypedKind::Neg(operand) => {
                self.expression(operand)?;
                self.code.push_instruction(if is_long {
                    Instruction::LNeg
                } else {
                    Instruction::INeg
                })
            }

            TypedKind::Arith(op, lhs, rhs) => {
                self.expression(lhs)?;
                self.expression(rhs)?;
                let insn = match (op, is_long) {
                    (BinOp::Add, false) => Instruction::IAdd,
                    (BinOp::Add, true) => Instruction::LAdd,
                    (BinOp::Sub, false) => Instruction::ISub,
                    (BinOp::Sub, true) => Instruction::LSub,
                    (BinOp::Mul, false) => Instruction::IMul,
                    (BinOp::Mul, true) => Instruction::LMul,
                    (BinOp::Div, false) => Instruction::IDiv,
                    (BinOp::Div, true) => Instruction::LDiv,
                    (BinOp::Rem, false) => Instruction::IRem,
                    (BinOp::Rem, true) => Instruction::LRem,
                };
                self.code.push_instruction(insn)
            }

            TypedKind::Widen(operand) => {
                self.expression(operand)?;
                self.code.push_instruction(Instruction::I2L)
            }

            TypedKind::Concat(parts) => self.concat(parts),

            TypedKind::Invoke {
                kind,
                class,
                name,
                descriptor,
                receiver,
                args,
            } => {
                if let Some(receiver) = receiver {
                    self.expression(receiver)?;
                    if *kind == InvokeType::Static {
                        if let Type::Value(field_type) = &receiver.ty {
                            self.code.pop(field_type)?;
                        }
                    }
                }
                for arg in args {
                    self.expression(arg)?;
                }
                self.code.invoke(*kind, class, name, descriptor.clone())
            }

            TypedKind::New {
                class,
                descriptor,
                args,
            } => {
                self.code.new_object(class)?;
                self.code.push_instruction(Instruction::Dup)?;
                for arg in args {
                    self.expression(arg)?;
                }
                self.code
                    .invoke(InvokeType::Special, class, UnqualifiedName::INIT.as_str(), descriptor.clone())
            }
        }
    }

    /// `new StringBuilder().append(a).append(b)...toString()`
    fn concat(&mut self, parts: &[Typed]) -> Result<(), Error> {
        let builder = BinaryName::STRINGBUILDER;
        self.code.new_object(&builder)?;
        self.code.push_instruction(Instruction::Dup)?;
        self.code.invoke(
            InvokeType::Special,
            &builder,
            UnqualifiedName::INIT.as_str(),
            MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        )?;

        for part in parts {
            self.expression(part)?;
            let parameter = match &part.ty {
                Type::Value(FieldType::Base(BaseType::Long)) => FieldType::long(),
                Type::Value(FieldType::Base(BaseType::Boolean)) => FieldType::boolean(),
                Type::Value(FieldType::Base(BaseType::Char)) => FieldType::Base(BaseType::Char),
                Type::Value(FieldType::Base(_)) => FieldType::int(),
                Type::Value(FieldType::Ref(RefType::Object(name)))
                    if *name == BinaryName::STRING =>
                {
                    FieldType::object(BinaryName::STRING)
                }
                _ => FieldType::object(BinaryName::OBJECT),
            };
            self.code.invoke(
                InvokeType::Virtual,
                &builder,
                UnqualifiedName::APPEND.as_str(),
                MethodDescriptor {
                    parameters: vec![parameter],
                    return_type: Some(FieldType::object(BinaryName::STRINGBUILDER)),
                },
            )?;
        }

        self.code.invoke(
            InvokeType::Virtual,
            &builder,
            UnqualifiedName::TOSTRING.as_str(),
            MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::object(BinaryName::STRING)),
            },
        )
    }
}

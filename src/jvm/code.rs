use super::class_file::{
    Attribute, BytecodeArray, ClassConstantIndex, Code, ConstantIndex, ConstantsPool,
    MethodRefConstantIndex, Serialize,
};
use super::{BaseType, BinaryName, Error, FieldType, MethodDescriptor, Name};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::fmt;

/// How a method is invoked
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvokeType {
    Static,
    Special,
    Virtual,
    Interface,
}

/// Subset of JVM instructions used by generated method bodies
///
/// There are no branch instructions: generated code is straight-line, so methods never need a
/// `StackMapTable`.
#[derive(Clone, PartialEq, Debug)]
pub enum Instruction {
    AConstNull,
    IConst(i32),
    LConst(i64),
    Ldc(ConstantIndex),
    Ldc2W(ConstantIndex),
    ILoad(u16),
    LLoad(u16),
    ALoad(u16),
    IStore(u16),
    LStore(u16),
    AStore(u16),
    IAdd,
    LAdd,
    ISub,
    LSub,
    IMul,
    LMul,
    IDiv,
    LDiv,
    IRem,
    LRem,
    INeg,
    LNeg,
    I2L,
    Pop,
    Pop2,
    Dup,
    New(ClassConstantIndex),
    CheckCast(ClassConstantIndex),
    Invoke {
        kind: InvokeType,
        method: MethodRefConstantIndex,
        descriptor: MethodDescriptor<BinaryName>,
    },
    AThrow,
    IReturn,
    LReturn,
    AReturn,
    Return,
}

impl Instruction {
    /// Number of stack slots popped and pushed
    pub fn stack_effect(&self) -> (usize, usize) {
        use Instruction::*;
        match self {
            AConstNull | IConst(_) | Ldc(_) | ILoad(_) | ALoad(_) | New(_) => (0, 1),
            LConst(_) | Ldc2W(_) | LLoad(_) => (0, 2),
            IStore(_) | AStore(_) | Pop | AThrow | IReturn | AReturn => (1, 0),
            LStore(_) | Pop2 | LReturn => (2, 0),
            IAdd | ISub | IMul | IDiv | IRem => (2, 1),
            LAdd | LSub | LMul | LDiv | LRem => (4, 2),
            INeg | CheckCast(_) => (1, 1),
            LNeg => (2, 2),
            I2L => (1, 2),
            Dup => (1, 2),
            Return => (0, 0),
            Invoke {
                kind, descriptor, ..
            } => {
                let pops = descriptor.parameter_length(*kind != InvokeType::Static);
                let pushes = descriptor.return_type.as_ref().map_or(0, |ret| ret.width());
                (pops, pushes)
            }
        }
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::AThrow
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::AReturn
                | Instruction::Return
        )
    }
}

/// Local variable load/store, with the short `_<n>` forms and the `wide` prefix
fn local_op<W: WriteBytesExt>(
    writer: &mut W,
    opcode: u8,
    short_opcode: u8,
    index: u16,
) -> std::io::Result<()> {
    match index {
        0..=3 => (short_opcode + index as u8).serialize(writer),
        4..=255 => {
            opcode.serialize(writer)?;
            (index as u8).serialize(writer)
        }
        _ => {
            0xc4u8.serialize(writer)?;
            opcode.serialize(writer)?;
            index.serialize(writer)
        }
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        use Instruction::*;
        match self {
            AConstNull => 0x01u8.serialize(writer)?,
            IConst(value @ -1..=5) => ((0x03 + *value) as u8).serialize(writer)?,
            IConst(value) if i8::try_from(*value).is_ok() => {
                0x10u8.serialize(writer)?;
                (*value as i8).serialize(writer)?;
            }
            IConst(value) => {
                0x11u8.serialize(writer)?;
                (*value as i16).serialize(writer)?;
            }
            LConst(value) => (0x09 + *value as u8).serialize(writer)?,
            Ldc(ConstantIndex(idx)) if *idx <= u8::MAX as u16 => {
                0x12u8.serialize(writer)?;
                (*idx as u8).serialize(writer)?;
            }
            Ldc(ConstantIndex(idx)) => {
                0x13u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Ldc2W(ConstantIndex(idx)) => {
                0x14u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            ILoad(idx) => local_op(writer, 0x15, 0x1a, *idx)?,
            LLoad(idx) => local_op(writer, 0x16, 0x1e, *idx)?,
            ALoad(idx) => local_op(writer, 0x19, 0x2a, *idx)?,
            IStore(idx) => local_op(writer, 0x36, 0x3b, *idx)?,
            LStore(idx) => local_op(writer, 0x37, 0x3f, *idx)?,
            AStore(idx) => local_op(writer, 0x3a, 0x4b, *idx)?,
            Pop => 0x57u8.serialize(writer)?,
            Pop2 => 0x58u8.serialize(writer)?,
            Dup => 0x59u8.serialize(writer)?,
            IAdd => 0x60u8.serialize(writer)?,
            LAdd => 0x61u8.serialize(writer)?,
            ISub => 0x64u8.serialize(writer)?,
            LSub => 0x65u8.serialize(writer)?,
            IMul => 0x68u8.serialize(writer)?,
            LMul => 0x69u8.serialize(writer)?,
            IDiv => 0x6cu8.serialize(writer)?,
            LDiv => 0x6du8.serialize(writer)?,
            IRem => 0x70u8.serialize(writer)?,
            LRem => 0x71u8.serialize(writer)?,
            INeg => 0x74u8.serialize(writer)?,
            LNeg => 0x75u8.serialize(writer)?,
            I2L => 0x85u8.serialize(writer)?,
            IReturn => 0xacu8.serialize(writer)?,
            LReturn => 0xadu8.serialize(writer)?,
            AReturn => 0xb0u8.serialize(writer)?,
            Return => 0xb1u8.serialize(writer)?,
            Invoke {
                kind,
                method,
                descriptor,
            } => match kind {
                InvokeType::Virtual => {
                    0xb6u8.serialize(writer)?;
                    method.serialize(writer)?;
                }
                InvokeType::Special => {
                    0xb7u8.serialize(writer)?;
                    method.serialize(writer)?;
                }
                InvokeType::Static => {
                    0xb8u8.serialize(writer)?;
                    method.serialize(writer)?;
                }
                InvokeType::Interface => {
                    0xb9u8.serialize(writer)?;
                    method.serialize(writer)?;
                    (descriptor.parameter_length(true) as u8).serialize(writer)?;
                    0u8.serialize(writer)?;
                }
            },
            New(class) => {
                0xbbu8.serialize(writer)?;
                class.serialize(writer)?;
            }
            AThrow => 0xbfu8.serialize(writer)?,
            CheckCast(class) => {
                0xc0u8.serialize(writer)?;
                class.serialize(writer)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Builder for straight-line method bodies
///
/// Tracks the operand stack depth and the highest local slot used, so that `max_stack` and
/// `max_locals` come out right, and refuses instructions that would follow a `return` or
/// `athrow`.
pub struct CodeBuilder<'a> {
    constants: &'a mut ConstantsPool,
    code: Vec<u8>,
    stack: usize,
    max_stack: usize,
    next_local: usize,
    max_locals: usize,
    reachable: bool,
}

impl<'a> CodeBuilder<'a> {
    /// Start building a method whose parameters (including `this`, when present) occupy the
    /// first `parameter_slots` locals
    pub fn new(constants: &'a mut ConstantsPool, parameter_slots: usize) -> CodeBuilder<'a> {
        CodeBuilder {
            constants,
            code: vec![],
            stack: 0,
            max_stack: 0,
            next_local: parameter_slots,
            max_locals: parameter_slots,
            reachable: true,
        }
    }

    pub fn constants(&mut self) -> &mut ConstantsPool {
        &mut *self.constants
    }

    /// Whether the next instruction could execute
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Current depth of the operand stack in slots
    pub fn stack_depth(&self) -> usize {
        self.stack
    }

    /// Reserve a fresh local variable slot for a value of the given type
    pub fn fresh_local<C>(&mut self, field_type: &FieldType<C>) -> Result<u16, Error> {
        let index = u16::try_from(self.next_local).map_err(|_| Error::FrameOverflow)?;
        self.next_local += field_type.width();
        self.max_locals = self.max_locals.max(self.next_local);
        Ok(index)
    }

    /// Push a new instruction
    pub fn push_instruction(&mut self, insn: Instruction) -> Result<(), Error> {
        let offset = self.code.len();
        if !self.reachable {
            return Err(Error::UnreachableCode {
                instruction: insn.to_string(),
                offset,
            });
        }

        let (pops, pushes) = insn.stack_effect();
        if pops > self.stack {
            return Err(Error::StackUnderflow {
                instruction: insn.to_string(),
                offset,
            });
        }
        self.stack = self.stack - pops + pushes;
        self.max_stack = self.max_stack.max(self.stack);

        insn.serialize(&mut self.code)?;
        if self.code.len() > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow {
                instruction: insn.to_string(),
                offset,
            });
        }
        if insn.is_terminal() {
            self.reachable = false;
            self.stack = 0;
        }
        Ok(())
    }

    /// Push an integer constant, using the constant pool only when it does not fit in `sipush`
    pub fn push_int(&mut self, value: i32) -> Result<(), Error> {
        if i16::try_from(value).is_ok() {
            self.push_instruction(Instruction::IConst(value))
        } else {
            let index = self.constants.get_integer(value)?;
            self.push_instruction(Instruction::Ldc(index))
        }
    }

    pub fn push_long(&mut self, value: i64) -> Result<(), Error> {
        if value == 0 || value == 1 {
            self.push_instruction(Instruction::LConst(value))
        } else {
            let index = self.constants.get_long(value)?;
            self.push_instruction(Instruction::Ldc2W(index))
        }
    }

    pub fn push_string(&mut self, value: &str) -> Result<(), Error> {
        let index = self.constants.get_string(value)?;
        self.push_instruction(Instruction::Ldc(index.0))
    }

    /// Push an invocation, adding the method reference to the constant pool
    pub fn invoke(
        &mut self,
        kind: InvokeType,
        class: &BinaryName,
        name: &str,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        let method = self.constants.get_method_ref(
            class,
            name,
            &descriptor,
            kind == InvokeType::Interface,
        )?;
        self.push_instruction(Instruction::Invoke {
            kind,
            method,
            descriptor,
        })
    }

    pub fn new_object(&mut self, class: &BinaryName) -> Result<(), Error> {
        let class = self.constants.get_class(class.as_str())?;
        self.push_instruction(Instruction::New(class))
    }

    /// Load a local variable of the given type
    pub fn load<C>(&mut self, field_type: &FieldType<C>, index: u16) -> Result<(), Error> {
        self.push_instruction(match field_type {
            FieldType::Base(BaseType::Long) => Instruction::LLoad(index),
            FieldType::Base(BaseType::Float | BaseType::Double) => {
                return Err(Error::BadDescriptor(String::from("floating point local")))
            }
            FieldType::Base(_) => Instruction::ILoad(index),
            FieldType::Ref(_) => Instruction::ALoad(index),
        })
    }

    /// Store into a local variable of the given type
    pub fn store<C>(&mut self, field_type: &FieldType<C>, index: u16) -> Result<(), Error> {
        self.push_instruction(match field_type {
            FieldType::Base(BaseType::Long) => Instruction::LStore(index),
            FieldType::Base(BaseType::Float | BaseType::Double) => {
                return Err(Error::BadDescriptor(String::from("floating point local")))
            }
            FieldType::Base(_) => Instruction::IStore(index),
            FieldType::Ref(_) => Instruction::AStore(index),
        })
    }

    /// Discard a value of the given type from the top of the stack
    pub fn pop<C>(&mut self, field_type: &FieldType<C>) -> Result<(), Error> {
        if field_type.width() == 2 {
            self.push_instruction(Instruction::Pop2)
        } else {
            self.push_instruction(Instruction::Pop)
        }
    }

    /// Return a value of the given type (or `void`)
    pub fn return_value<C>(&mut self, return_type: Option<&FieldType<C>>) -> Result<(), Error> {
        self.push_instruction(match return_type {
            None => Instruction::Return,
            Some(FieldType::Base(BaseType::Long)) => Instruction::LReturn,
            Some(FieldType::Base(BaseType::Float | BaseType::Double)) => {
                return Err(Error::BadDescriptor(String::from("floating point return")))
            }
            Some(FieldType::Base(_)) => Instruction::IReturn,
            Some(FieldType::Ref(_)) => Instruction::AReturn,
        })
    }

    /// Finish the method, producing its `Code` attribute
    pub fn result(self) -> Result<Attribute, Error> {
        let code = Code {
            max_stack: u16::try_from(self.max_stack).map_err(|_| Error::FrameOverflow)?,
            max_locals: u16::try_from(self.max_locals).map_err(|_| Error::FrameOverflow)?,
            code_array: BytecodeArray(self.code),
            exception_table: vec![],
            attributes: vec![],
        };
        self.constants.get_attribute(code)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn string_descriptor() -> MethodDescriptor<BinaryName> {
        MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::STRING)],
            return_type: Some(FieldType::object(BinaryName::STRINGBUILDER)),
        }
    }

    #[test]
    fn constant_forms() {
        let encode = |insn: Instruction| insn.to_bytes().unwrap();
        assert_eq!(encode(Instruction::IConst(-1)), vec![0x02]);
        assert_eq!(encode(Instruction::IConst(5)), vec![0x08]);
        assert_eq!(encode(Instruction::IConst(100)), vec![0x10, 100]);
        assert_eq!(encode(Instruction::IConst(-300)), vec![0x11, 0xfe, 0xd4]);
        assert_eq!(encode(Instruction::LConst(1)), vec![0x0a]);
        assert_eq!(encode(Instruction::Ldc(ConstantIndex(300))), vec![0x13, 1, 44]);
        assert_eq!(encode(Instruction::ALoad(0)), vec![0x2a]);
        assert_eq!(encode(Instruction::LStore(7)), vec![0x37, 7]);
        assert_eq!(encode(Instruction::IStore(256)), vec![0xc4, 0x36, 1, 0]);
    }

    #[test]
    fn tracks_stack_and_locals() {
        let mut pool = ConstantsPool::new();
        let mut code = CodeBuilder::new(&mut pool, 1);
        let local = code.fresh_local(&FieldType::<BinaryName>::long()).unwrap();
        assert_eq!(local, 1);
        code.push_long(40).unwrap();
        code.push_int(2).unwrap();
        code.push_instruction(Instruction::I2L).unwrap();
        assert_eq!(code.stack_depth(), 4);
        code.push_instruction(Instruction::LAdd).unwrap();
        code.store(&FieldType::<BinaryName>::long(), local).unwrap();
        code.load(&FieldType::<BinaryName>::long(), local).unwrap();
        code.return_value(Some(&FieldType::<BinaryName>::long())).unwrap();
        assert!(!code.is_reachable());

        let attribute = code.result().unwrap();
        let parsed = Code::parse(&attribute.info).unwrap();
        assert_eq!(parsed.max_stack, 4);
        assert_eq!(parsed.max_locals, 3);
        assert_eq!(
            parsed.code_array.0,
            vec![0x14, 0, 1, 0x05, 0x85, 0x61, 0x40, 0x1f, 0xad]
        );
    }

    #[test]
    fn invoke_pops_receiver_and_arguments() {
        let mut pool = ConstantsPool::new();
        let mut code = CodeBuilder::new(&mut pool, 0);
        code.new_object(&BinaryName::STRINGBUILDER).unwrap();
        code.push_string("x").unwrap();
        code.invoke(
            InvokeType::Virtual,
            &BinaryName::STRINGBUILDER,
            "append",
            string_descriptor(),
        )
        .unwrap();
        assert_eq!(code.stack_depth(), 1);
    }

    #[test]
    fn rejects_underflow_and_dead_code() {
        let mut pool = ConstantsPool::new();
        let mut code = CodeBuilder::new(&mut pool, 0);
        assert!(matches!(
            code.push_instruction(Instruction::IAdd),
            Err(Error::StackUnderflow { offset: 0, .. })
        ));
        code.push_instruction(Instruction::Return).unwrap();
        assert!(matches!(
            code.push_instruction(Instruction::Return),
            Err(Error::UnreachableCode { offset: 1, .. })
        ));
    }
}

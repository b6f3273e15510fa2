//! In-memory stand-in for a target VM's socket

use super::{Command, DataWriter, IdSizes, Packet, HANDSHAKE};
use std::io::{self, Read, Write};

/// Stream that plays back scripted bytes and records what was written to it
pub struct ScriptedStream {
    script: Vec<u8>,
    position: usize,
    pub output: Vec<u8>,
    sizes: IdSizes,
}

impl ScriptedStream {
    pub fn new() -> ScriptedStream {
        ScriptedStream {
            script: vec![],
            position: 0,
            output: vec![],
            sizes: IdSizes::default(),
        }
    }

    pub fn input(&mut self, bytes: &[u8]) {
        self.script.extend_from_slice(bytes);
    }

    /// Handshake answer followed by the reply to `IDSizes` (always command id 1)
    pub fn handshake(&mut self, sizes: IdSizes) {
        self.input(HANDSHAKE);
        self.reply(1, 0, |writer| {
            for size in [
                sizes.field_id,
                sizes.method_id,
                sizes.object_id,
                sizes.reference_type_id,
                sizes.frame_id,
            ] {
                writer.write_i32(size as i32)?;
            }
            Ok(())
        });
        self.sizes = sizes;
    }

    pub fn reply<F>(&mut self, id: u32, error_code: u16, build: F)
    where
        F: FnOnce(&mut DataWriter) -> io::Result<()>,
    {
        let mut writer = DataWriter::new(self.sizes);
        build(&mut writer).unwrap();
        Packet::Reply {
            id,
            error_code,
            data: writer.into_bytes(),
        }
        .write_to(&mut self.script)
        .unwrap();
    }

    /// Composite event with the given (already encoded) event
    pub fn event<F>(&mut self, suspend_policy: u8, build: F)
    where
        F: FnOnce(&mut DataWriter) -> io::Result<()>,
    {
        let mut writer = DataWriter::new(self.sizes);
        writer.write_u8(suspend_policy).unwrap();
        writer.write_i32(1).unwrap();
        build(&mut writer).unwrap();
        Packet::Command {
            id: 1000,
            command: Command::EVENT_COMPOSITE,
            data: writer.into_bytes(),
        }
        .write_to(&mut self.script)
        .unwrap();
    }

    /// Commands written so far (after the handshake), decoded
    pub fn sent(&self) -> Vec<Packet> {
        let mut packets = &self.output[HANDSHAKE.len()..];
        let mut sent = vec![];
        while !packets.is_empty() {
            sent.push(Packet::read_from(&mut packets).unwrap());
        }
        sent
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = (&self.script[self.position..]).read(buf)?;
        self.position += read;
        Ok(read)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

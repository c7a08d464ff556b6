//! I/O backends and stream designators
//!
//! Three backend families cover the interpreter's needs:
//!
//! - [`StdStreamBackend`]: process standard input and/or output. One type
//!   serves the single-direction standard streams and the paired
//!   `*TERMINAL-IO*` stream (read side stdin, write side stdout).
//! - [`MemoryStreamBackend`]: a seeded input text and a captured output
//!   buffer, for tests and embedders.
//! - [`FileStreamBackend`]: byte-oriented file reading or writing.
//!
//! All backends read bytes and hand them up as codepoints, the way the
//! reader expects; written codepoints are emitted as UTF-8. Each carries
//! the one-character pushback slot the stream contract requires.
//!
//! This module also interprets stream *designators* for the primitives:
//! `T` names the terminal stream, `NIL` names standard input (when
//! reading) or standard output (when writing), and anything else must
//! already be a stream value.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use skiff_core::Value;
use tracing::debug;

use crate::machine::Machine;
use crate::stream::{self, StreamBackend};
use crate::{env, text};

/// Shared handle onto a memory backend's captured output.
pub type MemoryOutput = Rc<RefCell<Vec<u8>>>;

/// Collect a memory backend's output as a string.
pub fn output_text(output: &MemoryOutput) -> String {
    String::from_utf8_lossy(&output.borrow()).into_owned()
}

/// Process standard input and/or output as a stream backend.
pub struct StdStreamBackend {
    input: Option<std::io::Stdin>,
    output: Option<std::io::Stdout>,
    pushback: Option<u32>,
    saw_eof: bool,
}

impl StdStreamBackend {
    /// Read side stdin, write side stdout: the terminal pair.
    pub fn terminal() -> StdStreamBackend {
        StdStreamBackend {
            input: Some(std::io::stdin()),
            output: Some(std::io::stdout()),
            pushback: None,
            saw_eof: false,
        }
    }

    /// Standard input only.
    pub fn input_only() -> StdStreamBackend {
        StdStreamBackend {
            input: Some(std::io::stdin()),
            output: None,
            pushback: None,
            saw_eof: false,
        }
    }

    /// Standard output only.
    pub fn output_only() -> StdStreamBackend {
        StdStreamBackend {
            input: None,
            output: Some(std::io::stdout()),
            pushback: None,
            saw_eof: false,
        }
    }
}

impl StreamBackend for StdStreamBackend {
    fn open(&mut self, readable: bool, writable: bool) -> bool {
        // The process streams are already open; refuse only a direction
        // this backend does not carry.
        (!readable || self.input.is_some()) && (!writable || self.output.is_some())
    }

    fn close(&mut self) -> bool {
        self.input = None;
        self.output = None;
        true
    }

    fn read_char(&mut self) -> Option<u32> {
        if let Some(ch) = self.pushback.take() {
            return Some(ch);
        }
        let input = self.input.as_mut()?;
        let mut byte = [0u8; 1];
        match input.lock().read(&mut byte) {
            Ok(0) | Err(_) => {
                self.saw_eof = true;
                None
            }
            Ok(_) => Some(byte[0] as u32),
        }
    }

    fn unread_char(&mut self, ch: u32) -> Option<u32> {
        if self.pushback.is_some() {
            return None;
        }
        self.pushback = Some(ch);
        Some(ch)
    }

    fn write_char(&mut self, ch: u32) -> bool {
        let Some(output) = self.output.as_mut() else {
            return false;
        };
        let Some(ch) = char::from_u32(ch) else {
            return false;
        };
        let mut encoded = [0u8; 4];
        output
            .lock()
            .write_all(ch.encode_utf8(&mut encoded).as_bytes())
            .is_ok()
    }

    fn at_eof(&mut self) -> bool {
        // Standard input cannot be probed without consuming, so only a
        // previously observed end counts.
        self.pushback.is_none() && self.saw_eof
    }
}

/// Seeded input and captured output, entirely in memory.
pub struct MemoryStreamBackend {
    input: Vec<u8>,
    position: usize,
    pushback: Option<u32>,
    output: MemoryOutput,
}

impl MemoryStreamBackend {
    pub fn with_input(input: &str) -> MemoryStreamBackend {
        MemoryStreamBackend {
            input: input.as_bytes().to_vec(),
            position: 0,
            pushback: None,
            output: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A handle onto everything written to this backend, usable after the
    /// backend has been moved into a stream.
    pub fn output_handle(&self) -> MemoryOutput {
        Rc::clone(&self.output)
    }
}

impl StreamBackend for MemoryStreamBackend {
    fn open(&mut self, _readable: bool, _writable: bool) -> bool {
        true
    }

    fn close(&mut self) -> bool {
        true
    }

    fn read_char(&mut self) -> Option<u32> {
        if let Some(ch) = self.pushback.take() {
            return Some(ch);
        }
        let byte = *self.input.get(self.position)?;
        self.position += 1;
        Some(byte as u32)
    }

    fn unread_char(&mut self, ch: u32) -> Option<u32> {
        if self.pushback.is_some() {
            return None;
        }
        self.pushback = Some(ch);
        Some(ch)
    }

    fn write_char(&mut self, ch: u32) -> bool {
        let Some(ch) = char::from_u32(ch) else {
            return false;
        };
        let mut encoded = [0u8; 4];
        self.output
            .borrow_mut()
            .extend_from_slice(ch.encode_utf8(&mut encoded).as_bytes());
        true
    }

    fn at_eof(&mut self) -> bool {
        self.pushback.is_none() && self.position >= self.input.len()
    }
}

/// A file as a byte-oriented stream, one direction at a time.
pub struct FileStreamBackend {
    file: Option<File>,
    readable: bool,
    writable: bool,
    pushback: Option<u32>,
    saw_eof: bool,
}

impl FileStreamBackend {
    /// Open a file for reading.
    pub fn open_read(path: &Path) -> std::io::Result<FileStreamBackend> {
        Ok(FileStreamBackend {
            file: Some(File::open(path)?),
            readable: true,
            writable: false,
            pushback: None,
            saw_eof: false,
        })
    }

    /// Create (or truncate) a file for writing.
    pub fn create_write(path: &Path) -> std::io::Result<FileStreamBackend> {
        Ok(FileStreamBackend {
            file: Some(File::create(path)?),
            readable: false,
            writable: true,
            pushback: None,
            saw_eof: false,
        })
    }
}

impl StreamBackend for FileStreamBackend {
    fn open(&mut self, readable: bool, writable: bool) -> bool {
        self.file.is_some() && (!readable || self.readable) && (!writable || self.writable)
    }

    fn close(&mut self) -> bool {
        self.file = None;
        true
    }

    fn read_char(&mut self) -> Option<u32> {
        if let Some(ch) = self.pushback.take() {
            return Some(ch);
        }
        if !self.readable {
            return None;
        }
        let file = self.file.as_mut()?;
        let mut byte = [0u8; 1];
        match file.read(&mut byte) {
            Ok(0) | Err(_) => {
                self.saw_eof = true;
                None
            }
            Ok(_) => Some(byte[0] as u32),
        }
    }

    fn unread_char(&mut self, ch: u32) -> Option<u32> {
        if self.pushback.is_some() {
            return None;
        }
        self.pushback = Some(ch);
        Some(ch)
    }

    fn write_char(&mut self, ch: u32) -> bool {
        if !self.writable {
            return false;
        }
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        let Some(ch) = char::from_u32(ch) else {
            return false;
        };
        let mut encoded = [0u8; 4];
        file.write_all(ch.encode_utf8(&mut encoded).as_bytes()).is_ok()
    }

    fn at_eof(&mut self) -> bool {
        self.pushback.is_none() && self.saw_eof
    }
}

/// Resolve an input-side stream designator against the environment.
pub fn input_stream(machine: &Machine, environment: Value, designator: Value) -> Value {
    let symbols = machine.symbols();
    if designator == symbols.t {
        env::get(machine, environment, symbols.terminal_io, symbols.apval, true)
    } else if designator == symbols.nil {
        env::get(
            machine,
            environment,
            symbols.standard_input,
            symbols.apval,
            true,
        )
    } else if designator.is_stream() {
        designator
    } else {
        machine.nil()
    }
}

/// Resolve an output-side stream designator against the environment.
pub fn output_stream(machine: &Machine, environment: Value, designator: Value) -> Value {
    let symbols = machine.symbols();
    if designator == symbols.t {
        env::get(machine, environment, symbols.terminal_io, symbols.apval, true)
    } else if designator == symbols.nil {
        env::get(
            machine,
            environment,
            symbols.standard_output,
            symbols.apval,
            true,
        )
    } else if designator.is_stream() {
        designator
    } else {
        machine.nil()
    }
}

/// Bind a stream under a designator symbol: `PNAME` plus `APVAL`.
fn bind_stream(machine: &Machine, environment: Value, symbol: Value, stream_value: Value) {
    let symbols = machine.symbols();
    let name = text::string_from_str(machine, crate::atom::name(machine, symbol));
    env::set(machine, environment, symbol, symbols.pname, name, false);
    env::set(machine, environment, symbol, symbols.apval, stream_value, false);
}

/// Create and bind `*TERMINAL-IO*`, `*STANDARD-INPUT*`, and
/// `*STANDARD-OUTPUT*` in the given (mutable) environment.
pub fn install_standard_streams(machine: &Machine, environment: Value) {
    let symbols = machine.symbols();

    let terminal = stream::create(machine, Box::new(StdStreamBackend::terminal()));
    stream::open(machine, terminal, machine.t(), machine.t());
    bind_stream(machine, environment, symbols.terminal_io, terminal);

    let standard_input = stream::create(machine, Box::new(StdStreamBackend::input_only()));
    stream::open(machine, standard_input, machine.t(), machine.nil());
    bind_stream(machine, environment, symbols.standard_input, standard_input);

    let standard_output = stream::create(machine, Box::new(StdStreamBackend::output_only()));
    stream::open(machine, standard_output, machine.nil(), machine.t());
    bind_stream(machine, environment, symbols.standard_output, standard_output);

    debug!("standard streams bound");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineConfig;

    #[test]
    fn test_designator_t_names_the_terminal() {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);

        let terminal = input_stream(&machine, environment, machine.t());
        assert!(terminal.is_stream());
        assert_eq!(terminal, output_stream(&machine, environment, machine.t()));
    }

    #[test]
    fn test_designator_nil_splits_by_direction() {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);

        let input = input_stream(&machine, environment, machine.nil());
        let output = output_stream(&machine, environment, machine.nil());
        assert!(input.is_stream());
        assert!(output.is_stream());
        assert_ne!(input, output);
    }

    #[test]
    fn test_designator_passes_streams_through() {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);

        let stream = stream::create(&machine, Box::new(MemoryStreamBackend::with_input("X")));
        assert_eq!(input_stream(&machine, environment, stream), stream);
    }

    #[test]
    fn test_designator_rejects_non_streams() {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);

        assert_eq!(
            input_stream(&machine, environment, Value::fixnum(3)),
            machine.nil()
        );
    }

    #[test]
    fn test_rebinding_standard_output_is_visible() {
        let mut machine = Machine::new(MachineConfig::new());
        let environment = env::create_root(&mut machine);

        let backend = MemoryStreamBackend::with_input("");
        let replacement = stream::create(&machine, Box::new(backend));
        stream::open(&machine, replacement, machine.nil(), machine.t());

        let symbols = machine.symbols();
        env::set(
            &machine,
            environment,
            symbols.standard_output,
            symbols.apval,
            replacement,
            true,
        );
        assert_eq!(
            output_stream(&machine, environment, machine.nil()),
            replacement
        );
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let machine = Machine::new(MachineConfig::new());
        let backend = MemoryStreamBackend::with_input("HI");
        let output = backend.output_handle();
        let stream_value = stream::create(&machine, Box::new(backend));
        stream::open(&machine, stream_value, machine.t(), machine.t());

        assert_eq!(
            stream::read_char(&machine, stream_value),
            Value::char(b'H' as u32)
        );
        stream::write_str(&machine, stream_value, "OUT");
        assert_eq!(output_text(&output), "OUT");
    }

    #[test]
    fn test_file_backend_reads_and_sticks_at_eof() {
        let machine = Machine::new(MachineConfig::new());
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("input.lisp");
        std::fs::write(&path, "AB").expect("write fixture");

        let backend = FileStreamBackend::open_read(&path).expect("open fixture");
        let stream_value = stream::create(&machine, Box::new(backend));
        stream::open(&machine, stream_value, machine.t(), machine.nil());

        assert_eq!(
            stream::read_char(&machine, stream_value),
            Value::char(b'A' as u32)
        );
        assert_eq!(
            stream::read_char(&machine, stream_value),
            Value::char(b'B' as u32)
        );
        assert_eq!(stream::read_char(&machine, stream_value), machine.nil());
        assert_eq!(stream::at_eof(&machine, stream_value), machine.t());
    }

    #[test]
    fn test_file_backend_writes() {
        let machine = Machine::new(MachineConfig::new());
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("output.txt");

        let backend = FileStreamBackend::create_write(&path).expect("create fixture");
        let stream_value = stream::create(&machine, Box::new(backend));
        stream::open(&machine, stream_value, machine.nil(), machine.t());
        stream::write_str(&machine, stream_value, "DATA");
        stream::close(&machine, stream_value);

        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "DATA");
    }
}

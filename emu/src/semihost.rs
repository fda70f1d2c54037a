use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::Command;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::cpu::registers::Registers;
use crate::fault::{Fault, StepOutcome};
use crate::memory::Mmu;

const SYS_OPEN: u32 = 0x01;
const SYS_CLOSE: u32 = 0x02;
const SYS_WRITEC: u32 = 0x03;
const SYS_WRITE0: u32 = 0x04;
const SYS_WRITE: u32 = 0x05;
const SYS_READ: u32 = 0x06;
const SYS_READC: u32 = 0x07;
const SYS_ISERROR: u32 = 0x08;
const SYS_ISTTY: u32 = 0x09;
const SYS_SEEK: u32 = 0x0A;
const SYS_FLEN: u32 = 0x0C;
const SYS_TMPNAM: u32 = 0x0D;
const SYS_REMOVE: u32 = 0x0E;
const SYS_RENAME: u32 = 0x0F;
const SYS_CLOCK: u32 = 0x10;
const SYS_TIME: u32 = 0x11;
const SYS_SYSTEM: u32 = 0x12;
const SYS_ERRNO: u32 = 0x13;
const SYS_GET_CMDLINE: u32 = 0x15;
const SYS_HEAPINFO: u32 = 0x16;
const SYS_KILL: u32 = 0x18;
const SYS_ELAPSED: u32 = 0x30;
const SYS_TICKFREQ: u32 = 0x31;

/// Guest handles 0, 1 and 2 are the host stdio streams; everything above
/// indexes the open-file table.
const FIRST_FILE_HANDLE: u32 = 3;

const FAILURE: u32 = u32::MAX;

const EBADF: i32 = 9;
const EINVAL: i32 = 22;

/// Host services reached through a software interrupt: r0 carries the
/// operation number, r1 the parameter block address, and the result is
/// written back to r0.
#[derive(Debug)]
pub struct Semihost {
    files: Vec<Option<File>>,
    errno: i32,
    started: Instant,
    cmdline: String,
}

impl Semihost {
    pub fn new(cmdline: String) -> Self {
        Self {
            files: Vec::new(),
            errno: 0,
            started: Instant::now(),
            cmdline,
        }
    }

    pub fn handle(
        &mut self,
        registers: &mut Registers,
        mmu: &mut Mmu,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        let operation = registers.register_at(0);
        let parameter = registers.register_at(1);
        debug!("semihosting call {operation:#04X}, parameter {parameter:#010X}");

        let result = match operation {
            SYS_OPEN => self.open(mmu, parameter)?,
            SYS_CLOSE => self.close(mmu.read_word(parameter)?),
            SYS_WRITEC => self.write_character(mmu, parameter)?,
            SYS_WRITE0 => self.write_string(mmu, parameter)?,
            SYS_WRITE => self.write(mmu, parameter)?,
            SYS_READ => self.read(mmu, parameter)?,
            SYS_READC => self.read_character(),
            SYS_ISERROR => u32::from((mmu.read_word(parameter)? as i32) < 0),
            SYS_ISTTY => u32::from(mmu.read_word(parameter)? < FIRST_FILE_HANDLE),
            SYS_SEEK => self.seek(mmu, parameter)?,
            SYS_FLEN => self.file_length(mmu.read_word(parameter)?),
            SYS_TMPNAM => self.temp_name(mmu, parameter)?,
            SYS_REMOVE => self.remove(mmu, parameter)?,
            SYS_RENAME => self.rename(mmu, parameter)?,
            SYS_CLOCK => (self.started.elapsed().as_millis() / 10) as u32,
            SYS_TIME => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs() as u32),
            SYS_SYSTEM => self.system(mmu, parameter)?,
            SYS_ERRNO => self.errno as u32,
            SYS_GET_CMDLINE => self.get_cmdline(mmu, parameter)?,
            SYS_HEAPINFO => self.heap_info(mmu, parameter)?,
            SYS_ELAPSED => {
                let ticks = self.started.elapsed().as_millis() as u64;
                mmu.write_word(parameter, ticks as u32)?;
                mmu.write_word(parameter.wrapping_add(4), (ticks >> 32) as u32)?;
                0
            }
            SYS_TICKFREQ => 1000,
            SYS_KILL => return Ok(StepOutcome::Terminate),
            _ => {
                return Err(Fault::Unimplemented {
                    address,
                    instruction: operation,
                });
            }
        };

        registers.set_register_at(0, result);
        Ok(StepOutcome::Continue)
    }

    fn host_error(&mut self, err: &io::Error) -> u32 {
        self.errno = err.raw_os_error().unwrap_or(EINVAL);
        FAILURE
    }

    fn file_mut(&mut self, handle: u32) -> Option<&mut File> {
        let index = (handle as usize).checked_sub(FIRST_FILE_HANDLE as usize)?;
        self.files.get_mut(index)?.as_mut()
    }

    fn guest_bytes(mmu: &Mmu, address: u32, length: u32) -> Result<Vec<u8>, Fault> {
        let mut bytes = Vec::with_capacity(length as usize);
        for i in 0..length {
            bytes.push(mmu.read_byte(address.wrapping_add(i))?);
        }
        Ok(bytes)
    }

    fn guest_string(mmu: &Mmu, address: u32, length: u32) -> Result<String, Fault> {
        let bytes = Self::guest_bytes(mmu, address, length)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn open(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let path_address = mmu.read_word(parameter)?;
        let mode = mmu.read_word(parameter.wrapping_add(4))?;
        let path_length = mmu.read_word(parameter.wrapping_add(8))?;
        let path = Self::guest_string(mmu, path_address, path_length)?;

        // The console pseudo-path: read modes get stdin, the rest stdout.
        if path == ":tt" {
            return Ok(u32::from(mode >= 4));
        }

        // fopen mode table: r rb r+ r+b w wb w+ w+b a ab a+ a+b
        let mut options = OpenOptions::new();
        match mode {
            0 | 1 => options.read(true),
            2 | 3 => options.read(true).write(true),
            4 | 5 => options.write(true).create(true).truncate(true),
            6 | 7 => options.read(true).write(true).create(true).truncate(true),
            8 | 9 => options.append(true).create(true),
            10 | 11 => options.read(true).append(true).create(true),
            _ => {
                self.errno = EINVAL;
                return Ok(FAILURE);
            }
        };

        match options.open(&path) {
            Ok(file) => {
                let slot = self.files.iter().position(Option::is_none);
                let index = match slot {
                    Some(index) => {
                        self.files[index] = Some(file);
                        index
                    }
                    None => {
                        self.files.push(Some(file));
                        self.files.len() - 1
                    }
                };
                Ok(index as u32 + FIRST_FILE_HANDLE)
            }
            Err(err) => Ok(self.host_error(&err)),
        }
    }

    fn close(&mut self, handle: u32) -> u32 {
        if handle < FIRST_FILE_HANDLE {
            return 0;
        }

        let index = (handle - FIRST_FILE_HANDLE) as usize;
        match self.files.get_mut(index).and_then(Option::take) {
            Some(_) => 0,
            None => {
                self.errno = EBADF;
                FAILURE
            }
        }
    }

    fn write_character(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let byte = mmu.read_byte(parameter)?;
        if let Err(err) = io::stdout().write_all(&[byte]) {
            return Ok(self.host_error(&err));
        }
        Ok(0)
    }

    fn write_string(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let mut bytes = Vec::new();
        let mut address = parameter;
        loop {
            let byte = mmu.read_byte(address)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            address = address.wrapping_add(1);
        }

        if let Err(err) = io::stdout().write_all(&bytes) {
            return Ok(self.host_error(&err));
        }
        Ok(0)
    }

    /// Result convention for SYS_WRITE and SYS_READ: the number of bytes
    /// NOT transferred, so 0 is full success.
    fn write(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let handle = mmu.read_word(parameter)?;
        let buffer = mmu.read_word(parameter.wrapping_add(4))?;
        let length = mmu.read_word(parameter.wrapping_add(8))?;
        let bytes = Self::guest_bytes(mmu, buffer, length)?;

        let outcome: io::Result<usize> = match handle {
            0 => Ok(0),
            1 => io::stdout().write_all(&bytes).map(|()| bytes.len()),
            2 => io::stderr().write_all(&bytes).map(|()| bytes.len()),
            _ => match self.file_mut(handle) {
                Some(file) => file.write(&bytes),
                None => {
                    self.errno = EBADF;
                    return Ok(length);
                }
            },
        };

        match outcome {
            Ok(written) => Ok(length - written as u32),
            Err(err) => {
                self.host_error(&err);
                Ok(length)
            }
        }
    }

    fn read(&mut self, mmu: &mut Mmu, parameter: u32) -> Result<u32, Fault> {
        let handle = mmu.read_word(parameter)?;
        let buffer = mmu.read_word(parameter.wrapping_add(4))?;
        let length = mmu.read_word(parameter.wrapping_add(8))?;

        let mut bytes = vec![0_u8; length as usize];
        let transferred = if handle == 0 {
            io::stdin().read(&mut bytes).unwrap_or(0)
        } else {
            match self.file_mut(handle) {
                Some(file) => file.read(&mut bytes).unwrap_or(0),
                None => {
                    self.errno = EBADF;
                    0
                }
            }
        };

        for (i, byte) in bytes[..transferred].iter().enumerate() {
            mmu.write_byte(buffer.wrapping_add(i as u32), *byte)?;
        }
        Ok(length - transferred as u32)
    }

    fn read_character(&mut self) -> u32 {
        let mut byte = [0_u8; 1];
        match io::stdin().read_exact(&mut byte) {
            Ok(()) => u32::from(byte[0]),
            Err(err) => self.host_error(&err),
        }
    }

    fn seek(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let handle = mmu.read_word(parameter)?;
        let position = mmu.read_word(parameter.wrapping_add(4))?;

        match self.file_mut(handle) {
            Some(file) => match file.seek(SeekFrom::Start(u64::from(position))) {
                Ok(_) => Ok(0),
                Err(err) => Ok(self.host_error(&err)),
            },
            None => {
                self.errno = EBADF;
                Ok(FAILURE)
            }
        }
    }

    fn file_length(&mut self, handle: u32) -> u32 {
        match self.file_mut(handle) {
            Some(file) => match file.metadata() {
                Ok(metadata) => metadata.len() as u32,
                Err(err) => self.host_error(&err),
            },
            None => {
                self.errno = EBADF;
                FAILURE
            }
        }
    }

    fn temp_name(&mut self, mmu: &mut Mmu, parameter: u32) -> Result<u32, Fault> {
        let buffer = mmu.read_word(parameter)?;
        let identifier = mmu.read_word(parameter.wrapping_add(4))?;
        let max_length = mmu.read_word(parameter.wrapping_add(8))?;

        let name = std::env::temp_dir()
            .join(format!("armlet-{identifier:03}"))
            .to_string_lossy()
            .into_owned();
        if name.len() as u32 + 1 > max_length {
            return Ok(FAILURE);
        }

        for (i, byte) in name.bytes().enumerate() {
            mmu.write_byte(buffer.wrapping_add(i as u32), byte)?;
        }
        mmu.write_byte(buffer.wrapping_add(name.len() as u32), 0)?;
        Ok(0)
    }

    fn remove(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let path_address = mmu.read_word(parameter)?;
        let path_length = mmu.read_word(parameter.wrapping_add(4))?;
        let path = Self::guest_string(mmu, path_address, path_length)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(0),
            Err(err) => Ok(self.host_error(&err)),
        }
    }

    fn rename(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let old_address = mmu.read_word(parameter)?;
        let old_length = mmu.read_word(parameter.wrapping_add(4))?;
        let new_address = mmu.read_word(parameter.wrapping_add(8))?;
        let new_length = mmu.read_word(parameter.wrapping_add(12))?;
        let old_path = Self::guest_string(mmu, old_address, old_length)?;
        let new_path = Self::guest_string(mmu, new_address, new_length)?;

        match fs::rename(&old_path, &new_path) {
            Ok(()) => Ok(0),
            Err(err) => Ok(self.host_error(&err)),
        }
    }

    fn system(&mut self, mmu: &Mmu, parameter: u32) -> Result<u32, Fault> {
        let command_address = mmu.read_word(parameter)?;
        let command_length = mmu.read_word(parameter.wrapping_add(4))?;
        let command = Self::guest_string(mmu, command_address, command_length)?;

        match Command::new("sh").arg("-c").arg(&command).status() {
            Ok(status) => Ok(status.code().unwrap_or(-1) as u32),
            Err(err) => Ok(self.host_error(&err)),
        }
    }

    fn get_cmdline(&mut self, mmu: &mut Mmu, parameter: u32) -> Result<u32, Fault> {
        let buffer = mmu.read_word(parameter)?;
        let buffer_length = mmu.read_word(parameter.wrapping_add(4))?;

        if self.cmdline.len() as u32 + 1 > buffer_length {
            return Ok(FAILURE);
        }

        for (i, byte) in self.cmdline.bytes().enumerate() {
            mmu.write_byte(buffer.wrapping_add(i as u32), byte)?;
        }
        mmu.write_byte(buffer.wrapping_add(self.cmdline.len() as u32), 0)?;
        mmu.write_word(parameter.wrapping_add(4), self.cmdline.len() as u32)?;
        Ok(0)
    }

    fn heap_info(&self, mmu: &mut Mmu, parameter: u32) -> Result<u32, Fault> {
        let block = mmu.read_word(parameter)?;
        mmu.write_word(block, mmu.heap_base())?;
        mmu.write_word(block.wrapping_add(4), mmu.heap_end())?;
        mmu.write_word(block.wrapping_add(8), mmu.stack_top())?;
        mmu.write_word(
            block.wrapping_add(12),
            mmu.stack_top() - mmu.stack_size(),
        )?;
        Ok(0)
    }
}

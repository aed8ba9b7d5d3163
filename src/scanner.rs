use std::io::{ErrorKind, Read};
use std::ops::Range;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bstr::ByteSlice;

use crate::parse::NEWLINE;

// Refilled only after every view handed out for the previous block is dropped.
pub struct BlockReader<R> {
    reader: R,
    buffer: Arc<Vec<u8>>,
    start: usize,
    end: usize,
    eof: bool,
    bytes_read: u64
}

impl<R: Read> BlockReader<R> {
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader,
            buffer: Arc::new(vec![0; capacity.max(1)]),
            start: 0,
            end: 0,
            eof: false,
            bytes_read: 0
        }
    }

    pub fn next_block(&mut self) -> Result<Option<Range<usize>>> {
        loop {
            if self.end > self.start || self.eof {
                let data = &self.buffer[self.start..self.end];
                if self.eof && data.is_empty() {
                    return Ok(None);
                }
                if let Some(last) = data.rfind_byte(NEWLINE) {
                    let block = self.start..self.start + last;
                    self.start += last + 1;
                    return Ok(Some(block));
                }
                if self.eof {
                    let block = self.start..self.end;
                    self.start = self.end;
                    return Ok(Some(block));
                }
            }
            self.fill()?;
        }
    }

    pub fn shared(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.buffer)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn fill(&mut self) -> Result<()> {
        let Some(buffer) = Arc::get_mut(&mut self.buffer) else {
            bail!("read buffer is still referenced by a previous block");
        };

        if self.start > 0 {
            buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == buffer.len() {
            bail!("line exceeds the {} byte read buffer", buffer.len());
        }

        loop {
            match self.reader.read(&mut buffer[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                },
                Ok(read) => {
                    self.end += read;
                    self.bytes_read += read as u64;
                    return Ok(());
                },
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("failed to read input"),
            }
        }
    }
}

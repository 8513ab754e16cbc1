//! Sequential record framer
//!
//! [`RecordStream`] walks frames from the start of a log, keeping only the
//! headers. Payload and metadata bytes are re-read on demand from the
//! stored offsets, so scanning a large log costs one small read per frame.
//!
//! A frame that is not fully available stops the stream without moving the
//! cursor. The log is append-only, so calling [`RecordStream::next_record`]
//! again after the writer appends picks up exactly where it left off.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, trace, warn};

use crate::error::Result;
use super::frame::{split_meta_len_flag, FRAME_HEADER_LEN, META_FLAG_LEN, MIN_META_LEN};
use super::record::Record;

const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Why the stream last returned `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStop {
    /// Fewer than 8 bytes after the cursor.
    End,
    /// The frame header declares more bytes than the file holds. Either a
    /// corrupt length or a frame the writer has not finished yet.
    Truncated { offset: u64, need: u64, have: u64 },
    /// The frame can never become valid; the stream will not move past it.
    Corrupt { offset: u64, reason: String },
}

enum FrameRead {
    Complete(Record),
    Stop(StreamStop),
}

pub struct RecordStream<R> {
    reader: R,
    offset: u64,
    index: u64,
    last_stop: Option<StreamStop>,
}

impl RecordStream<BufReader<File>> {
    /// Open a log file behind a 1 MiB read buffer.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        debug!(path = %path.display(), file_size, "Opened session log");
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)))
    }
}

impl<R: Read + Seek> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            index: 0,
            last_stop: None,
        }
    }

    /// File offset of the next frame to read.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Number of records produced so far (also the next record's index).
    pub fn records_read(&self) -> u64 {
        self.index
    }

    /// Reason for the most recent stop, cleared by the next successful read.
    pub fn last_stop(&self) -> Option<&StreamStop> {
        self.last_stop.as_ref()
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next frame header.
    ///
    /// Returns `Ok(None)` when no complete, valid frame is available at the
    /// cursor; see [`last_stop`](Self::last_stop) for the reason. Only
    /// failures of the underlying source are errors.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let read = match self.read_frame() {
            Ok(read) => read,
            // The source shrank between the size check and the read.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => FrameRead::Stop(StreamStop::End),
            Err(e) => return Err(e.into()),
        };

        match read {
            FrameRead::Complete(record) => {
                trace!(
                    index = record.index,
                    offset = record.file_offset,
                    type_id = record.type_id,
                    payload_len = record.payload_len,
                    "Read frame"
                );
                self.offset = record.end_offset();
                self.index += 1;
                self.last_stop = None;
                Ok(Some(record))
            }
            FrameRead::Stop(stop) => {
                match &stop {
                    StreamStop::End => trace!(offset = self.offset, "End of available data"),
                    StreamStop::Truncated { offset, need, have } => {
                        debug!(offset, need, have, "Incomplete frame, waiting for more data")
                    }
                    StreamStop::Corrupt { offset, reason } => {
                        warn!(offset, reason = %reason, "Corrupt frame, stopping")
                    }
                }
                self.last_stop = Some(stop);
                Ok(None)
            }
        }
    }

    /// Iterator over every record currently available.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { stream: self, done: false }
    }

    /// Drain all newly available records. Used for tailing a live log.
    pub fn poll_new(&mut self) -> Result<Vec<Record>> {
        self.records().collect()
    }

    pub fn read_payload(&mut self, record: &Record) -> Result<Vec<u8>> {
        self.read_range(record.payload_offset, record.payload_len as u64)
    }

    /// Raw metadata block (player id length, player id, timestamp).
    pub fn read_meta(&mut self, record: &Record) -> Result<Vec<u8>> {
        self.read_range(record.meta_offset, record.meta_len as u64)
    }

    /// The whole frame from its header through the metadata block.
    pub fn read_frame_bytes(&mut self, record: &Record) -> Result<Vec<u8>> {
        self.read_range(record.file_offset, record.frame_len())
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_frame(&mut self) -> io::Result<FrameRead> {
        let start = self.offset;
        let size = self.reader.seek(SeekFrom::End(0))?;
        let have = size.saturating_sub(start);
        if have < FRAME_HEADER_LEN {
            return Ok(FrameRead::Stop(StreamStop::End));
        }

        self.reader.seek(SeekFrom::Start(start))?;
        let type_id = self.reader.read_u32::<LittleEndian>()?;
        let payload_len = self.reader.read_u32::<LittleEndian>()?;

        let payload_offset = start + FRAME_HEADER_LEN;
        let flag_offset = payload_offset + payload_len as u64;
        if flag_offset + META_FLAG_LEN > size {
            return Ok(FrameRead::Stop(StreamStop::Truncated {
                offset: start,
                need: flag_offset + META_FLAG_LEN - start,
                have,
            }));
        }

        self.reader.seek(SeekFrom::Start(flag_offset))?;
        let (meta_len, _flags) = split_meta_len_flag(self.reader.read_u32::<LittleEndian>()?);
        if meta_len < MIN_META_LEN {
            return Ok(FrameRead::Stop(StreamStop::Corrupt {
                offset: start,
                reason: format!("metadata length {meta_len} below minimum {MIN_META_LEN}"),
            }));
        }

        let meta_offset = flag_offset + META_FLAG_LEN;
        let end = meta_offset + meta_len as u64;
        if end > size {
            return Ok(FrameRead::Stop(StreamStop::Truncated {
                offset: start,
                need: end - start,
                have,
            }));
        }

        let id_len = self.reader.read_u16::<LittleEndian>()? as u32;
        if id_len + 2 + 8 > meta_len {
            return Ok(FrameRead::Stop(StreamStop::Corrupt {
                offset: start,
                reason: format!("player id length {id_len} does not fit metadata length {meta_len}"),
            }));
        }
        let mut id = vec![0u8; id_len as usize];
        self.reader.read_exact(&mut id)?;
        let timestamp_ms = self.reader.read_u64::<LittleEndian>()?;

        Ok(FrameRead::Complete(Record {
            index: self.index,
            file_offset: start,
            type_id,
            payload_offset,
            payload_len,
            meta_offset,
            meta_len,
            player_id: String::from_utf8_lossy(&id).into_owned(),
            timestamp_ms,
        }))
    }
}

/// Iterator adapter over the records available right now.
///
/// Ends at the first stop. A later call to [`RecordStream::records`]
/// resumes from the same cursor.
pub struct Records<'a, R> {
    stream: &'a mut RecordStream<R>,
    done: bool,
}

impl<R: Read + Seek> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

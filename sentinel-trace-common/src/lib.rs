#![no_std]

#[cfg(test)]
extern crate std;
#[cfg(test)]
use std::vec::Vec;

pub const MAX_PATH_LEN: usize = 256;
pub const MAX_PROCESS_NAME_LEN: usize = 32;
pub const MAX_EXCLUDED_PATHS: usize = 10;

/// Telemetry event discriminant, stored in records as a raw `u32` so the
/// wire layout never carries a Rust enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    FileCreate = 0,
    FileRead = 1,
    FileWrite = 2,
    FileDelete = 3,
    ProcessCreate = 4,
    ProcessTerminate = 5,
    ImageLoad = 6,
    ImageUnload = 7,
    ProcessInjection = 8,
    UnsignedDriverLoad = 9,
}

/// Payload family an event type belongs to. Categories are mutually
/// exclusive per event; derived classifications keep the category of the
/// base type they replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    File,
    Process,
    Image,
}

impl EventType {
    pub fn from_u32(raw: u32) -> Option<EventType> {
        match raw {
            0 => Some(EventType::FileCreate),
            1 => Some(EventType::FileRead),
            2 => Some(EventType::FileWrite),
            3 => Some(EventType::FileDelete),
            4 => Some(EventType::ProcessCreate),
            5 => Some(EventType::ProcessTerminate),
            6 => Some(EventType::ImageLoad),
            7 => Some(EventType::ImageUnload),
            8 => Some(EventType::ProcessInjection),
            9 => Some(EventType::UnsignedDriverLoad),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::FileCreate => "file_create",
            EventType::FileRead => "file_read",
            EventType::FileWrite => "file_write",
            EventType::FileDelete => "file_delete",
            EventType::ProcessCreate => "process_create",
            EventType::ProcessTerminate => "process_terminate",
            EventType::ImageLoad => "image_load",
            EventType::ImageUnload => "image_unload",
            EventType::ProcessInjection => "process_injection",
            EventType::UnsignedDriverLoad => "unsigned_driver_load",
        }
    }

    pub fn category(self) -> EventCategory {
        match self {
            EventType::FileCreate
            | EventType::FileRead
            | EventType::FileWrite
            | EventType::FileDelete => EventCategory::File,
            EventType::ProcessCreate
            | EventType::ProcessTerminate
            | EventType::ProcessInjection => EventCategory::Process,
            EventType::ImageLoad | EventType::ImageUnload | EventType::UnsignedDriverLoad => {
                EventCategory::Image
            }
        }
    }

    /// True for the derived classifications produced by the heuristics,
    /// never emitted directly by a hook.
    pub fn is_detection(self) -> bool {
        matches!(
            self,
            EventType::ProcessInjection | EventType::UnsignedDriverLoad
        )
    }

    pub fn all() -> [EventType; 10] {
        [
            EventType::FileCreate,
            EventType::FileRead,
            EventType::FileWrite,
            EventType::FileDelete,
            EventType::ProcessCreate,
            EventType::ProcessTerminate,
            EventType::ImageLoad,
            EventType::ImageUnload,
            EventType::ProcessInjection,
            EventType::UnsignedDriverLoad,
        ]
    }
}

/// Copies `src` into `dst` leaving at least one trailing NUL, truncating
/// over-long input. The tail is zero-filled so rebuilt records stay
/// byte-for-byte deterministic.
fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src[..len]);
    for b in dst[len..].iter_mut() {
        *b = 0;
    }
}

fn str_from_nul(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    core::str::from_utf8(&bytes[..end]).unwrap_or("<invalid>")
}

/// File operation payload. All three payload records are padded to the
/// same 304-byte width so the containing union has no tail bytes of its
/// own.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FileRecord {
    pub operation_flags: u32,
    pub result: u32,
    pub path: [u8; MAX_PATH_LEN],
    pub process_name: [u8; MAX_PROCESS_NAME_LEN],
    _reserved: [u8; 8],
}

impl FileRecord {
    pub fn new() -> Self {
        Self {
            operation_flags: 0,
            result: 0,
            path: [0u8; MAX_PATH_LEN],
            process_name: [0u8; MAX_PROCESS_NAME_LEN],
            _reserved: [0u8; 8],
        }
    }

    pub fn with_path(mut self, path: &[u8]) -> Self {
        copy_truncated(&mut self.path, path);
        self
    }

    pub fn with_process_name(mut self, name: &[u8]) -> Self {
        copy_truncated(&mut self.process_name, name);
        self
    }

    pub fn with_operation_flags(mut self, flags: u32) -> Self {
        self.operation_flags = flags;
        self
    }

    pub fn with_result(mut self, result: u32) -> Self {
        self.result = result;
        self
    }

    pub fn path_as_str(&self) -> &str {
        str_from_nul(&self.path)
    }

    pub fn process_name_as_str(&self) -> &str {
        str_from_nul(&self.process_name)
    }
}

impl Default for FileRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Process lifecycle payload.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ProcessRecord {
    pub create_time: u64,
    pub parent_process_id: u32,
    is_signed: u8,
    _reserved: [u8; 3],
    pub image_path: [u8; MAX_PATH_LEN],
    pub process_name: [u8; MAX_PROCESS_NAME_LEN],
}

impl ProcessRecord {
    pub fn new() -> Self {
        Self {
            create_time: 0,
            parent_process_id: 0,
            is_signed: 0,
            _reserved: [0u8; 3],
            image_path: [0u8; MAX_PATH_LEN],
            process_name: [0u8; MAX_PROCESS_NAME_LEN],
        }
    }

    pub fn with_parent_process_id(mut self, pid: u32) -> Self {
        self.parent_process_id = pid;
        self
    }

    pub fn with_create_time(mut self, ticks: u64) -> Self {
        self.create_time = ticks;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.is_signed = signed as u8;
        self
    }

    pub fn with_image_path(mut self, path: &[u8]) -> Self {
        copy_truncated(&mut self.image_path, path);
        self
    }

    pub fn with_process_name(mut self, name: &[u8]) -> Self {
        copy_truncated(&mut self.process_name, name);
        self
    }

    pub fn is_signed(&self) -> bool {
        self.is_signed != 0
    }

    pub fn image_path_as_str(&self) -> &str {
        str_from_nul(&self.image_path)
    }

    pub fn process_name_as_str(&self) -> &str {
        str_from_nul(&self.process_name)
    }
}

impl Default for ProcessRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Image (executable module or driver) load payload. Driver loads carry
/// a zero process id and `is_driver` set.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ImageRecord {
    pub image_base: u64,
    pub image_size: u32,
    is_signed: u8,
    is_driver: u8,
    _reserved: [u8; 2],
    pub image_path: [u8; MAX_PATH_LEN],
    pub process_name: [u8; MAX_PROCESS_NAME_LEN],
}

impl ImageRecord {
    pub fn new() -> Self {
        Self {
            image_base: 0,
            image_size: 0,
            is_signed: 0,
            is_driver: 0,
            _reserved: [0u8; 2],
            image_path: [0u8; MAX_PATH_LEN],
            process_name: [0u8; MAX_PROCESS_NAME_LEN],
        }
    }

    pub fn with_image_base(mut self, base: u64) -> Self {
        self.image_base = base;
        self
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.is_signed = signed as u8;
        self
    }

    pub fn with_driver(mut self, driver: bool) -> Self {
        self.is_driver = driver as u8;
        self
    }

    pub fn with_image_path(mut self, path: &[u8]) -> Self {
        copy_truncated(&mut self.image_path, path);
        self
    }

    pub fn with_process_name(mut self, name: &[u8]) -> Self {
        copy_truncated(&mut self.process_name, name);
        self
    }

    pub fn is_signed(&self) -> bool {
        self.is_signed != 0
    }

    pub fn is_driver(&self) -> bool {
        self.is_driver != 0
    }

    pub fn image_path_as_str(&self) -> &str {
        str_from_nul(&self.image_path)
    }

    pub fn process_name_as_str(&self) -> &str {
        str_from_nul(&self.process_name)
    }
}

impl Default for ImageRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width payload storage. Every member is exactly 304 bytes of
/// integers and byte arrays, so any bit pattern is a valid value of any
/// member and reads through the wrong member cannot observe
/// uninitialized memory.
#[repr(C)]
#[derive(Clone, Copy)]
union PayloadRecord {
    file: FileRecord,
    process: ProcessRecord,
    image: ImageRecord,
}

/// Decoded view of an event payload, selected by the event category.
#[derive(Clone, Copy)]
pub enum EventPayload {
    File(FileRecord),
    Process(ProcessRecord),
    Image(ImageRecord),
}

/// The unit of record crossing the producer/consumer boundary. Fixed
/// 328-byte layout, no heap pointers, safe to copy into a pre-allocated
/// queue slot from a context that must not allocate.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TelemetryEvent {
    pub timestamp: u64,
    pub event_type: u32,
    pub process_id: u32,
    pub thread_id: u32,
    _reserved: u32,
    payload: PayloadRecord,
}

impl TelemetryEvent {
    pub fn new(kind: EventType) -> Self {
        Self {
            timestamp: 0,
            event_type: kind.as_u32(),
            process_id: 0,
            thread_id: 0,
            _reserved: 0,
            payload: PayloadRecord {
                image: ImageRecord::new(),
            },
        }
    }

    pub fn with_timestamp(mut self, ticks: u64) -> Self {
        self.timestamp = ticks;
        self
    }

    pub fn with_process_id(mut self, pid: u32) -> Self {
        self.process_id = pid;
        self
    }

    pub fn with_thread_id(mut self, tid: u32) -> Self {
        self.thread_id = tid;
        self
    }

    pub fn with_file(mut self, record: FileRecord) -> Self {
        self.payload.file = record;
        self
    }

    pub fn with_process(mut self, record: ProcessRecord) -> Self {
        self.payload.process = record;
        self
    }

    pub fn with_image(mut self, record: ImageRecord) -> Self {
        self.payload.image = record;
        self
    }

    /// Copy of this event under a different type tag; the payload is
    /// carried over untouched. Used when a heuristic upgrades a base
    /// event to a derived classification.
    pub fn reclassified(mut self, kind: EventType) -> Self {
        self.event_type = kind.as_u32();
        self
    }

    pub fn kind(&self) -> Option<EventType> {
        EventType::from_u32(self.event_type)
    }

    pub fn payload(&self) -> Option<EventPayload> {
        // Union reads are sound here: all members are the same width and
        // admit every bit pattern (see PayloadRecord).
        match self.kind()?.category() {
            EventCategory::File => Some(EventPayload::File(unsafe { self.payload.file })),
            EventCategory::Process => Some(EventPayload::Process(unsafe { self.payload.process })),
            EventCategory::Image => Some(EventPayload::Image(unsafe { self.payload.image })),
        }
    }

    pub fn file_payload(&self) -> Option<FileRecord> {
        match self.payload()? {
            EventPayload::File(record) => Some(record),
            _ => None,
        }
    }

    pub fn process_payload(&self) -> Option<ProcessRecord> {
        match self.payload()? {
            EventPayload::Process(record) => Some(record),
            _ => None,
        }
    }

    pub fn image_payload(&self) -> Option<ImageRecord> {
        match self.payload()? {
            EventPayload::Image(record) => Some(record),
            _ => None,
        }
    }
}

/// Pipeline counters. One lock scope on the producer side guards the
/// whole block, so a snapshot is internally consistent as of one
/// instant.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub total_events: u64,
    pub file_events: u64,
    pub process_events: u64,
    pub image_events: u64,
    pub injection_detections: u64,
    pub unsigned_driver_detections: u64,
    pub dropped_events: u64,
    pub buffer_overflows: u64,
}

/// Wire form of the producer-side filter. Flags are u8 booleans, paths
/// are fixed NUL-terminated slots.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FilterRecord {
    pub monitor_file_operations: u8,
    pub monitor_process_creation: u8,
    pub monitor_image_loads: u8,
    pub detect_injections: u8,
    pub detect_unsigned_drivers: u8,
    _reserved: [u8; 3],
    pub excluded_path_count: u32,
    pub excluded_paths: [[u8; MAX_PATH_LEN]; MAX_EXCLUDED_PATHS],
}

impl FilterRecord {
    /// Monitor everything, exclude nothing.
    pub fn monitor_all() -> Self {
        Self {
            monitor_file_operations: 1,
            monitor_process_creation: 1,
            monitor_image_loads: 1,
            detect_injections: 1,
            detect_unsigned_drivers: 1,
            _reserved: [0u8; 3],
            excluded_path_count: 0,
            excluded_paths: [[0u8; MAX_PATH_LEN]; MAX_EXCLUDED_PATHS],
        }
    }

    /// Appends an excluded path prefix, truncating over-long input.
    /// Returns false when all slots are taken.
    pub fn push_excluded_path(&mut self, prefix: &[u8]) -> bool {
        let index = self.excluded_path_count as usize;
        if index >= MAX_EXCLUDED_PATHS {
            return false;
        }
        copy_truncated(&mut self.excluded_paths[index], prefix);
        self.excluded_path_count += 1;
        true
    }

    pub fn excluded_path_as_str(&self, index: usize) -> Option<&str> {
        if index >= self.excluded_path_count.min(MAX_EXCLUDED_PATHS as u32) as usize {
            return None;
        }
        Some(str_from_nul(&self.excluded_paths[index]))
    }
}

impl Default for FilterRecord {
    fn default() -> Self {
        Self::monitor_all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    BufferTooSmall { required: usize, provided: usize },
}

impl core::fmt::Display for RecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecordError::BufferTooSmall { required, provided } => {
                write!(f, "buffer too small: {} < {}", provided, required)
            }
        }
    }
}

/// Byte-level view of a fixed-layout record.
///
/// # Safety
///
/// Implement only for `#[repr(C)]` types without implicit padding whose
/// fields admit every bit pattern (integers, byte arrays, unions of
/// same-width such records).
pub unsafe trait WireRecord: Copy + Sized {
    const WIRE_SIZE: usize = core::mem::size_of::<Self>();

    fn as_bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts((self as *const Self).cast::<u8>(), Self::WIRE_SIZE) }
    }

    fn read_from(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooSmall {
                required: Self::WIRE_SIZE,
                provided: buf.len(),
            });
        }
        Ok(unsafe { buf.as_ptr().cast::<Self>().read_unaligned() })
    }

    fn write_to(&self, buf: &mut [u8]) -> Result<usize, RecordError> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooSmall {
                required: Self::WIRE_SIZE,
                provided: buf.len(),
            });
        }
        buf[..Self::WIRE_SIZE].copy_from_slice(self.as_bytes());
        Ok(Self::WIRE_SIZE)
    }
}

unsafe impl WireRecord for TelemetryEvent {}
unsafe impl WireRecord for StatsRecord {}
unsafe impl WireRecord for FilterRecord {}

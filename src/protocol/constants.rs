//! Wire protocol constants

/// Default TCP port
pub const DEFAULT_PORT: u16 = 7878;

/// Default largest accepted frame, newline excluded
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024;

/// Hard ceiling for the configurable frame limit
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame delimiter
pub const FRAME_DELIMITER: u8 = b'\n';

/// Default capacity of a viewer's outbound event queue
pub const DEFAULT_VIEWER_QUEUE: usize = 256;

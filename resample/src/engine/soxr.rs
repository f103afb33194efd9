//! SoX Resampler engine.

use std::os::raw::{c_uint, c_ulong, c_void};
use std::ptr;

use tracing::debug;

use super::ffi::{self, SoxrHandle};
use super::{Engine, Progress};
use crate::config::EngineSpec;
use crate::error::EngineError;

/// Engine backed by libsoxr.
///
/// Sample bytes are handed to libsoxr as is, so this engine expects
/// native-endian data (little-endian on the supported targets).
pub struct SoxrEngine {
    handle: *mut SoxrHandle,
    input_frame_bytes: usize,
    output_frame_bytes: usize,
}

// Safety: the handle is owned exclusively and only used through &mut self.
unsafe impl Send for SoxrEngine {}

impl Drop for SoxrEngine {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ffi::soxr_delete(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

fn check(err: ffi::SoxrError) -> Result<(), EngineError> {
    match ffi::error_string(err) {
        Some(msg) if !msg.is_empty() && msg != "0" => Err(EngineError::new(msg)),
        _ => Ok(()),
    }
}

impl SoxrEngine {
    /// Creates a libsoxr resampler for the given spec.
    pub fn new(spec: &EngineSpec) -> Result<Self, EngineError> {
        let io_spec = unsafe {
            ffi::soxr_io_spec(spec.input_format.id() as c_uint, spec.output_format.id() as c_uint)
        };
        let quality_spec = unsafe { ffi::soxr_quality_spec(spec.quality.level() as c_ulong, 0) };
        let runtime_spec = unsafe { ffi::soxr_runtime_spec(spec.threads as c_uint) };

        let mut error: ffi::SoxrError = ptr::null();
        let handle = unsafe {
            ffi::soxr_create(
                spec.input_rate,
                spec.output_rate,
                spec.channels as c_uint,
                &mut error,
                &io_spec,
                &quality_spec,
                &runtime_spec,
            )
        };

        if let Err(e) = check(error) {
            if !handle.is_null() {
                unsafe { ffi::soxr_delete(handle) };
            }
            return Err(e);
        }
        if handle.is_null() {
            return Err(EngineError::new("soxr_create returned no resampler"));
        }

        debug!(threads = spec.threads, quality = %spec.quality, "soxr engine created");
        Ok(Self {
            handle,
            input_frame_bytes: spec.input_frame_bytes(),
            output_frame_bytes: spec.output_frame_bytes(),
        })
    }
}

impl Engine for SoxrEngine {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress, EngineError> {
        let mut read: usize = 0;
        let mut done: usize = 0;
        let err = unsafe {
            ffi::soxr_process(
                self.handle,
                input.as_ptr() as *const c_void,
                input.len() / self.input_frame_bytes,
                &mut read,
                output.as_mut_ptr() as *mut c_void,
                output.len() / self.output_frame_bytes,
                &mut done,
            )
        };
        check(err)?;
        Ok(Progress {
            frames_consumed: read,
            frames_produced: done,
        })
    }

    fn flush(&mut self, output: &mut [u8]) -> Result<usize, EngineError> {
        let mut done: usize = 0;
        let err = unsafe {
            ffi::soxr_process(
                self.handle,
                ptr::null(),
                0,
                ptr::null_mut(),
                output.as_mut_ptr() as *mut c_void,
                output.len() / self.output_frame_bytes,
                &mut done,
            )
        };
        check(err)?;
        Ok(done)
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        check(unsafe { ffi::soxr_clear(self.handle) })
    }
}

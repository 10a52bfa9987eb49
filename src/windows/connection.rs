//! Read-only mapping of one simulator shared memory page

use crate::{HubError, Result};
use std::ptr::NonNull;
use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

/// Physics page mapping name
pub const PHYSICS_MAPPING: &str = "Local\\acpmf_physics";
/// Graphics page mapping name
pub const GRAPHICS_MAPPING: &str = "Local\\acpmf_graphics";

/// A mapped view over a named file mapping published by the simulator
pub struct SharedPage {
    name: &'static str,
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
}

impl SharedPage {
    /// Open and map the first `len` bytes of the named mapping
    pub fn open(name: &'static str, len: usize) -> Result<Self> {
        trace!(name, len, "Opening shared memory page");

        // A missing mapping means the simulator is not running
        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|_| HubError::SharedMemory { name: name.to_string() })?
        };

        let base = unsafe {
            let ptr = MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, len);
            match NonNull::new(ptr.Value as *mut u8) {
                Some(base) => base,
                None => {
                    let win_err = windows::core::Error::from_thread();
                    let _ = CloseHandle(mapping);
                    return Err(HubError::windows_api_error("MapViewOfFile", win_err));
                }
            }
        };

        debug!(name, len, "Mapped shared memory page");
        Ok(Self { name, mapping, base, len })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Copy the current page contents out of shared memory.
    ///
    /// The simulator writes concurrently; parsers only ever see the copy.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.len];
        // SAFETY: the view is at least `len` bytes and stays mapped while self lives
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.as_ptr(), block.as_mut_ptr(), self.len);
        }
        block
    }
}

impl Drop for SharedPage {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: SharedPage only holds a mapping handle and a read-only view pointer,
// both valid from any thread
unsafe impl Send for SharedPage {}
unsafe impl Sync for SharedPage {}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use crate::producer::pages::{PHYSICS_PAGE_LEN, PhysicsPage};

    #[test]
    fn wide_names_are_nul_terminated() {
        let wide = wide_string(PHYSICS_MAPPING);
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide.len(), PHYSICS_MAPPING.len() + 1);
    }

    #[test]
    fn missing_mapping_is_shared_memory_error() {
        let result = SharedPage::open("Local\\paddock_missing_page", 16);
        assert!(matches!(result, Err(HubError::SharedMemory { .. })));
    }

    #[test]
    #[ignore = "simulator_required"]
    fn reads_live_physics_page() {
        let page = SharedPage::open(PHYSICS_MAPPING, PHYSICS_PAGE_LEN).expect("simulator running");
        let physics = PhysicsPage::parse(&page.snapshot()).expect("page is long enough");
        assert!(physics.packet_id >= 0);
    }
}

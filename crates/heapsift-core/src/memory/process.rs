use serde::Serialize;
use strum::Display;

use crate::error::{Error, Result};
use crate::memory::region::MemoryRegion;

/// Target process used when none is configured
pub const DEFAULT_PROCESS_NAME: &str = "Revolution Idol.exe";

/// Rights obtained when opening the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum AccessLevel {
    #[strum(serialize = "full")]
    Full,
    #[strum(serialize = "read+query")]
    ReadQuery,
}

/// Entry of the process list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Pick the process matching `name`: exact match first, then ASCII
/// case-insensitive.
pub fn select_process<'a>(processes: &'a [ProcessInfo], name: &str) -> Option<&'a ProcessInfo> {
    processes
        .iter()
        .find(|p| p.name == name)
        .or_else(|| processes.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
}

/// Handle to an attached process
pub struct ProcessHandle {
    pid: u32,
    name: String,
    access: AccessLevel,
    #[cfg(target_os = "windows")]
    handle: windows::Win32::Foundation::HANDLE,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    /// Find a process by executable name and open it
    pub fn open_by_name(name: &str) -> Result<Self> {
        let info = Self::find_by_name(name)?;
        let mut handle = Self::open(info.pid)?;
        handle.name = info.name;
        Ok(handle)
    }

    pub fn find_by_name(name: &str) -> Result<ProcessInfo> {
        let processes = Self::list_processes()?;
        select_process(&processes, name)
            .cloned()
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))
    }
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;

    use tracing::{debug, warn};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
        Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Memory::{
        MEM_COMMIT, MEM_IMAGE, MEM_MAPPED, MEM_PRIVATE, MEMORY_BASIC_INFORMATION, VirtualQueryEx,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_ALL_ACCESS, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    use super::*;
    use crate::memory::region::{Protection, page};

    fn wide_to_string(wide: &[u16]) -> String {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        String::from_utf16_lossy(&wide[..len])
    }

    /// Owned toolhelp snapshot, closed on drop
    struct Snapshot(HANDLE);

    impl Drop for Snapshot {
        fn drop(&mut self) {
            // SAFETY: the handle came from CreateToolhelp32Snapshot and is closed once.
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    impl ProcessHandle {
        pub fn list_processes() -> Result<Vec<ProcessInfo>> {
            // SAFETY: no pointers are passed in.
            let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
                .map(Snapshot)
                .map_err(|e| Error::ProcessOpenFailed(format!("process snapshot: {}", e)))?;

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut processes = Vec::new();
            // SAFETY: entry is a properly sized PROCESSENTRY32W.
            let mut ok = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
            while ok {
                processes.push(ProcessInfo {
                    pid: entry.th32ProcessID,
                    name: wide_to_string(&entry.szExeFile),
                });
                // SAFETY: as above.
                ok = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
            }

            Ok(processes)
        }

        /// Open with full access, falling back to read + query rights
        pub fn open(pid: u32) -> Result<Self> {
            // SAFETY: OpenProcess has no pointer arguments.
            let (handle, access) = match unsafe { OpenProcess(PROCESS_ALL_ACCESS, false, pid) } {
                Ok(handle) => (handle, AccessLevel::Full),
                Err(e) => {
                    warn!("Full access to pid {} denied ({}), retrying read-only", pid, e);
                    // SAFETY: as above.
                    let handle = unsafe {
                        OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid)
                    }
                    .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;
                    (handle, AccessLevel::ReadQuery)
                }
            };

            debug!("Opened pid {} with {} access", pid, access);
            Ok(Self {
                pid,
                name: String::new(),
                access,
                handle,
            })
        }

        /// Base address of a loaded module, matched case-insensitively
        pub fn module_base(&self, module: &str) -> Result<u64> {
            // SAFETY: no pointers are passed in.
            let snapshot = unsafe {
                CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid)
            }
            .map(Snapshot)
            .map_err(|e| Error::ProcessOpenFailed(format!("module snapshot: {}", e)))?;

            let mut entry = MODULEENTRY32W {
                dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
                ..Default::default()
            };

            // SAFETY: entry is a properly sized MODULEENTRY32W.
            let mut ok = unsafe { Module32FirstW(snapshot.0, &mut entry) }.is_ok();
            while ok {
                if wide_to_string(&entry.szModule).eq_ignore_ascii_case(module) {
                    return Ok(entry.modBaseAddr as u64);
                }
                // SAFETY: as above.
                ok = unsafe { Module32NextW(snapshot.0, &mut entry) }.is_ok();
            }

            Err(Error::ProcessNotFound(format!("module {}", module)))
        }

        pub fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; size];
            if size == 0 {
                return Ok(buffer);
            }
            let mut bytes_read = 0usize;

            // SAFETY: buffer is valid for `size` writable bytes.
            unsafe {
                ReadProcessMemory(
                    self.handle,
                    address as *const c_void,
                    buffer.as_mut_ptr() as *mut c_void,
                    size,
                    Some(&mut bytes_read as *mut usize),
                )
            }
            .map_err(|e| Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            })?;

            buffer.truncate(bytes_read);
            Ok(buffer)
        }

        pub fn write_memory(&self, address: u64, bytes: &[u8]) -> Result<()> {
            let mut written = 0usize;

            // SAFETY: bytes is valid for `bytes.len()` readable bytes.
            unsafe {
                WriteProcessMemory(
                    self.handle,
                    address as *const c_void,
                    bytes.as_ptr() as *const c_void,
                    bytes.len(),
                    Some(&mut written as *mut usize),
                )
            }
            .map_err(|e| Error::MemoryWriteFailed {
                address,
                message: e.to_string(),
            })?;

            if written != bytes.len() {
                return Err(Error::MemoryWriteFailed {
                    address,
                    message: format!("partial write: {} of {} bytes", written, bytes.len()),
                });
            }
            Ok(())
        }

        /// Committed regions of the address space
        pub fn regions(&self) -> Result<Vec<MemoryRegion>> {
            let mut regions = Vec::new();
            let mut address = 0u64;

            loop {
                let mut mbi = MEMORY_BASIC_INFORMATION::default();
                // SAFETY: mbi is a properly sized out parameter.
                let written = unsafe {
                    VirtualQueryEx(
                        self.handle,
                        Some(address as *const c_void),
                        &mut mbi,
                        std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                    )
                };
                if written == 0 {
                    break;
                }

                let base = mbi.BaseAddress as u64;
                let size = mbi.RegionSize as u64;

                if mbi.State == MEM_COMMIT {
                    let protection = Protection::from_raw(mbi.Protect.0);
                    let kind = if mbi.Type == MEM_IMAGE {
                        "IMAGE"
                    } else if mbi.Type == MEM_MAPPED {
                        "MAPPED"
                    } else if mbi.Type == MEM_PRIVATE {
                        "PRIVATE"
                    } else {
                        "UNKNOWN"
                    };
                    regions.push(MemoryRegion::new(
                        base,
                        size,
                        protection,
                        format!("{}{}", kind, protection_suffix(protection.raw())),
                    ));
                }

                match base.checked_add(size) {
                    Some(next) if next > address => address = next,
                    _ => break,
                }
            }

            debug!("Enumerated {} committed regions", regions.len());
            Ok(regions)
        }
    }

    fn protection_suffix(raw: u32) -> &'static str {
        match raw & 0xFF {
            page::READONLY => "_R",
            page::READWRITE => "_RW",
            page::WRITECOPY => "_WC",
            page::EXECUTE => "_X",
            page::EXECUTE_READ => "_RX",
            page::EXECUTE_READWRITE => "_RWX",
            page::EXECUTE_WRITECOPY => "_XWC",
            _ => "",
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            // SAFETY: the handle came from OpenProcess and is closed once.
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod unsupported {
    use super::*;

    const UNSUPPORTED: &str = "process access is only supported on Windows";

    impl ProcessHandle {
        pub fn list_processes() -> Result<Vec<ProcessInfo>> {
            Err(Error::ProcessOpenFailed(UNSUPPORTED.to_string()))
        }

        pub fn open(pid: u32) -> Result<Self> {
            Err(Error::ProcessOpenFailed(format!("pid {}: {}", pid, UNSUPPORTED)))
        }

        pub fn module_base(&self, _module: &str) -> Result<u64> {
            Err(Error::NotAttached)
        }

        pub fn read_memory(&self, _address: u64, _size: usize) -> Result<Vec<u8>> {
            Err(Error::NotAttached)
        }

        pub fn write_memory(&self, _address: u64, _bytes: &[u8]) -> Result<()> {
            Err(Error::NotAttached)
        }

        pub fn regions(&self) -> Result<Vec<MemoryRegion>> {
            Err(Error::NotAttached)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, name: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_select_process_prefers_exact_match() {
        let processes = vec![info(1, "revolution idol.exe"), info(2, "Revolution Idol.exe")];
        assert_eq!(select_process(&processes, "Revolution Idol.exe").unwrap().pid, 2);
    }

    #[test]
    fn test_select_process_case_insensitive_fallback() {
        let processes = vec![info(1, "explorer.exe"), info(7, "REVOLUTION IDOL.EXE")];
        assert_eq!(select_process(&processes, DEFAULT_PROCESS_NAME).unwrap().pid, 7);
        assert!(select_process(&processes, "missing.exe").is_none());
    }

    #[test]
    fn test_access_level_display() {
        assert_eq!(AccessLevel::Full.to_string(), "full");
        assert_eq!(AccessLevel::ReadQuery.to_string(), "read+query");
    }
}

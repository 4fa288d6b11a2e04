//! Windows process table and registry access via `windows-sys`.

use super::{image_name_matches, ProcessEntry, ProcessTable, UserRegistry};
use crate::error::{Error, Result};
use std::ffi::{c_void, OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Registry::{
    RegGetValueW, RegSetKeyValueW, HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, REG_SZ,
    RRF_RT_REG_SZ,
};
use windows_sys::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, TerminateProcess, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE,
};
use windows_sys::Win32::UI::Shell::ShellExecuteW;
use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

/// Client settings key under `HKEY_CURRENT_USER`.
const CLIENT_KEY: &str = r"SOFTWARE\Valve\Steam";

/// URL protocol open command under `HKEY_CLASSES_ROOT`.
const OPEN_COMMAND_KEY: &str = r"steam\Shell\Open\Command";

/// Encode a string as a NUL-terminated UTF-16 buffer.
fn wide(s: impl AsRef<OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
}

/// Decode a NUL-terminated UTF-16 buffer.
fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    OsString::from_wide(&buf[..len]).to_string_lossy().into_owned()
}

/// Closes a handle on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Process table using ToolHelp snapshots.
pub struct WindowsProcessTable;

impl WindowsProcessTable {
    fn image_path(pid: u32) -> Option<PathBuf> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return None;
            }
            let handle = OwnedHandle(handle);

            let mut buf = [0u16; 1024];
            let mut size = buf.len() as u32;
            if QueryFullProcessImageNameW(handle.0, PROCESS_NAME_WIN32, buf.as_mut_ptr(), &mut size)
                == 0
            {
                return None;
            }
            Some(PathBuf::from(OsString::from_wide(&buf[..size as usize])))
        }
    }
}

impl ProcessTable for WindowsProcessTable {
    fn find(&self, name: &str) -> Result<Vec<ProcessEntry>> {
        let mut found = Vec::new();

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
            if snapshot == INVALID_HANDLE_VALUE {
                return Err(std::io::Error::last_os_error().into());
            }
            let snapshot = OwnedHandle(snapshot);

            let mut entry: PROCESSENTRY32W = std::mem::zeroed();
            entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;

            let mut ok = Process32FirstW(snapshot.0, &mut entry);
            while ok != 0 {
                let image = from_wide(&entry.szExeFile);
                if image_name_matches(&image, name) {
                    found.push(ProcessEntry {
                        pid: entry.th32ProcessID,
                        name: image,
                        exe: Self::image_path(entry.th32ProcessID),
                    });
                }
                ok = Process32NextW(snapshot.0, &mut entry);
            }
        }

        Ok(found)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(std::io::Error::last_os_error().into());
            }
            let handle = OwnedHandle(handle);

            if TerminateProcess(handle.0, 1) == 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
        Ok(())
    }

    fn launch(&self, exe: &Path) -> Result<()> {
        let operation = wide("open");
        let file = wide(exe.as_os_str());
        let directory = exe.parent().map(|p| wide(p.as_os_str()));

        let result = unsafe {
            ShellExecuteW(
                std::ptr::null_mut(),
                operation.as_ptr(),
                file.as_ptr(),
                std::ptr::null(),
                directory
                    .as_ref()
                    .map(|d| d.as_ptr())
                    .unwrap_or(std::ptr::null()),
                SW_SHOWNORMAL,
            )
        };

        // Values above 32 indicate success
        let code = result as isize;
        if code <= 32 {
            return Err(Error::launch(exe, format!("ShellExecute returned {}", code)));
        }
        Ok(())
    }
}

/// Registry access for the client's per-user settings.
pub struct WindowsRegistry;

fn read_string(root: HKEY, subkey: &str, value: Option<&str>) -> Result<Option<String>> {
    let subkey = wide(subkey);
    let value = value.map(wide);
    let value_ptr = value.as_ref().map(|v| v.as_ptr()).unwrap_or(std::ptr::null());

    unsafe {
        let mut size: u32 = 0;
        let status = RegGetValueW(
            root,
            subkey.as_ptr(),
            value_ptr,
            RRF_RT_REG_SZ,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut size,
        );
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(std::io::Error::from_raw_os_error(status as i32).into());
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let status = RegGetValueW(
            root,
            subkey.as_ptr(),
            value_ptr,
            RRF_RT_REG_SZ,
            std::ptr::null_mut(),
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
        );
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(std::io::Error::from_raw_os_error(status as i32).into());
        }

        let text = from_wide(&buf);
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

impl UserRegistry for WindowsRegistry {
    fn client_value(&self, name: &str) -> Result<Option<String>> {
        read_string(HKEY_CURRENT_USER, CLIENT_KEY, Some(name))
    }

    fn set_client_value(&self, name: &str, value: &str) -> Result<()> {
        let subkey = wide(CLIENT_KEY);
        let name_w = wide(name);
        let data = wide(value);

        let status = unsafe {
            RegSetKeyValueW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                name_w.as_ptr(),
                REG_SZ,
                data.as_ptr() as *const c_void,
                (data.len() * std::mem::size_of::<u16>()) as u32,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(std::io::Error::from_raw_os_error(status as i32).into());
        }
        Ok(())
    }

    fn open_command(&self) -> Result<Option<String>> {
        read_string(HKEY_CLASSES_ROOT, OPEN_COMMAND_KEY, None)
    }
}

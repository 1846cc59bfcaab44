use super::UserLookup;
use std::ffi::CStr;
use std::{mem, ptr};

const INITIAL_BUFFER_SIZE: usize = 1024;
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Looks user names up in the passwd database (`getpwuid_r`).
pub struct PasswdLookup;

impl UserLookup for PasswdLookup {
    fn user_name(&self, uid: u32) -> Option<String> {
        let mut buffer: Vec<libc::c_char> = vec![0; INITIAL_BUFFER_SIZE];

        loop {
            // SAFETY: `passwd` is plain old data, all zeroes is a valid value.
            let mut passwd: libc::passwd = unsafe { mem::zeroed() };
            let mut result: *mut libc::passwd = ptr::null_mut();
            // SAFETY: every pointer is to a live local, and `buffer.len()` is the real size of
            // `buffer`. The call only writes within those bounds.
            let rc = unsafe {
                libc::getpwuid_r(
                    uid,
                    &mut passwd,
                    buffer.as_mut_ptr(),
                    buffer.len(),
                    &mut result,
                )
            };

            if rc == libc::ERANGE && buffer.len() < MAX_BUFFER_SIZE {
                buffer.resize(buffer.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() || passwd.pw_name.is_null() {
                return None;
            }

            // SAFETY: rc == 0 and a non-null result mean `pw_name` is a NUL-terminated string
            // inside `buffer`, which is neither freed nor resized before the copy below.
            let name = unsafe { CStr::from_ptr(passwd.pw_name) };
            return Some(name.to_string_lossy().into_owned());
        }
    }
}

use std::ffi::CStr;
use std::io;

use libc::{c_char, getpwnam_r};

use fs_quota::{parse_number, FqError, UserIdentity};

#[derive(Debug)]
pub struct User {
    pub name: String,
    pub uid:  u32,
}

unsafe fn to_passwd(pwd: &libc::passwd) -> User {
    let cs_name = CStr::from_ptr(pwd.pw_name);
    User {
        name: cs_name.to_string_lossy().into_owned(),
        uid:  pwd.pw_uid,
    }
}

impl User {
    pub fn by_name(name: &str) -> Result<User, io::Error> {
        let mut buf = [0 as c_char; 1024];
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let cname = match std::ffi::CString::new(name) {
            Ok(un) => un,
            Err(_) => return Err(io::Error::from_raw_os_error(libc::ENOENT)),
        };
        let ret = unsafe {
            getpwnam_r(
                cname.as_ptr(),
                &mut pwd as *mut _,
                buf.as_mut_ptr(),
                buf.len() as libc::size_t,
                &mut result as *mut _,
            )
        };
        if ret == 0 {
            if result.is_null() {
                return Err(io::Error::from_raw_os_error(libc::ENOENT));
            }
            let p = unsafe { to_passwd(&pwd) };
            Ok(p)
        } else {
            Err(io::Error::from_raw_os_error(ret))
        }
    }
}

/// Turn a user name or numeric uid into a `UserIdentity`.
///
/// Numbers never go through the passwd lookup.
pub fn resolve(user: &str, min_uid: u32) -> Result<UserIdentity, FqError> {
    let uid = match parse_number(user) {
        Ok(uid) => uid,
        Err(_) => {
            match User::by_name(user) {
                Ok(pwd) => {
                    debug!("resolve: user {} has uid {}", pwd.name, pwd.uid);
                    pwd.uid
                },
                Err(e) => {
                    debug!("resolve: getpwnam({}): {}", user, e);
                    return Err(FqError::IdentityNotFound(user.to_string()));
                },
            }
        },
    };
    UserIdentity::with_min_uid(uid, min_uid)
}

//! Current-user identity lookup.
//!
//! Backs the synthetic `/user GetAll` call on `dbus-json3` channels.

use std::ffi::{CStr, CString};
use std::io;

/// Identity of the user the bridge runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub full_name: String,
    pub id: u32,
    pub home: String,
    pub shell: String,
    pub groups: Vec<String>,
}

/// Look up the current OS user, including member group names.
pub fn current_user() -> io::Result<UserInfo> {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };

    let mut buf = vec![0u8; pw_buffer_size()];
    // SAFETY: a zeroed passwd is a valid out-parameter for getpwuid_r.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: `pwd`, `buf` and `result` are valid writable pointers for the
    // sizes passed; on success the string fields of `pwd` point into `buf`,
    // which outlives every read below.
    let rc = unsafe {
        libc::getpwuid_r(
            uid,
            &mut pwd,
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    if result.is_null() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no passwd entry for uid {uid}"),
        ));
    }

    let name = c_string(pwd.pw_name);
    let groups = member_groups(&name, pwd.pw_gid)?;

    Ok(UserInfo {
        full_name: c_string(pwd.pw_gecos),
        id: pwd.pw_uid,
        home: c_string(pwd.pw_dir),
        shell: c_string(pwd.pw_shell),
        groups,
        name,
    })
}

fn c_string(ptr: *const libc::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null pointers in passwd/group records are NUL-terminated
    // strings backed by the caller-provided buffer.
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

fn pw_buffer_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let suggested = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    if suggested > 0 {
        suggested as usize
    } else {
        1024
    }
}

/// Names of all groups the user belongs to, primary group included.
fn member_groups(name: &str, primary: libc::gid_t) -> io::Result<Vec<String>> {
    let cname = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "user name contains NUL"))?;

    let mut gids = vec![0 as libc::gid_t; 32];
    loop {
        let mut count = gids.len() as libc::c_int;
        // SAFETY: `gids` has room for `count` entries; getgrouplist updates
        // `count` to the real group count when the buffer is too small.
        let rc = unsafe {
            libc::getgrouplist(cname.as_ptr(), primary, gids.as_mut_ptr(), &mut count)
        };
        if rc >= 0 {
            gids.truncate(count as usize);
            break;
        }
        gids.resize(count as usize, 0);
    }

    let mut names = Vec::with_capacity(gids.len());
    for gid in gids {
        if let Some(group) = group_name(gid)? {
            if !names.contains(&group) {
                names.push(group);
            }
        }
    }
    Ok(names)
}

fn group_name(gid: libc::gid_t) -> io::Result<Option<String>> {
    let mut buf = vec![0u8; pw_buffer_size()];
    // SAFETY: a zeroed group struct is a valid out-parameter for getgrgid_r.
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::group = std::ptr::null_mut();

    // SAFETY: same contract as getpwuid_r above.
    let rc = unsafe {
        libc::getgrgid_r(
            gid,
            &mut grp,
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    if result.is_null() {
        // Stale gid with no group database entry; not worth failing over.
        return Ok(None);
    }
    Ok(Some(c_string(grp.gr_name)))
}

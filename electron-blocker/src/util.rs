pub fn get_current_uid() -> libc::uid_t {
    unsafe { libc::getuid() }
}

#[inline]
pub fn is_root() -> bool {
    get_current_uid() == 0
}

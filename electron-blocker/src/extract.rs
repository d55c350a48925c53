use std::{
    borrow::Cow,
    ffi::OsStr,
    os::unix::ffi::OsStrExt,
};

/// Converts a native string vector into owned text tokens, keeping the
/// order. Bytes that are not valid UTF-8 are replaced.
pub fn tokens<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    items.into_iter().map(|s| lossy(s.as_ref()).into()).collect()
}

#[inline]
fn lossy(s: &OsStr) -> Cow<'_, str> {
    String::from_utf8_lossy(s.as_bytes())
}

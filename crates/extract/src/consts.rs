use regex::bytes::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Manifest or content path as it appears in a 3DS BOSS partition dump. The
// host is optional because some dumps only keep the path.
regex!(
    TEXT_DUMP_REGEX,
    r"(?:(?:npdl|npfl)\.(?:cdn|c\.app)\.nintendowifi\.net/p01/)?(?:nsa|filelist)/([A-Za-z0-9]{16})/([A-Za-z0-9_-]+)"
);

/// Wii U `task.db` layout. The file is preallocated; every slot exists
/// whether or not a task is registered in it.
pub(crate) mod task_db {
    use std::ops::Range;

    pub(crate) const HEADER_SIZE: usize = 0x103;
    pub(crate) const SLOT_SIZE: usize = 0x1000;
    pub(crate) const SLOT_COUNT: usize = 256;
    pub(crate) const TASK_FIELD: Range<usize> = 0x21..0x2A;
    pub(crate) const APP_ID_FIELD: Range<usize> = 0x7C1..0x7D1;
}

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Deterministic 64-bit hash for content etags and agent ids.
/// FxHasher is stable across processes and runs. Changing this invalidates
/// every persisted index cache.
pub fn stable_hash64<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Cheap change token over `(size, mtime)`, rendered as 16 hex digits.
pub fn etag_from_size_mtime(size: u64, mtime: i64) -> String {
    format!("{:016x}", stable_hash64(&(size, mtime)))
}

#[cfg(test)]
mod tests {
    use super::{etag_from_size_mtime, stable_hash64};

    #[test]
    fn stable_hash64_is_deterministic() {
        let a = stable_hash64(&"10.0.0.1:8113");
        let b = stable_hash64(&"10.0.0.1:8113");
        assert_eq!(a, b);
        assert_ne!(a, stable_hash64(&"10.0.0.2:8113"));
    }

    #[test]
    fn etag_tracks_size_and_mtime() {
        let a = etag_from_size_mtime(1024, 1735689600);
        assert_eq!(a, etag_from_size_mtime(1024, 1735689600));
        assert_ne!(a, etag_from_size_mtime(1025, 1735689600));
        assert_ne!(a, etag_from_size_mtime(1024, 1735689601));
        assert_eq!(a.len(), 16);
    }
}

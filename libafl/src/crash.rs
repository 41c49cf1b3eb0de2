//! Persisting a crashing input to disk.

use std::{
    fs::File,
    hash::{Hash, Hasher},
    io::Write,
    path::PathBuf,
};

use ahash::AHasher;

use crate::{executors::ExitKind, inputs::RawInput, Error};

/// Writes `input` to `crashes-<hash>` in the current directory and
/// returns the path written. The filename is a content hash rather
/// than a counter or a PRNG draw, so re-dumping the same crash on a
/// later run produces the same name instead of piling up duplicates.
/// `exit_kind` is accepted for API symmetry with the call site but
/// doesn't affect the filename: classifying the same bytes under two
/// different dispositions is still the same crash on disk.
pub fn dump_crash_to_file(exit_kind: ExitKind, input: &RawInput) -> Result<PathBuf, Error> {
    let _ = exit_kind;
    let mut hasher = AHasher::default();
    input.bytes().hash(&mut hasher);
    let path = PathBuf::from(format!("crashes-{:016x}", hasher.finish()));
    let mut file =
        File::create(&path).map_err(|e| Error::fatal(format!("crash dump create: {e}")))?;
    file.write_all(input.bytes())
        .map_err(|e| Error::fatal(format!("crash dump write: {e}")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_dumps_to_the_same_filename() {
        let dir = std::env::temp_dir().join(format!("libafl-crash-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();

        let input = RawInput::new(b"segfault me".to_vec());
        let first = dump_crash_to_file(ExitKind::Segv, &input).unwrap();
        let second = dump_crash_to_file(ExitKind::Segv, &input).unwrap();
        assert_eq!(first, second);
        assert!(first.to_string_lossy().starts_with("crashes-"));

        std::env::set_current_dir(prev).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn different_inputs_dump_to_different_filenames() {
        let dir =
            std::env::temp_dir().join(format!("libafl-crash-test-diff-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();

        let a = RawInput::new(b"aaaa".to_vec());
        let b = RawInput::new(b"bbbb".to_vec());
        let path_a = dump_crash_to_file(ExitKind::Crash, &a).unwrap();
        let path_b = dump_crash_to_file(ExitKind::Crash, &b).unwrap();
        assert_ne!(path_a, path_b);

        std::env::set_current_dir(prev).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}

// Copyright 2025 Home Team.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Create or truncate `path` and fill it from `reader`, leaving it with `mode`.
pub fn write_from_reader(path: &Path, reader: &mut dyn Read, mode: u32) -> io::Result<u64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    let written = io::copy(reader, &mut file)?;
    file.flush()?;
    // mode() only applies on creation
    file.set_permissions(Permissions::from_mode(mode))?;
    Ok(written)
}

pub fn write_with_mode(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    write_from_reader(path, &mut &data[..], mode).map(|_| ())
}

/// Copy `from` to `to`, keeping the source permission bits. Returns the mode.
pub fn copy_preserving_mode(from: &Path, to: &Path) -> io::Result<u32> {
    let mode = fs::metadata(from)?.permissions().mode() & 0o7777;
    let mut src = File::open(from)?;
    write_from_reader(to, &mut src, mode)?;
    Ok(mode)
}

pub fn file_mode(path: &Path) -> io::Result<u32> {
    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_is_applied_on_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        write_with_mode(&path, b"one", 0o600).unwrap();
        write_with_mode(&path, b"two", 0o755).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(file_mode(&path).unwrap(), 0o755);
    }

    #[test]
    fn test_copy_preserving_mode() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        write_with_mode(&src, b"payload", 0o750).unwrap();

        assert_eq!(copy_preserving_mode(&src, &dst).unwrap(), 0o750);
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        assert_eq!(file_mode(&dst).unwrap(), 0o750);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_file_if_exists(&dir.path().join("nope")).unwrap();
        remove_dir_if_exists(&dir.path().join("nope")).unwrap();
    }
}

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

#[cfg(test)]
mod tests {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use homecli::domain::k3s::install::placement_callbacks;
    use homecli::domain::k3s::K3sPaths;
    use homecli::infrastructure::bundle::{Bundle, TarArchive, TarCallback, TarEntry};
    use homecli::shared::fs::file_mode;
    use homecli::HomeError;
    use std::io::Read;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    /// Archive entries in deliberately scrambled order.
    const ENTRIES: [(&str, &[u8], u32); 3] = [
        ("k3s-v1.28.3/install.sh", b"#!/bin/sh\necho install\n", 0o755),
        ("k3s-v1.28.3/k3s-airgap-images-amd64.tar.gz", b"airgap", 0o600),
        ("k3s-v1.28.3/k3s", b"ELF k3s", 0o600),
    ];

    fn write_archive(path: &Path, entries: &[(&str, &[u8], u32)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn bundle_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".bundle"), "").unwrap();
        std::fs::write(
            dir.path().join("versions.json"),
            r#"{"wekaHome":"3.1.0","k3S":"v1.28.3+k3s1","dockerImages":{"images/home.tar":"quay.io/weka/home:3.1.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("wekahome-3.1.0.tgz"), b"chart").unwrap();
        write_archive(&dir.path().join("k3s-v1.28.3.tar.gz"), &ENTRIES);
        dir
    }

    fn recorder(pattern: &str, log: &Arc<Mutex<Vec<String>>>) -> TarCallback {
        let log = log.clone();
        TarCallback::new(pattern, move |entry: &TarEntry, reader: &mut dyn Read| {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            log.lock().unwrap().push(format!("{}={}", entry.name, content));
            Ok(())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_callbacks_run_in_list_order() {
        let dir = bundle_dir();
        let bundle = Bundle::open(dir.path()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let callbacks = vec![
            recorder("k3s", &log),
            recorder("k3s-airgap-*.tar*", &log),
            recorder("install.sh", &log),
        ];
        bundle
            .k3s_archive()
            .unwrap()
            .extract(&CancellationToken::new(), callbacks)
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "k3s=ELF k3s",
                "k3s-airgap-images-amd64.tar.gz=airgap",
                "install.sh=#!/bin/sh\necho install\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_unmatched_pattern_fails() {
        let dir = bundle_dir();
        let archive = Bundle::open(dir.path()).unwrap().k3s_archive().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let err = archive
            .extract(
                &CancellationToken::new(),
                vec![recorder("k3s", &log), recorder("missing-*", &log)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Bundle(ref m) if m.contains("missing-*")), "{err}");
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_extraction() {
        let dir = bundle_dir();
        let archive = Bundle::open(dir.path()).unwrap().k3s_archive().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let log = Arc::new(Mutex::new(Vec::new()));
        let err = archive
            .extract(&cancel, vec![recorder("k3s", &log)])
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{err}");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_placement_sets_modes() {
        let dir = bundle_dir();
        let root = tempfile::tempdir().unwrap();
        let paths = K3sPaths::under(root.path());
        let bundle = Bundle::open(dir.path()).unwrap();

        bundle
            .k3s_archive()
            .unwrap()
            .extract(&CancellationToken::new(), placement_callbacks(&paths).unwrap())
            .await
            .unwrap();

        assert_eq!(std::fs::read(paths.binary()).unwrap(), b"ELF k3s");
        assert_eq!(file_mode(&paths.binary()).unwrap(), 0o755);

        let images = paths.images_dir.join("k3s-airgap-images-amd64.tar.gz");
        assert_eq!(std::fs::read(&images).unwrap(), b"airgap");
        assert_eq!(file_mode(&images).unwrap(), 0o644);
        assert!(!paths.bin_dir.join("install.sh").exists());
    }

    #[test]
    fn test_listing_plain_tar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tar");
        let mut builder = tar::Builder::new(std::fs::File::create(&path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "dir/file.txt", &b"abc"[..]).unwrap();
        builder.into_inner().unwrap();

        let archive = TarArchive::new(&path);
        assert!(!archive.is_gzip());
        let entries = archive.list(&CancellationToken::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "file.txt");
        assert_eq!(entries[0].size, 3);
    }

    #[test]
    fn test_bundle_manifest_and_chart() {
        let dir = bundle_dir();
        let bundle = Bundle::open(dir.path()).unwrap();
        let manifest = bundle.manifest().unwrap();
        assert_eq!(manifest.k3s, "v1.28.3+k3s1");
        assert_eq!(
            manifest.docker_images.get("images/home.tar").map(String::as_str),
            Some("quay.io/weka/home:3.1.0")
        );
        assert_eq!(
            bundle.chart().unwrap(),
            Some(dir.path().join("wekahome-3.1.0.tgz"))
        );

        std::fs::remove_file(dir.path().join(".bundle")).unwrap();
        assert!(Bundle::open(dir.path()).is_err());
    }
}

use httpmock::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Write;
use tar::Header;
use xz2::write::XzEncoder;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A `.tar.xz` shaped like a headless release: everything under `factorio/`.
pub fn server_archive(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut tar = tar::Builder::new(Vec::new());
    for (name, data, mode) in files {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        tar.append_data(&mut header, format!("factorio/{}", name), *data)
            .unwrap();
    }
    let raw = tar.into_inner().unwrap();
    let mut enc = XzEncoder::new(Vec::new(), 6);
    enc.write_all(&raw).unwrap();
    enc.finish().unwrap()
}

pub fn release_archive(version: &str) -> Vec<u8> {
    server_archive(&[
        ("bin/x64/factorio", b"\x7fELF headless".as_slice(), 0o755),
        ("data/changelog.txt", version.as_bytes(), 0o644),
        ("config-path.cfg", b"config-path=__PATH__executable__/../../config\n".as_slice(), 0o644),
    ])
}

pub fn manifest_line(version: &str, archive: &[u8]) -> String {
    format!(
        "{}  factorio_headless_x64_{}.tar.xz\n",
        sha256_hex(archive),
        version
    )
}

pub fn mock_latest<'a>(server: &'a MockServer, stable: &str, experimental: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path("/api/latest-releases");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "stable": { "alpha": stable, "headless": stable },
                "experimental": { "alpha": experimental, "headless": experimental }
            }));
    })
}

pub fn mock_manifest<'a>(server: &'a MockServer, body: String) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path("/download/sha256sums/");
        then.status(200).body(body);
    })
}

pub fn mock_archive<'a>(server: &'a MockServer, version: &str, archive: Vec<u8>) -> httpmock::Mock<'a> {
    let path = format!("/get-download/{}/headless/linux64", version);
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "application/x-xz")
            .body(archive);
    })
}

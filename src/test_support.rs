//! Fakes and fixtures shared by the unit tests.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::command::{CommandOutput, CommandRunner, SystemCommandRunner};

/// Records every command and emulates the account tools and systemctl.
/// Absolute program paths (the installed exporter) are executed for real.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    users: Mutex<HashSet<String>>,
    groups: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    active: Mutex<bool>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the exact command line (e.g. "systemctl daemon-reload") exit 1.
    pub fn fail_on(&self, command_line: &str) {
        self.failing.lock().unwrap().insert(command_line.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command_line: &str) -> usize {
        self.calls().iter().filter(|c| *c == command_line).count()
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.lock().unwrap().contains(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.lock().unwrap().contains(name)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().unwrap().len()
    }

    pub fn add_user(&self, name: &str) {
        self.users.lock().unwrap().insert(name.to_string());
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock().unwrap()
    }

    fn exit(code: i32) -> CommandOutput {
        CommandOutput {
            code: Some(code),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        if program.starts_with('/') {
            return SystemCommandRunner::new().run(program, args).await;
        }

        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        if self.failing.lock().unwrap().contains(&line) {
            return Ok(Self::exit(1));
        }

        let last = args.last().copied().unwrap_or_default().to_string();
        let output = match (program, args.first().copied()) {
            ("getent", Some("passwd")) => Self::exit(if self.has_user(&last) { 0 } else { 2 }),
            ("getent", Some("group")) => Self::exit(if self.has_group(&last) { 0 } else { 2 }),
            ("groupadd", _) => {
                let inserted = self.groups.lock().unwrap().insert(last);
                Self::exit(if inserted { 0 } else { 9 })
            }
            ("useradd", _) => {
                let inserted = self.users.lock().unwrap().insert(last);
                Self::exit(if inserted { 0 } else { 9 })
            }
            ("userdel", _) => {
                let removed = self.users.lock().unwrap().remove(&last);
                Self::exit(if removed { 0 } else { 6 })
            }
            ("groupdel", _) => {
                let removed = self.groups.lock().unwrap().remove(&last);
                Self::exit(if removed { 0 } else { 6 })
            }
            ("systemctl", Some("start" | "restart")) => {
                *self.active.lock().unwrap() = true;
                Self::exit(0)
            }
            ("systemctl", Some("stop")) => {
                *self.active.lock().unwrap() = false;
                Self::exit(0)
            }
            _ => Self::exit(0),
        };
        Ok(output)
    }
}

/// Shell script standing in for the exporter: prints its version on stderr.
pub fn fake_exporter_script(version: &str) -> String {
    format!(
        "#!/bin/sh\necho \"zfs_exporter, version {} (branch: HEAD, revision: deadbeef)\" >&2\n",
        version
    )
}

/// Gzipped tarball holding `entries` (path, contents), all mode 0755.
pub fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// Release archive laid out like the upstream tarballs.
pub fn release_archive(version: &str, arch: &str) -> Vec<u8> {
    let script = fake_exporter_script(version);
    let binary = format!("zfs_exporter-{}.linux-{}/zfs_exporter", version, arch);
    let license = format!("zfs_exporter-{}.linux-{}/LICENSE", version, arch);
    build_archive(&[
        (binary.as_str(), script.as_bytes()),
        (license.as_str(), b"MIT".as_slice()),
    ])
}

pub fn release_path(version: &str, arch: &str) -> String {
    format!(
        "/zfs_exporter/releases/download/v{v}/zfs_exporter-{v}.linux-{a}.tar.gz",
        v = version,
        a = arch
    )
}

/// Mock release host serving each (path, body); anything else is a 404.
/// The server shuts down when dropped, so callers keep it alive.
pub async fn serve_files(files: Vec<(String, Vec<u8>)>) -> MockServer {
    let server = MockServer::start().await;
    for (file_path, body) in files {
        Mock::given(method("GET"))
            .and(path(file_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/gzip")
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;
    }
    server
}

pub async fn serve_file(path: String, body: Vec<u8>) -> MockServer {
    serve_files(vec![(path, body)]).await
}

/// Serves fixture releases for every version at the upstream URL paths.
pub async fn serve_releases(versions: &[&str], arch: &str) -> MockServer {
    let files = versions
        .iter()
        .map(|v| (release_path(v, arch), release_archive(v, arch)))
        .collect();
    serve_files(files).await
}

pub async fn serve_release(version: &str, arch: &str) -> MockServer {
    serve_releases(&[version], arch).await
}

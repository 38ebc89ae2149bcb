//! End-to-end lifecycle tests against a local mock HTTP origin: a minimal
//! blocking TCP listener serving canned JSON/bytes, since this crate carries
//! no HTTP-mocking dependency of its own. Each test gets its own origin
//! (ephemeral port) and its own sandboxed cache directory.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pacm_get::cache;
use pacm_get::config::{Config, ConfigOverrides};
use pacm_get::crypto;
use pacm_get::model::{PackageType, PackageVersion, PlatformInfo, VersionAddr};
use pacm_get::upgrader::{ActivationOutcome, Upgrader};
use pacm_get::version::VersionNumber;

struct MockOrigin {
    port: u16,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockOrigin {
    fn start(routes: HashMap<String, (u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock origin");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let port = listener.local_addr().unwrap().port();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_loop = shutdown.clone();
        let routes = Arc::new(Mutex::new(routes));
        let handle = thread::spawn(move || loop {
            if shutdown_loop.load(Ordering::Relaxed) {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => serve_one(stream, &routes),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        });
        Self { port, shutdown, handle: Some(handle) }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for MockOrigin {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn serve_one(mut stream: TcpStream, routes: &Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>) {
    stream.set_nonblocking(false).ok();
    let mut buf = [0u8; 8192];
    let Ok(n) = stream.read(&mut buf) else { return };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|p| p.split('?').next().unwrap_or(p).to_string())
        .unwrap_or_default();

    let routes = routes.lock().unwrap();
    let response = match routes.get(&path) {
        Some((status, body)) => {
            let mut head = format!("HTTP/1.1 {status} status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len())
                .into_bytes();
            head.extend_from_slice(body);
            head
        }
        None => b"HTTP/1.1 404 status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
    };
    let _ = stream.write_all(&response);
}

struct Sandbox {
    _temp: tempfile::TempDir,
    cfg: Config,
}

fn sandbox(base_url: &str, public_key: &str) -> Sandbox {
    let temp = tempfile::tempdir().unwrap();
    let cfg = Config::resolve(ConfigOverrides {
        base_url: Some(base_url.to_string()),
        base_dir: Some(temp.path().join("costrict")),
        public_key_file: None,
        os: Some("linux".into()),
        arch: Some("amd64".into()),
        no_set_path: true,
        ..Default::default()
    })
    .unwrap();
    let mut cfg = cfg;
    cfg.public_key = public_key.to_string();
    Sandbox { _temp: temp, cfg }
}

/// Build a one-version origin for package `name`, returning the route table
/// and the signed descriptor that was published.
fn build_origin(
    name: &str,
    version: &str,
    artifact_bytes: &[u8],
    private_pem: &str,
) -> (HashMap<String, (u16, Vec<u8>)>, PackageVersion) {
    let md5_hex = {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(artifact_bytes).unwrap();
        crypto::file_digest(f.path()).unwrap().1
    };
    let signature = crypto::sign(private_pem, md5_hex.as_bytes()).unwrap();

    let version_id = VersionNumber::parse(version).unwrap();
    let descriptor = PackageVersion {
        package_name: name.to_string(),
        package_type: PackageType::Exec,
        file_name: name.to_string(),
        os: "linux".into(),
        arch: "amd64".into(),
        size: artifact_bytes.len() as u64,
        checksum: md5_hex,
        checksum_algo: "md5".into(),
        sign: hex::encode(signature),
        version_id,
        build: "ci".into(),
        description: "test fixture".into(),
    };

    let info_url = format!("/{name}/linux/amd64/{version}/package.json");
    let app_url = format!("/{name}/linux/amd64/{version}/{name}");
    let platform = PlatformInfo {
        package_name: name.to_string(),
        os: "linux".into(),
        arch: "amd64".into(),
        newest: VersionAddr { version_id, app_url: app_url.clone(), info_url: info_url.clone() },
        versions: vec![VersionAddr { version_id, app_url: app_url.clone(), info_url: info_url.clone() }],
    };

    let mut routes = HashMap::new();
    routes.insert(
        format!("/{name}/linux/amd64/platform.json"),
        (200, serde_json::to_vec(&platform).unwrap()),
    );
    routes.insert(info_url, (200, serde_json::to_vec(&descriptor).unwrap()));
    routes.insert(app_url, (200, artifact_bytes.to_vec()));

    (routes, descriptor)
}

#[test]
fn cold_install_downloads_verifies_and_activates() {
    let (public_pem, private_pem) = crypto::generate_keypair().unwrap();
    let (routes, descriptor) = build_origin("widget", "1.0.0", b"binary-contents", &private_pem);
    let origin = MockOrigin::start(routes);
    let sandbox = sandbox(&origin.base_url(), &public_pem);

    let upgrader = Upgrader::new("widget", sandbox.cfg.clone());
    assert!(upgrader.get_local_version().is_zero());

    let (fetched, staged) = upgrader.get_package(None).unwrap();
    assert!(staged);
    assert_eq!(fetched.version_id, descriptor.version_id);

    let outcome = upgrader.activate_package(&fetched).unwrap();
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert_eq!(upgrader.get_local_version(), descriptor.version_id);

    let installed = sandbox.cfg.install_dir.join("widget");
    assert_eq!(std::fs::read(&installed).unwrap(), b"binary-contents");
}

#[test]
fn already_active_version_short_circuits_without_redownload() {
    let (public_pem, private_pem) = crypto::generate_keypair().unwrap();
    let (routes, _descriptor) = build_origin("widget", "2.0.0", b"payload", &private_pem);
    let origin = MockOrigin::start(routes);
    let sandbox = sandbox(&origin.base_url(), &public_pem);
    let upgrader = Upgrader::new("widget", sandbox.cfg.clone());

    let (first, _) = upgrader.get_package(None).unwrap();
    upgrader.activate_package(&first).unwrap();

    let (second, staged) = upgrader.get_package(Some(first.version_id)).unwrap();
    assert!(!staged);
    assert_eq!(second.version_id, first.version_id);
}

#[test]
fn tampered_checksum_is_rejected_and_nothing_is_cached() {
    let (public_pem, private_pem) = crypto::generate_keypair().unwrap();
    let (mut routes, _descriptor) = build_origin("widget", "1.0.0", b"binary-contents", &private_pem);
    for (path, value) in routes.iter_mut() {
        if path.ends_with("/widget") {
            value.1 = b"swapped-out-payload".to_vec();
        }
    }
    let origin = MockOrigin::start(routes);
    let sandbox = sandbox(&origin.base_url(), &public_pem);
    let upgrader = Upgrader::new("widget", sandbox.cfg.clone());

    let result = upgrader.get_package(None);
    assert!(result.is_err());
    assert!(cache::list_version_descriptors(&sandbox.cfg).is_empty());
}

#[test]
fn upgrade_package_writes_todo_marker_then_clears_it() {
    let (public_pem, private_pem) = crypto::generate_keypair().unwrap();
    let (routes, descriptor) = build_origin("widget", "1.0.0", b"binary-contents", &private_pem);
    let origin = MockOrigin::start(routes);
    let sandbox = sandbox(&origin.base_url(), &public_pem);
    let upgrader = Upgrader::new("widget", sandbox.cfg.clone());

    let (upgraded, changed, outcome) = upgrader.upgrade_package(None).unwrap();
    assert!(changed);
    assert_eq!(upgraded.version_id, descriptor.version_id);
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert!(!cache::todo_marker_path(&sandbox.cfg, "widget").exists());
    assert!(cache::pin_marker_path(&sandbox.cfg, "widget").exists());
}

//! OSRM backend in a container for the network-backed tests.
//!
//! Expects an already prepared (extract + partition + customize) Nevada
//! extract under `OSRM_DATA_DIR`, defaulting to `osrm-data/`.

use std::env;
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use testcontainers::core::{IntoContainerPort, Mount};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, ReuseDirective, TestcontainersError};

use ride_planner::osrm::{OsrmClient, OsrmConfig};

const DATASET: &str = "nevada-latest.osrm";

fn data_dir() -> Result<PathBuf, TestcontainersError> {
    let root = env::var("OSRM_DATA_DIR").unwrap_or_else(|_| "osrm-data".to_string());
    let dir = PathBuf::from(root)
        .canonicalize()
        .map_err(|err| TestcontainersError::other(format!("OSRM data dir: {}", err)))?;
    if !dir.join(format!("{}.partition", DATASET)).exists() {
        return Err(TestcontainersError::other(format!(
            "{} has no prepared {}",
            dir.display(),
            DATASET
        )));
    }
    Ok(dir)
}

pub fn osrm_container() -> Result<(Container<GenericImage>, OsrmClient), TestcontainersError> {
    let dir = data_dir()?;

    // Name by dataset age so a rebuilt extract gets a fresh container.
    let mtime = std::fs::metadata(dir.join(format!("{}.partition", DATASET)))
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    let image = GenericImage::new("osrm/osrm-backend", "latest")
        .with_exposed_port(5000.tcp())
        .with_mount(Mount::bind_mount(dir.to_string_lossy().to_string(), "/data"))
        .with_cmd(vec![
            "osrm-routed".to_string(),
            "--algorithm".to_string(),
            "mld".to_string(),
            format!("/data/{}", DATASET),
        ])
        .with_container_name(format!("ride-planner-osrm-{}", mtime))
        .with_startup_timeout(Duration::from_secs(30))
        .with_reuse(ReuseDirective::Always);

    let container = image.start()?;
    let port = container.get_host_port_ipv4(5000.tcp())?;

    let client = OsrmClient::new(OsrmConfig {
        base_url: format!("http://127.0.0.1:{}", port),
        profile: "car".to_string(),
        timeout_secs: 30,
    })
    .map_err(|err| TestcontainersError::other(format!("OSRM client failed: {}", err)))?;

    Ok((container, client))
}

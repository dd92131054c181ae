use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use cluster_bootstrap::registry::PeerRecord;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    time::{Instant, sleep, timeout},
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn two_processes_discover_each_other() -> Result<()> {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_cluster-bootstrap"));
    let dir = tempfile::tempdir()?;
    let first_registry = dir.path().join("first.json");
    let second_registry = dir.path().join("second.json");

    let mut first = spawn_node(&binary, &first_registry, None).await?;
    let first_addr = read_listening_addr(&mut first.stdout).await?;
    let first_port = first_addr
        .rsplit(':')
        .next()
        .context("first node address has no port")?
        .to_string();
    let first_logs = tokio::spawn(drain_stdout(first.stdout));

    let mut second = spawn_node(&binary, &second_registry, Some(&first_port)).await?;
    let second_addr = read_listening_addr(&mut second.stdout).await?;
    let second_logs = tokio::spawn(drain_stdout(second.stdout));

    // Each side ends up with exactly the other as its only peer.
    wait_for_peers(&first_registry, &first_addr, &[&second_addr]).await?;
    wait_for_peers(&second_registry, &second_addr, &[&first_addr]).await?;

    for child in [&mut first.child, &mut second.child] {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
    let _ = first_logs.await;
    let _ = second_logs.await;

    Ok(())
}

struct NodeProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

async fn spawn_node(
    binary: &Path,
    registry: &Path,
    cluster_port: Option<&str>,
) -> Result<NodeProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg("--node-ip")
        .arg("127.0.0.1")
        .arg("--node-port")
        .arg("0")
        .arg("--registry")
        .arg(registry)
        .arg("--io-timeout-secs")
        .arg("3")
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(port) = cluster_port {
        cmd.arg("--cluster-ip")
            .arg("127.0.0.1")
            .arg("--cluster-port")
            .arg(port);
    }

    let mut child = cmd.spawn().context("failed to spawn node")?;
    let stdout = child
        .stdout
        .take()
        .context("node stdout missing after spawn")?;

    Ok(NodeProcess {
        child,
        stdout: BufReader::new(stdout),
    })
}

async fn read_listening_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    loop {
        let line = read_line(reader)
            .await?
            .context("node exited before reporting its address")?;
        if !line.contains("node listening on") {
            continue;
        }
        let addr = line
            .split_whitespace()
            .last()
            .context("unexpected listening banner format")?;
        if !addr.contains(':') {
            return Err(anyhow!("listening banner missing socket: {line}"));
        }
        return Ok(addr.to_string());
    }
}

async fn wait_for_peers(registry: &Path, owner: &str, expected: &[&str]) -> Result<()> {
    let deadline = Instant::now() + READ_TIMEOUT;
    loop {
        let mut stored: Vec<String> = read_records(registry)
            .await
            .into_iter()
            .filter(|record| record.owner_key == owner)
            .map(|record| format!("{}:{}", record.ip_address, record.port))
            .collect();
        stored.sort();
        if stored == expected {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(anyhow!(
                "{owner} has peers {stored:?}, expected {expected:?}"
            ));
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn read_records(path: &Path) -> Vec<PeerRecord> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let bytes = match timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(result) => result?,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while let Ok(bytes) = reader.read_line(&mut buffer).await {
        if bytes == 0 {
            break;
        }
        buffer.clear();
    }
}

//! Kernel backend: `wg` and `wg-quick` command line tools

use crate::error::{ManagerError, ManagerResult};
use crate::peers::{PeerControl, PeerEntry};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::process::{Command, Output, Stdio};
use wgman_protocol::{CryptoBackend, CryptoError, CryptoResult, PrivateKey, PublicKey};

const CMD_WG: &str = "wg";
const CMD_WG_QUICK: &str = "wg-quick";

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn command_error(output: &Output, command: String) -> ManagerError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    ManagerError::Command {
        detail: if detail.is_empty() {
            format!("exited with {}", output.status)
        } else {
            detail.to_string()
        },
        command,
    }
}

/// Run a command and return its stdout
fn run(program: &str, args: &[&str]) -> ManagerResult<String> {
    let command = command_line(program, args);
    tracing::debug!(%command, "Running");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ManagerError::Command {
            command: command.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(command_error(&output, command));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `wg show <if> allowed-ips` output.
///
/// Each line is a public key followed by whitespace-separated CIDRs, or
/// `(none)` for a peer without allowed IPs.
pub fn parse_allowed_ips(output: &str) -> ManagerResult<Vec<PeerEntry>> {
    let mut peers = Vec::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else { continue };
        let public_key = PublicKey::from_base64(key)?;

        let mut allowed_ips = Vec::new();
        for cidr in fields.filter(|f| *f != "(none)") {
            let invalid = || ManagerError::Command {
                command: "wg show allowed-ips".into(),
                detail: format!("unexpected allowed-ip '{}'", cidr),
            };
            let (ip, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
            let ip: IpAddr = ip.parse().map_err(|_| invalid())?;
            let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
            allowed_ips.push((ip, prefix));
        }

        peers.push(PeerEntry {
            public_key,
            allowed_ips,
        });
    }
    Ok(peers)
}

/// Live interface managed through `wg` / `wg-quick`
#[derive(Debug, Clone)]
pub struct WgCommand {
    interface: String,
}

impl WgCommand {
    /// Control the kernel interface `interface`
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

impl PeerControl for WgCommand {
    fn name(&self) -> &'static str {
        "wg"
    }

    fn is_up(&self) -> bool {
        run(CMD_WG, &["show", &self.interface]).is_ok()
    }

    fn list_peers(&self) -> ManagerResult<Vec<PeerEntry>> {
        let out = run(CMD_WG, &["show", &self.interface, "allowed-ips"])?;
        parse_allowed_ips(&out)
    }

    fn set_peer(&self, public_key: &PublicKey, address: Ipv4Addr) -> ManagerResult<()> {
        let key = public_key.to_base64();
        let allowed = format!("{}/32", address);
        run(
            CMD_WG,
            &["set", &self.interface, "peer", &key, "allowed-ips", &allowed],
        )?;
        Ok(())
    }

    fn remove_peer(&self, public_key: &PublicKey) -> ManagerResult<()> {
        let key = public_key.to_base64();
        run(CMD_WG, &["set", &self.interface, "peer", &key, "remove"])?;
        Ok(())
    }

    fn save(&self) -> ManagerResult<()> {
        run(CMD_WG_QUICK, &["save", &self.interface])?;
        Ok(())
    }

    fn public_key(&self) -> ManagerResult<PublicKey> {
        let out = run(CMD_WG, &["show", &self.interface, "public-key"])?;
        Ok(PublicKey::from_base64(out.trim())?)
    }
}

/// Key issuing through `wg genkey` / `wg pubkey`
#[derive(Debug, Default, Clone, Copy)]
pub struct WgToolBackend;

impl WgToolBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

impl CryptoBackend for WgToolBackend {
    fn name(&self) -> &'static str {
        "wg (wg genkey/pubkey)"
    }

    fn generate_private_key(&self) -> CryptoResult<PrivateKey> {
        let out = run(CMD_WG, &["genkey"]).map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(PrivateKey::from_base64(out.trim())?)
    }

    fn derive_public_key(&self, private_key: &PrivateKey) -> CryptoResult<PublicKey> {
        let derivation = |e: std::io::Error| CryptoError::Derivation(format!("wg pubkey: {}", e));

        let mut child = Command::new(CMD_WG)
            .arg("pubkey")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(derivation)?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut encoded = private_key.to_base64();
            encoded.push('\n');
            stdin.write_all(encoded.as_bytes()).map_err(derivation)?;
        }

        let output = child.wait_with_output().map_err(derivation)?;
        if !output.status.success() {
            return Err(CryptoError::Derivation(
                command_error(&output, "wg pubkey".into()).to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(PublicKey::from_base64(stdout.trim())?)
    }
}

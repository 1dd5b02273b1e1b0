//! Parsing and SSH/SCP/SFTP command synthesis for `uphps` chains:
//! `user[:pass|=keyfile]@host[:port]+user[:pass]@host[:port]+...`.

use crate::config::DEFAULT_SSH_PORT;
use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::net::ToSocketAddrs;

/// One hop in a chain: how to reach it and (if known) its password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub username: String,
    /// `Some(password)` for a plaintext password login, `None` for key-based
    /// or agent-based auth.
    pub password: Option<String>,
    /// An explicit identity file, mutually exclusive with `password`.
    pub keyfile: Option<String>,
    /// Canonical (numeric) address; resolution happens at parse time.
    pub host: String,
    pub port: u16,
}

impl Hop {
    fn key(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

/// Resolve `host` to a canonical numeric address, the way the original
/// implementation uses `socket.gethostbyname` to pin password attribution
/// to an address rather than a name that may alias.
fn canonicalize_host(host: &str) -> Result<String> {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Ok(host.to_string());
    }
    let lookup = format!("{host}:0");
    match lookup.to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .map(|a| a.ip().to_string())
            .ok_or_else(|| Error::MissingHostResolution {
                host: host.to_string(),
                reason: "no addresses returned".to_string(),
            }),
        Err(e) => Err(Error::MissingHostResolution {
            host: host.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn unescape_password(raw: &str) -> String {
    raw.replace("++", "+")
}

/// Split on `+` that is not itself doubled (an escaped literal `+` inside a
/// password is written as `++`).
fn split_entries(encoded: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = encoded.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '+' {
            if chars.peek() == Some(&'+') {
                current.push('+');
                current.push('+');
                chars.next();
                continue;
            }
            entries.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
    }
    entries.push(current);
    entries
}

fn parse_entry(entry: &str, default_user: &str) -> Result<Hop> {
    let (userpass, hostport) = match entry.rfind('@') {
        Some(idx) => (Some(&entry[..idx]), &entry[idx + 1..]),
        None => (None, entry),
    };

    let (host, port) = match hostport.rsplit_once(':') {
        Some((h, p)) => (
            h.to_string(),
            p.parse::<u16>()
                .map_err(|_| Error::CommandLineError(format!("bad port in {entry:?}")))?,
        ),
        None => (hostport.to_string(), DEFAULT_SSH_PORT),
    };
    let host = canonicalize_host(&host)?;

    let (username, password, keyfile) = match userpass {
        None => (default_user.to_string(), None, None),
        Some(up) => {
            if let Some((u, pass)) = up.split_once(':') {
                (u.to_string(), Some(unescape_password(pass)), None)
            } else if let Some((u, key)) = up.split_once('=') {
                (u.to_string(), None, Some(key.to_string()))
            } else {
                (up.to_string(), None, None)
            }
        }
    };

    Ok(Hop {
        username,
        password,
        keyfile,
        host,
        port,
    })
}

/// Parse a `uphps` chain into an ordered list of hops plus a
/// `"user@host" -> password` map for non-empty passwords, ready for
/// [`crate::password_injector::PasswordInjector`].
pub fn parse_uphps(encoded: &str) -> Result<(Vec<Hop>, HashMap<String, String>)> {
    if encoded.is_empty() {
        return Err(Error::CommandLineError("empty uphps chain".to_string()));
    }
    let default_user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
    let mut hops = Vec::new();
    for entry in split_entries(encoded) {
        hops.push(parse_entry(&entry, &default_user)?);
    }
    let mut passwords = HashMap::new();
    for hop in &hops {
        if let Some(pw) = &hop.password {
            if !pw.is_empty() {
                passwords.insert(hop.key(), pw.clone());
            }
        }
    }
    Ok((hops, passwords))
}

fn escape_for_nesting(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the nested `-oProxyCommand=...` chain for hops `0..n-1`, the way
/// `jumper.get_proxies` composes each hop's `ssh -W host:port -p viaport
/// user@viahost` around the previous proxy string.
fn get_proxies(hops: &[Hop], proxy_options: &str) -> String {
    let mut proxy = String::new();
    for i in 0..hops.len().saturating_sub(1) {
        let via = &hops[i];
        let next = &hops[i + 1];
        let inner = if proxy.is_empty() {
            String::new()
        } else {
            format!(r#" -oProxyCommand="{}""#, escape_for_nesting(&proxy))
        };
        proxy = format!(
            "ssh {proxy_options}{inner} -W {next_host}:{next_port} -p {via_port} {via_user}@{via_host}",
            next_host = next.host,
            next_port = next.port,
            via_port = via.port,
            via_user = via.username,
            via_host = via.host,
        );
    }
    proxy
}

fn proxy_option(hops: &[Hop], proxy_options: &str) -> Option<String> {
    if hops.len() < 2 {
        return None;
    }
    let proxy = get_proxies(hops, proxy_options);
    Some(format!(r#"-oProxyCommand="{}""#, escape_for_nesting(&proxy)))
}

fn build_command(
    program: &str,
    port_flag: &str,
    hops: &[Hop],
    proxy_options: &str,
    extra_options: &str,
) -> Result<String> {
    let last = hops
        .last()
        .ok_or_else(|| Error::CommandLineError("empty hop chain".to_string()))?;
    let mut parts = vec![program.to_string(), proxy_options.to_string()];
    if !extra_options.is_empty() {
        parts.push(extra_options.to_string());
    }
    if let Some(p) = proxy_option(hops, proxy_options) {
        parts.push(p);
    }
    parts.push(format!("{port_flag} {}", last.port));
    parts.push(format!("{}@{}", last.username, last.host));
    Ok(parts.join(" "))
}

/// `ssh <proxy-options> <extra-options> [-oProxyCommand=...] -p <port> user@host`
pub fn get_ssh_with_proxies(
    hops: &[Hop],
    proxy_options: &str,
    outer_options: &str,
) -> Result<String> {
    build_command("ssh", "-p", hops, proxy_options, outer_options)
}

/// `scp <proxy-options> [-oProxyCommand=...] -P <port> user@host:...`
/// (the trailing path is appended by the caller, matching
/// `jumper.get_scp_with_proxies`'s "build the connection half only" shape).
pub fn get_scp_with_proxies(hops: &[Hop], proxy_options: &str) -> Result<String> {
    build_command("scp", "-P", hops, proxy_options, "")
}

/// `sftp <proxy-options> [-oProxyCommand=...] -P <port> user@host`
pub fn get_sftp_with_proxies(hops: &[Hop], proxy_options: &str) -> Result<String> {
    build_command("sftp", "-P", hops, proxy_options, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_chain() {
        let entries = split_entries("a+b+c");
        assert_eq!(entries, vec!["a", "b", "c"]);
    }

    #[test]
    fn escaped_plus_survives_split() {
        let entries = split_entries("user:se++cret@host");
        assert_eq!(entries, vec!["user:se++cret@host"]);
    }

    #[test]
    fn parse_entry_defaults_port_and_user() {
        let hop = parse_entry("127.0.0.1", "alice").unwrap();
        assert_eq!(hop.username, "alice");
        assert_eq!(hop.port, 22);
        assert_eq!(hop.password, None);
    }

    #[test]
    fn parse_entry_password_form() {
        let hop = parse_entry("admin:se++cret@127.0.0.2", "alice").unwrap();
        assert_eq!(hop.username, "admin");
        assert_eq!(hop.password.as_deref(), Some("se+cret"));
    }

    #[test]
    fn parse_entry_keyfile_form() {
        let hop = parse_entry("admin=/home/a/.ssh/id_rsa@127.0.0.2", "alice").unwrap();
        assert_eq!(hop.keyfile.as_deref(), Some("/home/a/.ssh/id_rsa"));
        assert_eq!(hop.password, None);
    }

    #[test]
    fn parse_uphps_builds_password_map() {
        let (hops, passwords) = parse_uphps("srhaque@127.0.0.1+admin:secret@127.0.0.2").unwrap();
        assert_eq!(hops.len(), 2);
        assert_eq!(
            passwords.get("admin@127.0.0.2").map(String::as_str),
            Some("secret")
        );
        assert_eq!(passwords.len(), 1);
    }

    #[test]
    fn synthesizes_nested_proxy_command() {
        let (hops, _) = parse_uphps("srhaque@127.0.0.1+admin:secret@127.0.0.2").unwrap();
        let cmd =
            get_ssh_with_proxies(&hops, "-q -oStrictHostKeyChecking=no", "-tt").unwrap();
        assert!(cmd.starts_with("ssh -q -oStrictHostKeyChecking=no -tt"));
        assert!(cmd.contains(r#"-oProxyCommand="ssh -q -oStrictHostKeyChecking=no -W 127.0.0.2:22 -p 22 srhaque@127.0.0.1""#));
        assert!(cmd.ends_with("-p 22 admin@127.0.0.2"));
    }

    #[test]
    fn single_hop_has_no_proxy_command() {
        let (hops, _) = parse_uphps("alice@127.0.0.1").unwrap();
        let cmd = get_ssh_with_proxies(&hops, "-q", "-tt").unwrap();
        assert!(!cmd.contains("ProxyCommand"));
    }

    #[test]
    fn empty_password_form_does_not_enter_password_map() {
        let (hops, passwords) = parse_uphps("admin:@127.0.0.2").unwrap();
        assert_eq!(hops[0].password.as_deref(), Some(""));
        assert!(passwords.is_empty());
    }

    #[test]
    fn scp_and_sftp_use_capital_p_port_flag() {
        let (hops, _) = parse_uphps("alice@127.0.0.1").unwrap();
        let scp = get_scp_with_proxies(&hops, "-q").unwrap();
        assert!(scp.starts_with("scp -q"));
        assert!(scp.ends_with("-P 22 alice@127.0.0.1"));

        let sftp = get_sftp_with_proxies(&hops, "-q").unwrap();
        assert!(sftp.starts_with("sftp -q"));
        assert!(sftp.ends_with("-P 22 alice@127.0.0.1"));
    }
}

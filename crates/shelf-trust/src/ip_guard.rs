//! Static IP admission, evaluated before the rate limiter so a blocked
//! address never spends rate-limit budget.

use std::{
  collections::HashMap,
  net::{IpAddr, SocketAddr},
};

use shelf_core::admission::{IpAdmission, IpRule, IpVerdict};

/// Reason returned when a loopback caller is admitted under local bypass.
pub const LOCAL_DEV: &str = "local_dev";
/// Reason returned when a caller matches a deny rule.
pub const BLOCKED_IP: &str = "blocked_ip";
/// Sentinel client IP when nothing usable was found.
pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug, Default)]
pub struct IpGuard {
  /// Keyed by canonical address text.
  rules: HashMap<String, IpRule>,
}

impl IpGuard {
  /// Build a guard from static rules. If one address has both verdicts, deny
  /// wins.
  pub fn new(rules: impl IntoIterator<Item = IpRule>) -> Self {
    let mut by_ip: HashMap<String, IpRule> = HashMap::new();
    for rule in rules {
      let ip = normalize_ip(&rule.ip).unwrap_or_else(|| rule.ip.trim().to_owned());
      match by_ip.get(&ip) {
        Some(existing) if existing.verdict == IpVerdict::Deny => {}
        _ => {
          by_ip.insert(ip, rule);
        }
      }
    }
    Self { rules: by_ip }
  }

  /// Pick the most specific originating address: the first hop of
  /// `X-Forwarded-For`, then `X-Real-IP`, then the transport peer, then
  /// [`UNKNOWN_IP`]. Unparseable header values are skipped.
  pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<IpAddr>,
  ) -> String {
    forwarded_for
      .and_then(|v| v.split(',').next())
      .and_then(normalize_ip)
      .or_else(|| real_ip.and_then(normalize_ip))
      .or_else(|| peer.map(|ip| canonical(ip).to_string()))
      .unwrap_or_else(|| UNKNOWN_IP.to_owned())
  }

  /// Admit or refuse `source_ip`.
  pub fn admit(&self, source_ip: &str, local_bypass: bool) -> IpAdmission {
    let parsed = parse_ip(source_ip);
    let ip = parsed
      .map(|ip| ip.to_string())
      .unwrap_or_else(|| source_ip.trim().to_owned());

    if local_bypass && parsed.is_some_and(|ip| ip.is_loopback()) {
      return IpAdmission::admit(Some(LOCAL_DEV));
    }

    match self.rules.get(&ip) {
      Some(rule) if rule.verdict == IpVerdict::Deny => {
        tracing::warn!(ip = %ip, rule_reason = %rule.reason, "refused blocked ip");
        IpAdmission::refuse(BLOCKED_IP)
      }
      Some(rule) => {
        IpAdmission::admit(Some(rule.reason.as_str()).filter(|r| !r.is_empty()))
      }
      None => IpAdmission::admit(None),
    }
  }

  pub fn rule_count(&self) -> usize { self.rules.len() }
}

/// Canonical text for an address, or `None` if `raw` is not one.
pub fn normalize_ip(raw: &str) -> Option<String> {
  parse_ip(raw).map(|ip| ip.to_string())
}

/// Accepts bare addresses, bracketed IPv6, and `addr:port` forms.
/// IPv4-mapped IPv6 addresses are unwrapped to IPv4.
fn parse_ip(raw: &str) -> Option<IpAddr> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  raw
    .parse::<IpAddr>()
    .ok()
    .or_else(|| raw.parse::<SocketAddr>().ok().map(|sa| sa.ip()))
    .or_else(|| {
      raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .and_then(|r| r.parse::<IpAddr>().ok())
    })
    .map(canonical)
}

fn canonical(ip: IpAddr) -> IpAddr {
  match ip {
    IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
    v4 => v4,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deny(ip: &str) -> IpRule {
    IpRule { ip: ip.into(), verdict: IpVerdict::Deny, reason: "scraper".into() }
  }

  fn guard() -> IpGuard {
    IpGuard::new([
      deny("198.51.100.7"),
      deny("127.0.0.1"),
      deny("2001:db8::1"),
      IpRule { ip: "203.0.113.5".into(), verdict: IpVerdict::Allow, reason: "partner".into() },
    ])
  }

  #[test]
  fn loopback_with_bypass_is_local_dev() {
    let g = guard();
    for ip in ["127.0.0.1", "::1", "::ffff:127.0.0.1"] {
      let a = g.admit(ip, true);
      assert!(a.admitted, "{ip}");
      assert_eq!(a.reason.as_deref(), Some(LOCAL_DEV));
    }
  }

  #[test]
  fn blocked_ip_refused_regardless_of_bypass() {
    let g = guard();
    for bypass in [true, false] {
      let a = g.admit("198.51.100.7", bypass);
      assert!(!a.admitted);
      assert_eq!(a.reason.as_deref(), Some(BLOCKED_IP));
    }
    assert!(!g.admit("2001:DB8:0::1", false).admitted);
    assert!(!g.admit("::ffff:198.51.100.7", false).admitted);
  }

  #[test]
  fn blocked_loopback_without_bypass_is_refused() {
    let a = guard().admit("127.0.0.1", false);
    assert!(!a.admitted);
    assert_eq!(a.reason.as_deref(), Some(BLOCKED_IP));
  }

  #[test]
  fn unlisted_and_allowed_ips_pass() {
    let g = guard();
    assert_eq!(g.admit("192.0.2.1", false), IpAdmission::admit(None));
    assert_eq!(g.admit("203.0.113.5", false), IpAdmission::admit(Some("partner")));
    assert!(g.admit(UNKNOWN_IP, true).admitted);
  }

  #[test]
  fn deny_wins_over_allow_for_same_ip() {
    let g = IpGuard::new([
      deny("192.0.2.9"),
      IpRule { ip: "192.0.2.9".into(), verdict: IpVerdict::Allow, reason: String::new() },
    ]);
    assert!(!g.admit("192.0.2.9", false).admitted);
    assert_eq!(g.rule_count(), 1);
  }

  #[test]
  fn client_ip_prefers_forwarded_first_hop() {
    let peer: IpAddr = "10.0.0.2".parse().unwrap();
    assert_eq!(
      IpGuard::client_ip(Some(" 198.51.100.7 , 10.0.0.1"), Some("192.0.2.1"), Some(peer)),
      "198.51.100.7"
    );
    assert_eq!(IpGuard::client_ip(Some("garbage"), Some("192.0.2.1"), Some(peer)), "192.0.2.1");
    assert_eq!(IpGuard::client_ip(None, None, Some(peer)), "10.0.0.2");
    assert_eq!(IpGuard::client_ip(Some("[2001:db8::1]:443"), None, None), "2001:db8::1");
    assert_eq!(IpGuard::client_ip(None, None, None), UNKNOWN_IP);
  }
}

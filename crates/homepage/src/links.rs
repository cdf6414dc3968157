//! Entries of the Connect panel, built from the conf file: node and indexer
//! endpoints, web front-ends, and the Dojo pairing payload.

use serde::Serialize;
use serde_json::Value;

use crate::ConfMap;

pub const DEFAULT_BITCOIN_P2P_PORT: u16 = 8333;
pub const DEFAULT_FULCRUM_TCP_PORT: u16 = 50001;
pub const DEFAULT_FULCRUM_SSL_PORT: u16 = 50002;
pub const DEFAULT_MONERO_RPC_PORT: u16 = 18089;
pub const DEFAULT_DOJO_VERSION: &str = "1.27.0";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceLink {
    pub label: String,
    pub value: String,
    /// Shown with a QR thumbnail that opens the zoom modal.
    pub zoomable: bool,
}

impl ServiceLink {
    fn new(label: &str, value: String, zoomable: bool) -> Self {
        Self {
            label: label.to_string(),
            value,
            zoomable,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DojoPairing {
    pub pairing: PairingApi,
    pub explorer: PairingExplorer,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PairingApi {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: String,
    pub apikey: String,
    pub url: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PairingExplorer {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
}

impl DojoPairing {
    pub fn new(version: &str, apikey: &str, pairing_url: &str, explorer_url: &str) -> Self {
        Self {
            pairing: PairingApi {
                kind: "dojo.api",
                version: version.to_string(),
                apikey: apikey.to_string(),
                url: ensure_v2_suffix(pairing_url),
            },
            explorer: PairingExplorer {
                kind: "explorer.btc_rpc_explorer",
                url: explorer_url.to_string(),
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.pairing.apikey.is_empty() || !self.pairing.url.is_empty()
    }

    /// Minified JSON, the exact text wallets expect to scan.
    pub fn to_min_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|err| err.to_string())
    }
}

/// Trims, strips trailing slashes and appends `/v2` unless already there.
pub fn ensure_v2_suffix(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() {
        return String::new();
    }
    if url.ends_with("/v2") {
        url.to_string()
    } else {
        format!("{url}/v2")
    }
}

/// Prefixes `http://` onto addresses pasted without a scheme.
pub fn ensure_http(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!("http://{url}")
}

fn conf_value<'a>(conf: &'a ConfMap, key: &str) -> Option<&'a str> {
    conf.get(key)
        .and_then(|values| values.last())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn first_conf_value<'a>(conf: &'a ConfMap, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| conf_value(conf, key))
}

fn conf_port(conf: &ConfMap, key: &str, default: u16) -> Result<u16, String> {
    match conf_value(conf, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| format!("invalid {key} '{raw}'")),
    }
}

fn with_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{port}")
    }
}

/// Builds the pairing payload. Explicit keys win over `dojorawjson`, and a
/// mempool onion replaces the explorer URL.
pub fn dojo_pairing(conf: &ConfMap) -> DojoPairing {
    let raw: Value = conf_value(conf, "dojorawjson")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    let raw_field = |section: &str, field: &str| -> Option<String> {
        raw.get(section)
            .filter(|value| value.is_object())
            .and_then(|section| section.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    // `dojoversion` has a default, so the raw version only shows through
    // when the key is set to an empty value.
    let version = match conf.get("dojoversion").and_then(|values| values.last()) {
        Some(value) if value.trim().is_empty() => {
            raw_field("pairing", "version").unwrap_or_else(|| DEFAULT_DOJO_VERSION.to_string())
        }
        Some(value) => value.trim().to_string(),
        None => DEFAULT_DOJO_VERSION.to_string(),
    };
    let apikey = conf_value(conf, "dojoapikey")
        .map(str::to_string)
        .or_else(|| raw_field("pairing", "apikey"))
        .unwrap_or_default();
    let pairing_url = conf_value(conf, "dojourl")
        .map(str::to_string)
        .or_else(|| raw_field("pairing", "url"))
        .unwrap_or_default();
    let explorer_url = match conf_value(conf, "mempoolonion") {
        Some(onion) => format!("http://{onion}"),
        None => conf_value(conf, "explorerurl")
            .map(str::to_string)
            .or_else(|| raw_field("explorer", "url"))
            .unwrap_or_default(),
    };

    DojoPairing::new(&version, &apikey, &pairing_url, &explorer_url)
}

pub fn service_links(conf: &ConfMap) -> Result<Vec<ServiceLink>, String> {
    let mut links = Vec::new();

    if let Some(onion) = conf_value(conf, "bitcoinp2ponion") {
        let port = conf_port(conf, "bitcoinp2pport", DEFAULT_BITCOIN_P2P_PORT)?;
        links.push(ServiceLink::new("Bitcoin P2P", with_port(onion, port), true));
    }

    let tcp_port = conf_port(conf, "fulcrumtcpport", DEFAULT_FULCRUM_TCP_PORT)?;
    let ssl_port = conf_port(conf, "fulcrumsslport", DEFAULT_FULCRUM_SSL_PORT)?;
    if let Some(local) = conf_value(conf, "fulcrumlocaladdress") {
        links.push(ServiceLink::new("Fulcrum TCP", with_port(local, tcp_port), true));
        links.push(ServiceLink::new("Fulcrum SSL", with_port(local, ssl_port), true));
    }
    if let Some(onion) = conf_value(conf, "fulcrumoniontcp") {
        links.push(ServiceLink::new("Fulcrum TCP (Tor)", with_port(onion, tcp_port), true));
    }
    if let Some(onion) = conf_value(conf, "fulcrumonionssl") {
        links.push(ServiceLink::new("Fulcrum SSL (Tor)", with_port(onion, ssl_port), true));
    }

    if let Some(url) = first_conf_value(conf, &["mempoolclearnet", "mempoollocal"]) {
        links.push(ServiceLink::new("Mempool", url.to_string(), false));
    }
    if let Some(onion) = conf_value(conf, "mempoolonion") {
        links.push(ServiceLink::new("Mempool (Tor)", ensure_http(onion), true));
    }
    if let Some(url) = first_conf_value(conf, &["robosatsclearnet", "robosatslocal"]) {
        links.push(ServiceLink::new("RoboSats", url.to_string(), false));
    }
    if let Some(onion) = conf_value(conf, "robosatsonion") {
        links.push(ServiceLink::new("RoboSats (Tor)", ensure_http(onion), true));
    }
    if let Some(onion) = conf_value(conf, "moneroonion") {
        let port = conf_port(conf, "monerorpcport", DEFAULT_MONERO_RPC_PORT)?;
        links.push(ServiceLink::new("Monero RPC", with_port(onion, port), true));
    }

    let dojo = dojo_pairing(conf);
    if dojo.is_configured() {
        links.push(ServiceLink::new("Dojo pairing", dojo.to_min_json()?, true));
    }
    if let Some(url) = conf_value(conf, "dojomaintenanceurl") {
        links.push(ServiceLink::new("Dojo maintenance", ensure_http(url), true));
    }

    for raw in conf.get("link").into_iter().flatten() {
        let Some((label, value)) = raw.split_once('|') else {
            return Err(format!("invalid link '{raw}' (expected Label|value)"));
        };
        let (label, value) = (label.trim(), value.trim());
        if label.is_empty() || value.is_empty() {
            return Err(format!("invalid link '{raw}' (expected Label|value)"));
        }
        links.push(ServiceLink::new(label, value.to_string(), true));
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(pairs: &[(&str, &str)]) -> ConfMap {
        let mut conf = ConfMap::new();
        for (key, value) in pairs {
            conf.entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        conf
    }

    #[test]
    fn v2_suffix_is_exact() {
        assert_eq!(ensure_v2_suffix("http://dojo.onion/v2/"), "http://dojo.onion/v2");
        assert_eq!(ensure_v2_suffix(" http://dojo.onion// "), "http://dojo.onion/v2");
        assert_eq!(ensure_v2_suffix("http://dojo.onion/v2"), "http://dojo.onion/v2");
        assert_eq!(ensure_v2_suffix(""), "");
    }

    #[test]
    fn http_prefix_only_when_missing() {
        assert_eq!(ensure_http("abc.onion"), "http://abc.onion");
        assert_eq!(ensure_http("https://abc.onion"), "https://abc.onion");
        assert_eq!(ensure_http(""), "");
    }

    #[test]
    fn pairing_json_keeps_wallet_key_order() {
        let dojo = DojoPairing::new("1.27.0", "key", "http://dojo.onion", "");
        assert_eq!(
            dojo.to_min_json().expect("json"),
            r#"{"pairing":{"type":"dojo.api","version":"1.27.0","apikey":"key","url":"http://dojo.onion/v2"},"explorer":{"type":"explorer.btc_rpc_explorer","url":""}}"#
        );
    }

    #[test]
    fn explicit_keys_override_raw_json() {
        let conf = conf(&[
            (
                "dojorawjson",
                r#"{"pairing":{"apikey":"raw-key","url":"http://raw.onion/v2","version":"1.0"},"explorer":{"url":"http://raw-explorer.onion"}}"#,
            ),
            ("dojoapikey", "conf-key"),
        ]);
        let dojo = dojo_pairing(&conf);
        assert_eq!(dojo.pairing.apikey, "conf-key");
        assert_eq!(dojo.pairing.url, "http://raw.onion/v2");
        assert_eq!(dojo.pairing.version, DEFAULT_DOJO_VERSION);
        assert_eq!(dojo.explorer.url, "http://raw-explorer.onion");
    }

    #[test]
    fn mempool_onion_replaces_explorer() {
        let conf = conf(&[
            ("dojourl", "http://dojo.onion"),
            ("explorerurl", "http://explorer.onion"),
            ("mempoolonion", "mempool.onion"),
        ]);
        assert_eq!(dojo_pairing(&conf).explorer.url, "http://mempool.onion");
    }

    #[test]
    fn invalid_raw_json_is_ignored() {
        let conf = conf(&[("dojorawjson", "{not json"), ("dojourl", "http://d.onion")]);
        let dojo = dojo_pairing(&conf);
        assert_eq!(dojo.pairing.url, "http://d.onion/v2");
        assert_eq!(dojo.pairing.apikey, "");
    }

    #[test]
    fn links_follow_conf_with_default_ports() {
        let conf = conf(&[
            ("bitcoinp2ponion", "node.onion"),
            ("fulcrumlocaladdress", "umbrel.local"),
            ("fulcrumsslport", "50010"),
            ("mempoollocal", "http://umbrel.local:3006"),
            ("moneroonion", "xmr.onion"),
            ("dojomaintenanceurl", "maint.onion/admin"),
            ("link", "Explorer|http://explorer.local"),
        ]);
        let links = service_links(&conf).expect("links");
        let pairs: Vec<(&str, &str)> = links
            .iter()
            .map(|link| (link.label.as_str(), link.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Bitcoin P2P", "node.onion:8333"),
                ("Fulcrum TCP", "umbrel.local:50001"),
                ("Fulcrum SSL", "umbrel.local:50010"),
                ("Mempool", "http://umbrel.local:3006"),
                ("Monero RPC", "xmr.onion:18089"),
                ("Dojo maintenance", "http://maint.onion/admin"),
                ("Explorer", "http://explorer.local"),
            ]
        );
        assert!(!links[3].zoomable);
    }

    #[test]
    fn bad_port_and_bad_link_are_rejected() {
        let err = service_links(&conf(&[("bitcoinp2ponion", "n.onion"), ("bitcoinp2pport", "x")]))
            .expect_err("port");
        assert!(err.contains("bitcoinp2pport"), "{err}");
        assert!(service_links(&conf(&[("link", "no separator")])).is_err());
    }

    #[test]
    fn dojo_link_appears_once_configured() {
        let links = service_links(&conf(&[("dojoapikey", "k")])).expect("links");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].label, "Dojo pairing");
        assert!(links[0].value.starts_with(r#"{"pairing":{"type":"dojo.api""#));
    }
}

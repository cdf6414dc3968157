use homepage_log as logging;

macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if crate::logging::enabled($level) {
            crate::logging::log($level, module_path!(), format_args!($($arg)*));
        }
    }};
}

macro_rules! log_error {
    ($($arg:tt)*) => {{
        log_at!(crate::logging::Level::Error, $($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        log_at!(crate::logging::Level::Warn, $($arg)*);
    }};
}

macro_rules! log_info {
    ($($arg:tt)*) => {{
        log_at!(crate::logging::Level::Info, $($arg)*);
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        log_at!(crate::logging::Level::Debug, $($arg)*);
    }};
}

pub mod clipboard;
pub mod collapsible;
pub mod dashboard;
pub mod links;
pub mod page;
pub mod poller;
pub mod render;
pub mod scheduler;
pub mod tui;
pub mod zoom;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use tokio::runtime::Handle;

use crate::clipboard::Clipboard;
use crate::dashboard::{build_page, Dashboard, PanelKind};
use crate::links::ServiceLink;
use crate::poller::{spawn_poll_all, StatusClient};
use crate::scheduler::{Scheduler, DEFAULT_PERIOD};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8088";
pub const DEFAULT_CONF_FILE: &str = "homepage.conf";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TITLE: &str = "Bitcoin Node";

/// `key=value` pairs from the conf file; every value of a repeated key is
/// kept in order.
pub type ConfMap = HashMap<String, Vec<String>>;

#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: String,
    pub conf_path: Option<PathBuf>,
    pub refresh: Duration,
    pub timeout: Duration,
    pub default_panel: PanelKind,
    pub discard_stale: bool,
    pub log_level: logging::Level,
    pub log_format: logging::Format,
    pub log_timestamps: bool,
    pub title: String,
    pub links: Vec<ServiceLink>,
}

#[derive(Debug)]
pub enum CliAction {
    Run(Config),
    PrintHelp,
    PrintVersion,
}

pub async fn run_entry() -> Result<(), String> {
    match parse_args()? {
        CliAction::PrintHelp => {
            println!("{}", usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("homepage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Run(config) => run_with_config(config).await,
    }
}

async fn run_with_config(config: Config) -> Result<(), String> {
    logging::init(logging::LogConfig {
        level: config.log_level,
        format: config.log_format,
        timestamps: config.log_timestamps,
    });

    log_info!(
        "Startup: endpoint={} refresh={}s conf={}",
        config.endpoint,
        config.refresh.as_secs(),
        config
            .conf_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let client = Arc::new(
        StatusClient::new(&config.endpoint, config.timeout).map_err(|err| err.to_string())?,
    );
    let (outcome_tx, outcome_rx) = unbounded();
    let handle = Handle::current();

    let mut dashboard = Dashboard::new(
        build_page(&config.links),
        Clipboard::system(),
        config.discard_stale,
    );
    let poll_all = {
        let handle = handle.clone();
        let client = Arc::clone(&client);
        let outcome_tx = outcome_tx.clone();
        move || spawn_poll_all(&handle, &client, &outcome_tx)
    };
    let mut scheduler = Scheduler::new();
    start_dashboard(
        &mut dashboard,
        config.default_panel,
        &handle,
        &mut scheduler,
        config.refresh,
        &poll_all,
    );

    let info = tui::HeaderInfo {
        title: config.title.clone(),
        endpoint: config.endpoint.clone(),
        refresh: config.refresh,
    };
    let result = tokio::task::spawn_blocking(move || {
        tui::run_tui(dashboard, info, outcome_rx, poll_all)
    })
    .await
    .map_err(|err| format!("dashboard thread failed: {err}"))?;

    scheduler.stop();
    log_info!("Shutdown");
    result
}

/// Bootstrap order: bind targets and open the default panel, poll both feeds
/// once, then hand `poll_all` to the refresh timer.
fn start_dashboard<F>(
    dashboard: &mut Dashboard,
    default_panel: PanelKind,
    handle: &Handle,
    scheduler: &mut Scheduler,
    refresh: Duration,
    poll_all: &F,
) where
    F: Fn() + Clone + Send + 'static,
{
    dashboard.bootstrap(default_panel);
    poll_all();
    scheduler.start(handle, refresh, poll_all.clone());
}

fn parse_args() -> Result<CliAction, String> {
    parse_args_from(std::env::args().skip(1), Path::new(DEFAULT_CONF_FILE))
}

fn parse_secs(flag: &str, value: &str) -> Result<Duration, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(format!("{flag} must be at least 1 second")),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(format!("invalid {flag} '{value}'")),
    }
}

fn parse_endpoint(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(format!("invalid endpoint '{value}' (expected http:// or https://)"))
    }
}

/// Parses CLI arguments. `default_conf` is read when no `--conf` is given
/// and may be absent.
pub fn parse_args_from<I>(raw_args: I, default_conf: &Path) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut endpoint = DEFAULT_ENDPOINT.to_string();
    let mut endpoint_set = false;
    let mut conf_path: Option<PathBuf> = None;
    let mut refresh = DEFAULT_PERIOD;
    let mut refresh_set = false;
    let mut timeout = DEFAULT_TIMEOUT;
    let mut timeout_set = false;
    let mut default_panel = PanelKind::Bitcoin;
    let mut default_panel_set = false;
    let mut discard_stale = false;
    let mut discard_stale_set = false;
    let mut log_level = logging::Level::Info;
    let mut log_level_set = false;
    let mut log_format = logging::Format::Text;
    let mut log_format_set = false;
    let mut log_timestamps = true;
    let mut log_timestamps_set = false;
    let mut title = DEFAULT_TITLE.to_string();
    let mut title_set = false;
    let mut args = raw_args.into_iter().peekable();

    if let Some(first) = args.peek().map(|value| value.as_str()) {
        match first {
            "help" => return Ok(CliAction::PrintHelp),
            "version" => return Ok(CliAction::PrintVersion),
            _ => {}
        }
    }
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--endpoint" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --endpoint\n{}", usage()))?;
                endpoint = parse_endpoint(&value).map_err(|err| format!("{err}\n{}", usage()))?;
                endpoint_set = true;
            }
            "--conf" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --conf\n{}", usage()))?;
                conf_path = Some(PathBuf::from(value));
            }
            "--refresh-secs" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --refresh-secs\n{}", usage()))?;
                refresh = parse_secs("--refresh-secs", &value)
                    .map_err(|err| format!("{err}\n{}", usage()))?;
                refresh_set = true;
            }
            "--timeout-secs" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --timeout-secs\n{}", usage()))?;
                timeout = parse_secs("--timeout-secs", &value)
                    .map_err(|err| format!("{err}\n{}", usage()))?;
                timeout_set = true;
            }
            "--default-panel" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --default-panel\n{}", usage()))?;
                default_panel = PanelKind::parse(&value)
                    .ok_or_else(|| format!("invalid panel '{value}'\n{}", usage()))?;
                default_panel_set = true;
            }
            "--discard-stale" => {
                discard_stale = true;
                discard_stale_set = true;
            }
            "--log-level" | "--loglevel" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --log-level\n{}", usage()))?;
                log_level = logging::Level::parse(&value)
                    .ok_or_else(|| format!("invalid log level '{value}'\n{}", usage()))?;
                log_level_set = true;
            }
            "--log-format" | "--logformat" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for --log-format\n{}", usage()))?;
                log_format = logging::Format::parse(&value)
                    .ok_or_else(|| format!("invalid log format '{value}'\n{}", usage()))?;
                log_format_set = true;
            }
            "--log-timestamps" | "--logtimestamps" => {
                log_timestamps = true;
                log_timestamps_set = true;
            }
            "--no-log-timestamps" | "--no-logtimestamps" => {
                log_timestamps = false;
                log_timestamps_set = true;
            }
            "--title" => {
                title = args
                    .next()
                    .ok_or_else(|| format!("missing value for --title\n{}", usage()))?;
                title_set = true;
            }
            "--help" | "-h" => return Ok(CliAction::PrintHelp),
            "--version" | "-V" => return Ok(CliAction::PrintVersion),
            other => return Err(format!("unknown argument '{other}'\n{}", usage())),
        }
    }

    // An explicit --conf must exist; the default one is optional.
    let explicit_conf = conf_path.is_some();
    let conf_file = conf_path.unwrap_or_else(|| default_conf.to_path_buf());
    let conf = match load_conf(&conf_file)? {
        Some(conf) => Some(conf),
        None if explicit_conf => {
            return Err(format!("conf file {} not found", conf_file.display()));
        }
        None => None,
    };

    let mut links = Vec::new();
    if let Some(conf) = conf.as_ref() {
        let last = |key: &str| conf.get(key).and_then(|values| values.last());

        if !endpoint_set {
            if let Some(raw) = last("endpoint") {
                endpoint = parse_endpoint(raw)
                    .map_err(|err| format!("{err} in {}", conf_file.display()))?;
            }
        }
        if !refresh_set {
            if let Some(raw) = last("refreshsecs") {
                refresh = parse_secs("refreshsecs", raw)
                    .map_err(|err| format!("{err} in {}", conf_file.display()))?;
            }
        }
        if !timeout_set {
            if let Some(raw) = last("timeoutsecs") {
                timeout = parse_secs("timeoutsecs", raw)
                    .map_err(|err| format!("{err} in {}", conf_file.display()))?;
            }
        }
        if !default_panel_set {
            if let Some(raw) = last("defaultpanel") {
                default_panel = PanelKind::parse(raw).ok_or_else(|| {
                    format!("invalid defaultpanel '{raw}' in {}", conf_file.display())
                })?;
            }
        }
        if !discard_stale_set {
            if let Some(raw) = last("discardstale") {
                discard_stale = parse_conf_bool(raw).ok_or_else(|| {
                    format!("invalid discardstale value '{raw}' in {}", conf_file.display())
                })?;
            }
        }
        if !log_level_set {
            if let Some(raw) = last("loglevel") {
                log_level = logging::Level::parse(raw).ok_or_else(|| {
                    format!("invalid loglevel '{raw}' in {}", conf_file.display())
                })?;
            }
        }
        if !log_format_set {
            if let Some(raw) = last("logformat") {
                log_format = logging::Format::parse(raw).ok_or_else(|| {
                    format!("invalid logformat '{raw}' in {}", conf_file.display())
                })?;
            }
        }
        if !log_timestamps_set {
            if let Some(raw) = last("logtimestamps") {
                log_timestamps = parse_conf_bool(raw).ok_or_else(|| {
                    format!("invalid logtimestamps value '{raw}' in {}", conf_file.display())
                })?;
            }
        }
        if !title_set {
            if let Some(raw) = last("apptitle").filter(|raw| !raw.is_empty()) {
                title = raw.clone();
            }
        }

        links = crate::links::service_links(conf)
            .map_err(|err| format!("{err} in {}", conf_file.display()))?;
    }

    Ok(CliAction::Run(Config {
        endpoint,
        conf_path: conf.is_some().then_some(conf_file),
        refresh,
        timeout,
        default_panel,
        discard_stale,
        log_level,
        log_format,
        log_timestamps,
        title,
        links,
    }))
}

/// Reads a `key=value` conf file. A missing file is `Ok(None)`.
pub fn load_conf(path: &Path) -> Result<Option<ConfMap>, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("failed to read {}: {err}", path.display())),
    };

    let mut out = ConfMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), strip_inline_comment(value.trim())),
            None => (strip_inline_comment(line), "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(Some(out))
}

/// Drops a ` #` or ` ;` trailing comment. Values such as URLs keep a `#`
/// that is not preceded by whitespace.
fn strip_inline_comment(value: &str) -> &str {
    let mut end = value.len();
    for marker in [" #", "\t#", " ;", "\t;"] {
        if let Some(idx) = value.find(marker) {
            end = end.min(idx);
        }
    }
    value[..end].trim()
}

pub fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn usage() -> String {
    [
        "Usage:",
        "  homepage [options]",
        "  homepage <command>",
        "",
        "Commands:",
        "  help     Print this help and exit",
        "  version  Print version and exit",
        "",
        "Options:",
        "  --help, -h  Print this help and exit",
        "  --version, -V  Print version and exit",
        "  --endpoint  Homepage backend base URL (default: http://127.0.0.1:8088)",
        "  --conf  Config file path (default: ./homepage.conf if present)",
        "  --refresh-secs  Seconds between status polls (default: 30)",
        "  --timeout-secs  Per-request timeout in seconds (default: 5)",
        "  --default-panel  Panel open at start: bitcoin|fulcrum|links (default: bitcoin)",
        "  --discard-stale  Drop answers older than the last one applied for the same feed",
        "  --title  Header title (default: Bitcoin Node)",
        "  --log-level  Log level: error|warn|info|debug|trace (default: info)",
        "  --log-format  Log format: text|json (default: text)",
        "  --log-timestamps  Include timestamps in text logs (default)",
        "  --no-log-timestamps  Omit timestamps from text logs",
        "",
        "Conf keys mirror the options without dashes (endpoint, refreshsecs, timeoutsecs,",
        "defaultpanel, discardstale, loglevel, logformat, logtimestamps, apptitle) plus the",
        "Connect panel entries: bitcoinp2ponion, bitcoinp2pport, fulcrumlocaladdress,",
        "fulcrumtcpport, fulcrumsslport, fulcrumoniontcp, fulcrumonionssl, mempoolclearnet,",
        "mempoollocal, mempoolonion, robosatsclearnet, robosatslocal, robosatsonion,",
        "moneroonion, monerorpcport, dojorawjson, dojoapikey, dojourl, dojoversion,",
        "explorerurl, dojomaintenanceurl and repeatable link=Label|value.",
    ]
    .join("\n")
}

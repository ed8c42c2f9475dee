//! System monitor - service status, restarts, host metrics and logs
//!
//! Only services on the allowlist can be restarted. Every external command
//! is spawned with an argument list; nothing goes through `sh -c`.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::path::Path;
use std::process::Output;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSLOG_PATH: &str = "/var/log/syslog";
pub const POSTGRES_LOG_PATH: &str = "/var/log/postgresql/postgresql-15-main.log";
pub const LOG_TAIL_LINES: usize = 50;
pub const NO_LOGS: &str = "No logs available.";

/// Samples kept for the dashboard charts
pub const HISTORY_CAPACITY: usize = 500;

const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Which services may be restarted, and how commands are bounded
pub struct ServicePolicy {
    /// service id -> systemd unit
    allowed: HashMap<String, String>,
    /// Maximum output size in bytes before truncation
    pub max_output_bytes: usize,
    /// Command timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        let mut policy = Self::empty();
        for svc in [
            "cron",
            "ntp",
            "freeradius",
            "nginx",
            "postgresql",
            "strongswan",
            "sshd",
            "prolter",
        ] {
            policy.allow(svc, svc);
        }
        policy
    }
}

impl ServicePolicy {
    /// A policy that allows no restarts
    pub fn empty() -> Self {
        Self {
            allowed: HashMap::new(),
            max_output_bytes: 64 * 1024, // 64KB
            timeout_secs: 30,
        }
    }

    pub fn allow(&mut self, id: &str, unit: &str) {
        self.allowed.insert(id.to_string(), unit.to_string());
    }

    pub fn deny(&mut self, id: &str) {
        self.allowed.remove(id);
    }

    /// Resolve a service id to its systemd unit
    pub fn check(&self, id: &str) -> Result<&str, MonitorError> {
        self.allowed
            .get(id.trim())
            .map(String::as_str)
            .ok_or_else(|| MonitorError::UnknownService(id.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid or unauthorized service: {0}")]
    UnknownService(String),
    #[error("Failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("Could not parse {0}")]
    Parse(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A service shown on the monitor page
#[derive(Debug, Clone, Copy)]
pub struct MonitoredService {
    pub id: &'static str,
    pub name_key: &'static str,
    /// `None` means "look for a process instead"
    pub systemd: Option<&'static str>,
}

pub const MONITORED_SERVICES: &[MonitoredService] = &[
    MonitoredService { id: "ubuntu", name_key: "service_ubuntu", systemd: None },
    MonitoredService { id: "cron", name_key: "service_cron", systemd: Some("cron") },
    MonitoredService { id: "ntp", name_key: "service_ntp", systemd: Some("ntp") },
    MonitoredService { id: "freeradius", name_key: "service_freeradius", systemd: Some("freeradius") },
    MonitoredService { id: "nginx", name_key: "service_nginx", systemd: Some("nginx") },
    MonitoredService { id: "nodejs", name_key: "service_nodejs", systemd: None },
    MonitoredService { id: "postgresql", name_key: "service_postgresql", systemd: Some("postgresql") },
    MonitoredService { id: "strongswan", name_key: "service_strongswan", systemd: Some("strongswan") },
    MonitoredService { id: "sshd", name_key: "service_sshd", systemd: Some("sshd") },
    MonitoredService { id: "prolter", name_key: "service_prolter", systemd: Some("prolter") },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub id: String,
    pub name_key: String,
    pub status: ServiceState,
}

async fn run(policy: &ServicePolicy, program: &str, args: &[&str]) -> Result<Output, MonitorError> {
    let spawn_err = |reason: String| MonitorError::Spawn {
        program: program.to_string(),
        reason,
    };

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args).kill_on_drop(true);
    let fut = cmd.output();

    match tokio::time::timeout(Duration::from_secs(policy.timeout_secs), fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(spawn_err(e.to_string())),
        Err(_) => Err(spawn_err(format!("timed out after {}s", policy.timeout_secs))),
    }
}

/// Current state of every monitored service. Failures count as inactive.
pub async fn service_statuses(policy: &ServicePolicy) -> Vec<ServiceStatus> {
    let mut results = Vec::with_capacity(MONITORED_SERVICES.len());

    for svc in MONITORED_SERVICES {
        let active = match svc.systemd {
            Some(unit) => run(policy, "systemctl", &["is-active", unit])
                .await
                .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "active"),
            None => run(policy, "pgrep", &["-f", svc.id])
                .await
                .map(|out| out.status.success()),
        };

        let active = active.unwrap_or_else(|e| {
            debug!(service = svc.id, error = %e, "Service check failed");
            false
        });

        results.push(ServiceStatus {
            id: svc.id.to_string(),
            name_key: svc.name_key.to_string(),
            status: if active { ServiceState::Active } else { ServiceState::Inactive },
        });
    }
    results
}

/// `sudo systemctl restart <unit>` for an allowlisted service
pub async fn restart_service(policy: &ServicePolicy, id: &str) -> Result<(), MonitorError> {
    let unit = policy.check(id)?;
    let output = run(policy, "sudo", &["systemctl", "restart", unit]).await?;

    if !output.status.success() {
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr), policy.max_output_bytes);
        warn!(service = id, %stderr, "Service restart failed");
        return Err(MonitorError::CommandFailed {
            program: "systemctl restart".to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(())
}

/// One ICMP echo with a 2s wait. Any failure to run ping counts as down.
pub async fn ping_host(policy: &ServicePolicy, addr: IpAddr) -> bool {
    let target = addr.to_string();
    match run(policy, "ping", &["-c", "1", "-W", "2", target.as_str()]).await {
        Ok(out) => out.status.success(),
        Err(e) => {
            debug!(%addr, error = %e, "ping failed to run");
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Ok,
    Error,
}

/// One dashboard card
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub name_key: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub icon: &'static str,
    pub status: CardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
}

/// First field of `/proc/loadavg`
pub fn parse_loadavg(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// 1-minute load as a percentage of the core count, capped at 100
pub fn cpu_usage_percent(load1: f64, cores: usize) -> u32 {
    if cores == 0 {
        return 0;
    }
    ((load1 / cores as f64) * 100.0).round().clamp(0.0, 100.0) as u32
}

/// `(total, available)` in bytes from `/proc/meminfo`.
/// Falls back to `MemFree` on kernels without `MemAvailable`.
pub fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next()?.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some((total, available))
}

/// `(used, size)` in GB from `df --output=used,size -BG /`
pub fn parse_df(text: &str) -> Option<(u64, u64)> {
    let last = text.lines().rev().find(|l| !l.trim().is_empty())?;
    let mut fields = last
        .split_whitespace()
        .map(|f| f.trim_end_matches('G').parse::<u64>());
    let used = fields.next()?.ok()?;
    let size = fields.next()?.ok()?;
    Some((used, size))
}

fn gb_one_decimal(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 10.0).round() / 10.0
}

fn percent(part: f64, whole: f64) -> u32 {
    if whole <= 0.0 {
        return 0;
    }
    (part / whole * 100.0).round().clamp(0.0, 100.0) as u32
}

/// CPU, RAM, disk and PostgreSQL cards for the dashboard
pub async fn metric_cards(policy: &ServicePolicy) -> Result<Vec<MetricCard>, MonitorError> {
    let loadavg = tokio::fs::read_to_string("/proc/loadavg").await?;
    let load1 = parse_loadavg(&loadavg).ok_or(MonitorError::Parse("/proc/loadavg"))?;
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let cpu = cpu_usage_percent(load1, cores);

    let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
    let (total, available) = parse_meminfo(&meminfo).ok_or(MonitorError::Parse("/proc/meminfo"))?;
    let ram_used = gb_one_decimal(total.saturating_sub(available));
    let ram_total = gb_one_decimal(total);

    let df = run(policy, "df", &["--output=used,size", "-BG", "/"]).await?;
    let (disk_used, disk_total) =
        parse_df(&String::from_utf8_lossy(&df.stdout)).ok_or(MonitorError::Parse("df output"))?;

    // pg_isready exits non-zero when the server is down; that is a status, not an error
    let pg_connected = match run(policy, "pg_isready", &[]).await {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains("accepting connections"),
        Err(e) => {
            warn!(error = %e, "pg_isready unavailable");
            false
        }
    };

    Ok(vec![
        MetricCard {
            name_key: "cpu_usage",
            value: json!(cpu),
            unit: Some("%".to_string()),
            icon: "Cpu",
            status: CardStatus::Ok,
            progress: Some(cpu),
        },
        MetricCard {
            name_key: "ram_usage",
            value: json!(ram_used),
            unit: Some(format!("/{ram_total} GB")),
            icon: "MemoryStick",
            status: CardStatus::Ok,
            progress: Some(percent(ram_used, ram_total)),
        },
        MetricCard {
            name_key: "disk_usage",
            value: json!(disk_used),
            unit: Some(format!("/{disk_total} GB")),
            icon: "HardDrive",
            status: CardStatus::Ok,
            progress: Some(percent(disk_used as f64, disk_total as f64)),
        },
        MetricCard {
            name_key: "postgres_status",
            value: json!(if pg_connected { "Connected" } else { "Not Connected" }),
            unit: None,
            icon: "Database",
            status: if pg_connected { CardStatus::Ok } else { CardStatus::Error },
            progress: None,
        },
    ])
}

/// One point on the CPU / RAM chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    pub cpu: u32,
    pub ram: u32,
}

/// Chart range requested by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryInterval {
    OneSecond,
    #[default]
    OneMinute,
    FiveMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
}

impl HistoryInterval {
    /// Unknown names fall back to one minute
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("1sec") => HistoryInterval::OneSecond,
            Some("5min") => HistoryInterval::FiveMinutes,
            Some("30min") => HistoryInterval::ThirtyMinutes,
            Some("1h") => HistoryInterval::OneHour,
            Some("1d") => HistoryInterval::OneDay,
            _ => HistoryInterval::OneMinute,
        }
    }

    /// Number of most recent samples to return
    pub fn window(self) -> usize {
        match self {
            HistoryInterval::OneSecond => 10,
            HistoryInterval::OneMinute => 60,
            HistoryInterval::FiveMinutes => 300,
            HistoryInterval::ThirtyMinutes => 1800,
            HistoryInterval::OneHour => 3600,
            HistoryInterval::OneDay => 86400,
        }
    }
}

/// In-memory ring of recent samples, oldest dropped first.
/// Not persisted; a restart starts an empty chart.
pub struct MetricHistory {
    samples: Mutex<VecDeque<MetricSample>>,
    capacity: usize,
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MetricHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append `sample` and return the newest `interval.window()` samples,
    /// oldest first.
    pub fn record(&self, sample: MetricSample, interval: HistoryInterval) -> Vec<MetricSample> {
        // A panicked writer leaves a valid deque behind
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }

        let skip = samples.len().saturating_sub(interval.window());
        samples.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Current CPU and RAM usage, both as whole percentages
pub async fn sample_host() -> Result<MetricSample, MonitorError> {
    let loadavg = tokio::fs::read_to_string("/proc/loadavg").await?;
    let load1 = parse_loadavg(&loadavg).ok_or(MonitorError::Parse("/proc/loadavg"))?;
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
    let (total, available) = parse_meminfo(&meminfo).ok_or(MonitorError::Parse("/proc/meminfo"))?;

    Ok(MetricSample {
        time: chrono::Local::now().format("%H:%M:%S").to_string(),
        cpu: cpu_usage_percent(load1, cores),
        ram: percent(total.saturating_sub(available) as f64, total as f64),
    })
}

/// Where the logs endpoint reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogSource {
    #[default]
    Syslog,
    Postgres,
    Journalctl,
}

impl LogSource {
    /// Unknown names fall back to syslog
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("postgres") => LogSource::Postgres,
            Some("journalctl") => LogSource::Journalctl,
            _ => LogSource::Syslog,
        }
    }
}

/// Last `n` lines of `text`
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Tail of a log file, or `None` if it does not exist
pub async fn read_log_file(path: &Path, n: usize) -> Result<Option<String>, MonitorError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(tail_lines(&String::from_utf8_lossy(&bytes), n))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Recent log lines. A missing PostgreSQL log falls back to syslog.
pub async fn read_logs(policy: &ServicePolicy, source: LogSource) -> Result<String, MonitorError> {
    let logs = match source {
        LogSource::Journalctl => {
            let lines = LOG_TAIL_LINES.to_string();
            let out = run(policy, "journalctl", &["-n", lines.as_str(), "--no-pager"]).await?;
            Some(String::from_utf8_lossy(&out.stdout).into_owned())
        }
        LogSource::Postgres => match read_log_file(Path::new(POSTGRES_LOG_PATH), LOG_TAIL_LINES).await? {
            Some(text) => Some(text),
            None => read_log_file(Path::new(SYSLOG_PATH), LOG_TAIL_LINES).await?,
        },
        LogSource::Syslog => read_log_file(Path::new(SYSLOG_PATH), LOG_TAIL_LINES).await?,
    };

    Ok(logs
        .map(|text| truncate(&text, policy.max_output_bytes))
        .unwrap_or_else(|| NO_LOGS.to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated, {} bytes total]", &text[..cut], text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_allowed_services() {
        let policy = ServicePolicy::default();
        assert_eq!(policy.check("nginx").unwrap(), "nginx");
        assert_eq!(policy.check(" strongswan ").unwrap(), "strongswan");
    }

    #[test]
    fn test_blocked_services() {
        let policy = ServicePolicy::default();
        assert!(policy.check("ubuntu").is_err());
        assert!(policy.check("nginx; rm -rf /").is_err());
        assert!(policy.check("").is_err());
    }

    #[test]
    fn test_empty_policy_and_deny() {
        assert!(ServicePolicy::empty().check("cron").is_err());

        let mut policy = ServicePolicy::default();
        policy.deny("sshd");
        assert!(policy.check("sshd").is_err());
        policy.allow("radius", "freeradius");
        assert_eq!(policy.check("radius").unwrap(), "freeradius");
    }

    #[tokio::test]
    async fn test_restart_rejects_unknown_before_spawning() {
        let err = restart_service(&ServicePolicy::default(), "bash").await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownService(_)));
    }

    #[test]
    fn test_cpu_usage() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/467 12345\n"), Some(0.52));
        assert_eq!(cpu_usage_percent(1.0, 4), 25);
        assert_eq!(cpu_usage_percent(9.0, 4), 100);
        assert_eq!(cpu_usage_percent(1.0, 0), 0);
    }

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:       16303544 kB\nMemFree:         1234567 kB\nMemAvailable:    8151772 kB\n";
        assert_eq!(parse_meminfo(text), Some((16303544 * 1024, 8151772 * 1024)));

        let old = "MemTotal: 2048 kB\nMemFree: 1024 kB\n";
        assert_eq!(parse_meminfo(old), Some((2048 * 1024, 1024 * 1024)));
        assert_eq!(parse_meminfo("garbage"), None);
    }

    #[test]
    fn test_parse_df() {
        let text = " Used  1G-blocks\n  12G       50G\n";
        assert_eq!(parse_df(text), Some((12, 50)));
        assert_eq!(parse_df("Used 1G-blocks\n"), None);
    }

    #[test]
    fn test_gb_rounding() {
        assert_eq!(gb_one_decimal(1_610_612_736), 1.5);
        assert_eq!(percent(1.5, 3.0), 50);
        assert_eq!(percent(1.0, 0.0), 0);
    }

    #[test]
    fn test_service_status_json_shape() {
        let status = ServiceStatus {
            id: "nginx".to_string(),
            name_key: "service_nginx".to_string(),
            status: ServiceState::Active,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"id": "nginx", "nameKey": "service_nginx", "status": "Active"})
        );
    }

    #[test]
    fn test_metric_card_json_shape() {
        let card = MetricCard {
            name_key: "postgres_status",
            value: json!("Connected"),
            unit: None,
            icon: "Database",
            status: CardStatus::Ok,
            progress: None,
        };
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({"nameKey": "postgres_status", "value": "Connected", "icon": "Database", "status": "ok"})
        );
    }

    fn sample(n: u32) -> MetricSample {
        MetricSample {
            time: format!("00:00:{n:02}"),
            cpu: n,
            ram: n,
        }
    }

    #[test]
    fn test_history_is_capped() {
        let history = MetricHistory::default();
        for n in 0..HISTORY_CAPACITY as u32 + 25 {
            history.record(sample(n), HistoryInterval::OneMinute);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        // oldest dropped first
        let all = history.record(sample(9999), HistoryInterval::OneDay);
        assert_eq!(all.len(), HISTORY_CAPACITY);
        assert_eq!(all[0].cpu, 26);
        assert_eq!(all.last().unwrap().cpu, 9999);
    }

    #[test]
    fn test_history_interval_slices() {
        let history = MetricHistory::with_capacity(HISTORY_CAPACITY);
        assert!(history.is_empty());

        let first = history.record(sample(0), HistoryInterval::OneSecond);
        assert_eq!(first, vec![sample(0)]);

        for n in 1..400 {
            history.record(sample(n), HistoryInterval::OneMinute);
        }
        let secs = history.record(sample(400), HistoryInterval::OneSecond);
        assert_eq!(secs.len(), 10);
        assert_eq!(secs[0].cpu, 391);

        let mins = history.record(sample(401), HistoryInterval::OneMinute);
        assert_eq!(mins.len(), 60);
        assert_eq!(mins.last().unwrap().cpu, 401);

        assert_eq!(history.record(sample(402), HistoryInterval::FiveMinutes).len(), 300);
        assert_eq!(history.record(sample(403), HistoryInterval::ThirtyMinutes).len(), 404);
    }

    #[test]
    fn test_history_interval_param() {
        assert_eq!(HistoryInterval::from_param(None), HistoryInterval::OneMinute);
        assert_eq!(HistoryInterval::from_param(Some("1sec")).window(), 10);
        assert_eq!(HistoryInterval::from_param(Some("1h")).window(), 3600);
        assert_eq!(HistoryInterval::from_param(Some("1d")).window(), 86400);
        assert_eq!(HistoryInterval::from_param(Some("weekly")), HistoryInterval::OneMinute);
    }

    #[test]
    fn test_metric_sample_json_shape() {
        assert_eq!(
            serde_json::to_value(sample(7)).unwrap(),
            json!({"time": "00:00:07", "cpu": 7, "ram": 7})
        );
    }

    #[test]
    fn test_log_source_param() {
        assert_eq!(LogSource::from_param(None), LogSource::Syslog);
        assert_eq!(LogSource::from_param(Some("postgres")), LogSource::Postgres);
        assert_eq!(LogSource::from_param(Some("journalctl")), LogSource::Journalctl);
        assert_eq!(LogSource::from_param(Some("/etc/shadow")), LogSource::Syslog);
    }

    #[test]
    fn test_tail_lines() {
        let text: String = (1..=60).map(|i| format!("line {i}\n")).collect();
        let tail = tail_lines(&text, LOG_TAIL_LINES);
        // trailing newline leaves an empty last element, as split does
        assert_eq!(tail.split('\n').count(), 50);
        assert!(tail.starts_with("line 12\n"));
        assert_eq!(tail_lines("a\nb", 10), "a\nb");
    }

    #[tokio::test]
    async fn test_read_log_file() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "one\ntwo\nthree").unwrap();
        assert_eq!(read_log_file(tmp.path(), 2).await.unwrap().unwrap(), "two\nthree");

        let missing = tmp.path().with_extension("missing");
        assert!(read_log_file(&missing, 2).await.unwrap().is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "ééééé";
        let out = truncate(text, 3);
        assert!(out.starts_with("é..."));
        assert!(out.ends_with("[truncated, 10 bytes total]"));
        assert_eq!(truncate("short", 100), "short");
    }
}

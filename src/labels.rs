//! Human-readable labels for process roles and result codes
//!
//! Every mapping is an exhaustive `match`, so adding a variant without a label
//! is a compile error rather than a runtime abort.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Role of a process within the monitoring server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessType {
    Poller,
    Unreachable,
    IpmiPoller,
    Pinger,
    JavaPoller,
    HttpPoller,
    Trapper,
    SnmpTrapper,
    ProxyPoller,
    Escalator,
    HistSyncer,
    Discoverer,
    Alerter,
    Timer,
    Housekeeper,
    DataSender,
    ConfSyncer,
    Heartbeat,
    SelfMon,
    Vmware,
    Collector,
    Listener,
    ActiveChecks,
    TaskManager,
    IpmiManager,
    AlertManager,
    PreprocManager,
    Preprocessor,
    LldManager,
    LldWorker,
    AlertSyncer,
    HistoryPoller,
    AvailabilityManager,
    ReportManager,
    ReportWriter,
    ServiceManager,
    TriggerHousekeeper,
    HaManager,
    OdbcPoller,
    Main,
}

impl ProcessType {
    pub const ALL: [ProcessType; 40] = [
        ProcessType::Poller,
        ProcessType::Unreachable,
        ProcessType::IpmiPoller,
        ProcessType::Pinger,
        ProcessType::JavaPoller,
        ProcessType::HttpPoller,
        ProcessType::Trapper,
        ProcessType::SnmpTrapper,
        ProcessType::ProxyPoller,
        ProcessType::Escalator,
        ProcessType::HistSyncer,
        ProcessType::Discoverer,
        ProcessType::Alerter,
        ProcessType::Timer,
        ProcessType::Housekeeper,
        ProcessType::DataSender,
        ProcessType::ConfSyncer,
        ProcessType::Heartbeat,
        ProcessType::SelfMon,
        ProcessType::Vmware,
        ProcessType::Collector,
        ProcessType::Listener,
        ProcessType::ActiveChecks,
        ProcessType::TaskManager,
        ProcessType::IpmiManager,
        ProcessType::AlertManager,
        ProcessType::PreprocManager,
        ProcessType::Preprocessor,
        ProcessType::LldManager,
        ProcessType::LldWorker,
        ProcessType::AlertSyncer,
        ProcessType::HistoryPoller,
        ProcessType::AvailabilityManager,
        ProcessType::ReportManager,
        ProcessType::ReportWriter,
        ProcessType::ServiceManager,
        ProcessType::TriggerHousekeeper,
        ProcessType::HaManager,
        ProcessType::OdbcPoller,
        ProcessType::Main,
    ];

    /// Label used in process titles, log files and internal checks
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessType::Poller => "poller",
            ProcessType::Unreachable => "unreachable poller",
            ProcessType::IpmiPoller => "ipmi poller",
            ProcessType::Pinger => "icmp pinger",
            ProcessType::JavaPoller => "java poller",
            ProcessType::HttpPoller => "http poller",
            ProcessType::Trapper => "trapper",
            ProcessType::SnmpTrapper => "snmp trapper",
            ProcessType::ProxyPoller => "proxy poller",
            ProcessType::Escalator => "escalator",
            ProcessType::HistSyncer => "history syncer",
            ProcessType::Discoverer => "discoverer",
            ProcessType::Alerter => "alerter",
            ProcessType::Timer => "timer",
            ProcessType::Housekeeper => "housekeeper",
            ProcessType::DataSender => "data sender",
            ProcessType::ConfSyncer => "configuration syncer",
            ProcessType::Heartbeat => "heartbeat sender",
            ProcessType::SelfMon => "self-monitoring",
            ProcessType::Vmware => "vmware collector",
            ProcessType::Collector => "collector",
            ProcessType::Listener => "listener",
            ProcessType::ActiveChecks => "active checks",
            ProcessType::TaskManager => "task manager",
            ProcessType::IpmiManager => "ipmi manager",
            ProcessType::AlertManager => "alert manager",
            ProcessType::PreprocManager => "preprocessing manager",
            ProcessType::Preprocessor => "preprocessing worker",
            ProcessType::LldManager => "lld manager",
            ProcessType::LldWorker => "lld worker",
            ProcessType::AlertSyncer => "alert syncer",
            ProcessType::HistoryPoller => "history poller",
            ProcessType::AvailabilityManager => "availability manager",
            ProcessType::ReportManager => "report manager",
            ProcessType::ReportWriter => "report writer",
            ProcessType::ServiceManager => "service manager",
            ProcessType::TriggerHousekeeper => "trigger housekeeper",
            ProcessType::HaManager => "ha manager",
            ProcessType::OdbcPoller => "odbc poller",
            ProcessType::Main => "main",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessType::ALL
            .into_iter()
            .find(|process_type| process_type.as_str() == s)
            .ok_or_else(|| format!("unknown process type \"{s}\""))
    }
}

/// Kind of program the poller runs inside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramType {
    #[default]
    Server,
    ProxyActive,
    ProxyPassive,
    Agentd,
    Sender,
    Get,
}

impl ProgramType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgramType::Server => "server",
            ProgramType::ProxyActive | ProgramType::ProxyPassive => "proxy",
            ProgramType::Agentd => "agent",
            ProgramType::Sender => "sender",
            ProgramType::Get => "get",
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome codes attached to checked items
///
/// The queue stores them as plain `i32`; this type only gives them names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Succeed,
    Fail,
    NotSupported,
    NetworkError,
    TimeoutError,
    AgentError,
    GatewayError,
    ConfigError,
    SigError,
}

impl ResultCode {
    pub fn code(self) -> i32 {
        match self {
            ResultCode::Succeed => 0,
            ResultCode::Fail => -1,
            ResultCode::NotSupported => -2,
            ResultCode::NetworkError => -3,
            ResultCode::TimeoutError => -4,
            ResultCode::AgentError => -5,
            ResultCode::GatewayError => -6,
            ResultCode::ConfigError => -7,
            ResultCode::SigError => -8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let result = match code {
            0 => ResultCode::Succeed,
            -1 => ResultCode::Fail,
            -2 => ResultCode::NotSupported,
            -3 => ResultCode::NetworkError,
            -4 => ResultCode::TimeoutError,
            -5 => ResultCode::AgentError,
            -6 => ResultCode::GatewayError,
            -7 => ResultCode::ConfigError,
            -8 => ResultCode::SigError,
            _ => return None,
        };

        Some(result)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Succeed => "SUCCEED",
            ResultCode::Fail => "FAIL",
            ResultCode::NotSupported => "NOTSUPPORTED",
            ResultCode::NetworkError => "NETWORK_ERROR",
            ResultCode::TimeoutError => "TIMEOUT_ERROR",
            ResultCode::AgentError => "AGENT_ERROR",
            ResultCode::GatewayError => "GATEWAY_ERROR",
            ResultCode::ConfigError => "CONFIG_ERROR",
            ResultCode::SigError => "SIG_ERROR",
        }
    }

    /// Label for a raw code, "unknown" when it has no name
    pub fn label(code: i32) -> &'static str {
        ResultCode::from_code(code).map_or("unknown", ResultCode::as_str)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

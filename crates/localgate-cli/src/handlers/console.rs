//! Interactive control for a running `serve`.
//!
//! Each line typed into the terminal is one command:
//!
//! ```text
//! memory on|off   toggle multi-turn prompts
//! memory          show the current prompt mode
//! status          model, gateway and resource usage
//! logs [N]        last N operator log lines (default 20)
//! help
//! quit
//! ```

use localgate_runtime::{GatewayServer, LogStore, ModelSession, SystemStats};

/// Log lines shown by `logs` without an argument.
pub const DEFAULT_LOG_LINES: usize = 20;

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `Some` switches memory mode, `None` reports it.
    Memory(Option<bool>),
    Status,
    Logs(usize),
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("Too many arguments for '{head}'. Type 'help'."));
    }

    let command = match (head.to_ascii_lowercase().as_str(), arg) {
        ("memory", None) => ConsoleCommand::Memory(None),
        ("memory", Some(value)) => ConsoleCommand::Memory(Some(parse_switch(value)?)),
        ("status", None) => ConsoleCommand::Status,
        ("logs", None) => ConsoleCommand::Logs(DEFAULT_LOG_LINES),
        ("logs", Some(count)) => ConsoleCommand::Logs(
            count
                .parse()
                .map_err(|_| format!("'{count}' is not a line count"))?,
        ),
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        (other, _) => return Err(format!("Unknown command '{other}'. Type 'help'.")),
    };
    Ok(Some(command))
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(format!("Expected 'on' or 'off', got '{value}'")),
    }
}

/// Everything a console command can act on.
pub struct ServeConsole<'a> {
    pub session: &'a ModelSession,
    pub gateway: &'a GatewayServer,
    pub logs: &'a LogStore,
    pub stats: SystemStats,
}

impl ServeConsole<'_> {
    /// Apply a command and return the text to print. `Quit` is handled by
    /// the caller.
    pub fn apply(&self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Memory(Some(enabled)) => {
                self.session.set_memory_mode(enabled);
                format!("Memory mode: {}", on_off(enabled))
            }
            ConsoleCommand::Memory(None) => {
                format!("Memory mode: {}", on_off(self.session.memory_mode()))
            }
            ConsoleCommand::Status => self.status(),
            ConsoleCommand::Logs(count) => {
                let entries = self.logs.entries();
                let skip = entries.len().saturating_sub(count);
                if entries.is_empty() {
                    "No log entries yet.".to_string()
                } else {
                    entries[skip..].join("\n")
                }
            }
            ConsoleCommand::Help => HELP.trim_end().to_string(),
            ConsoleCommand::Quit => String::new(),
        }
    }

    fn status(&self) -> String {
        let mut lines = vec![
            format!("Model:   {}", self.session.state()),
            format!("Gateway: {}", self.gateway.state()),
        ];
        if let Some(address) = self.gateway.address() {
            lines.push(format!("Address: {address}/v1"));
        }
        lines.push(format!("Memory:  {}", on_off(self.session.memory_mode())));
        lines.push(format!(
            "System:  {}",
            localgate_core::GatewayEvent::from(self.stats).describe()
        ));
        lines.join("\n")
    }
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

const HELP: &str = "\
memory on|off   toggle multi-turn prompts
memory          show the current prompt mode
status          model, gateway and resource usage
logs [N]        last N log lines
quit            stop the gateway and exit
";

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use localgate_core::NoopSink;
    use localgate_runtime::SessionConfig;
    use localgate_runtime::llama::{LlamaServerConfig, LlamaServerLoader};

    use super::*;

    fn session(logs: &LogStore) -> ModelSession {
        let loader =
            LlamaServerLoader::new(LlamaServerConfig::new("http://127.0.0.1:9", "m")).unwrap();
        ModelSession::new(
            Arc::new(loader),
            SessionConfig::default(),
            Arc::new(logs.clone()),
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("memory on"),
            Ok(Some(ConsoleCommand::Memory(Some(true))))
        );
        assert_eq!(
            parse_command("MEMORY Off"),
            Ok(Some(ConsoleCommand::Memory(Some(false))))
        );
        assert_eq!(parse_command("memory"), Ok(Some(ConsoleCommand::Memory(None))));
        assert_eq!(parse_command("logs"), Ok(Some(ConsoleCommand::Logs(DEFAULT_LOG_LINES))));
        assert_eq!(parse_command("logs 5"), Ok(Some(ConsoleCommand::Logs(5))));
        assert_eq!(parse_command("exit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("memory maybe").is_err());
        assert!(parse_command("logs many").is_err());
        assert!(parse_command("status now").is_err());
        assert!(parse_command("memory on please").is_err());
        assert!(parse_command("reload").is_err());
    }

    #[tokio::test]
    async fn test_memory_toggle_reaches_running_session() {
        let logs = LogStore::new();
        let session = session(&logs);
        let gateway = GatewayServer::new(Arc::new(session.clone()), Arc::new(NoopSink));
        let console = ServeConsole {
            session: &session,
            gateway: &gateway,
            logs: &logs,
            stats: SystemStats::default(),
        };

        assert!(!session.memory_mode());
        assert_eq!(console.apply(ConsoleCommand::Memory(Some(true))), "Memory mode: on");
        assert!(session.memory_mode());
        assert_eq!(console.apply(ConsoleCommand::Memory(None)), "Memory mode: on");

        // Repeating the current mode is not logged again.
        console.apply(ConsoleCommand::Memory(Some(true)));
        console.apply(ConsoleCommand::Memory(Some(false)));
        assert!(!session.memory_mode());
        assert_eq!(logs.len(), 2);
        assert!(console.apply(ConsoleCommand::Logs(1)).ends_with("Memory mode disabled."));
    }

    #[tokio::test]
    async fn test_status_and_logs() {
        let logs = LogStore::new();
        let session = session(&logs);
        let gateway = GatewayServer::new(Arc::new(session.clone()), Arc::new(NoopSink));
        let console = ServeConsole {
            session: &session,
            gateway: &gateway,
            logs: &logs,
            stats: SystemStats {
                cpu_percent: 7.5,
                memory_bytes: 2048,
            },
        };

        assert_eq!(console.apply(ConsoleCommand::Logs(5)), "No log entries yet.");
        for i in 0..3 {
            logs.add(&format!("line {i}"));
        }
        let shown = console.apply(ConsoleCommand::Logs(2));
        assert_eq!(shown.lines().count(), 2);
        assert!(shown.ends_with("line 2"));

        let status = console.apply(ConsoleCommand::Status);
        assert!(status.contains("Model:   Not loaded"));
        assert!(status.contains("Gateway: Stopped"));
        assert!(!status.contains("Address:"));
        assert!(status.contains("Memory:  off"));
        assert!(status.contains("CPU 7.5%, memory 2.0 KiB"));
    }
}

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use daqctl::errors::{DaqError, Result};
use daqctl::remote::{BoxFuture, CommandOutput, ConnectTarget, Connector, RemoteShell};

/// What a scripted command does when it runs.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(CommandOutput),
    /// Never completes; only a deadline gets the caller out.
    Hang,
}

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    /// Replies are consumed in order; the last one repeats forever.
    fn next(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap()
        } else {
            self.replies.front().cloned().unwrap()
        }
    }
}

/// Canned replies for one host, matched by command prefix (first match wins).
/// Commands matching no rule exit with status 127.
#[derive(Debug, Clone, Default)]
pub struct HostScript {
    rules: Vec<Rule>,
}

impl HostScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, prefix: &str, output: CommandOutput) -> Self {
        self.on_seq(prefix, vec![output])
    }

    pub fn on_seq(mut self, prefix: &str, outputs: Vec<CommandOutput>) -> Self {
        assert!(!outputs.is_empty(), "on_seq needs at least one output");
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            replies: outputs.into_iter().map(Reply::Output).collect(),
        });
        self
    }

    pub fn ok(self, prefix: &str) -> Self {
        self.on(prefix, CommandOutput::ok(""))
    }

    pub fn hang_on(mut self, prefix: &str) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            replies: VecDeque::from([Reply::Hang]),
        });
        self
    }

    /// A data router host whose process works in `dir` and has `files`
    /// (bare names) waiting in it next to a log file. `mkdir` and `mv`
    /// succeed.
    pub fn data_router(dir: &str, files: &[&str]) -> Self {
        let listing = files
            .iter()
            .chain(["run.log"].iter())
            .map(|f| format!("{f}\n"))
            .collect::<String>();
        Self::new()
            .on("lsof ", lsof_output("dataRouter", dir))
            .on("ls -1 ", CommandOutput::ok(listing))
            .on("ps -e", ps_output(&["dataRouter"]))
            .ok("mkdir -p ")
            .ok("mv ")
    }

    /// An ECC host with the server running. `mkdir` and `cp` succeed.
    pub fn ecc() -> Self {
        Self::new()
            .on("ps -e", ps_output(&["getEccSoapServer"]))
            .ok("mkdir -p ")
            .ok("cp -r ")
    }
}

/// `lsof -Fcn` style output for one process.
pub fn lsof_output(process: &str, cwd: &str) -> CommandOutput {
    CommandOutput::ok(format!("p4242\nc{process}\nn{cwd}\n"))
}

/// `ps -e` style output with the given commands running.
pub fn ps_output(commands: &[&str]) -> CommandOutput {
    let mut out = String::from("    PID TTY          TIME CMD\n      1 ?        00:00:03 systemd\n");
    for (i, cmd) in commands.iter().enumerate() {
        out.push_str(&format!("   {} ?        00:01:00 {cmd}\n", 1000 + i));
    }
    CommandOutput::ok(out)
}

#[derive(Debug, Clone)]
enum HostBehaviour {
    Script(HostScript),
    Refuse,
    HangOnConnect,
}

/// Something that happened on a fake connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected(String),
    Exec { host: String, command: String },
    Closed(String),
    Aborted(String),
}

#[derive(Debug, Default)]
struct Inner {
    hosts: HashMap<String, HostBehaviour>,
    events: Vec<Event>,
    connect_attempts: HashMap<String, usize>,
}

/// A [`Connector`] that never touches the network.
///
/// Every connection to a host shares that host's script, so sequenced
/// replies carry over between sessions. Unknown hosts refuse connections.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<Inner>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, host: &str, script: HostScript) -> &Self {
        self.set(host, HostBehaviour::Script(script))
    }

    pub fn refuse(&self, host: &str) -> &Self {
        self.set(host, HostBehaviour::Refuse)
    }

    pub fn hang_on_connect(&self, host: &str) -> &Self {
        self.set(host, HostBehaviour::HangOnConnect)
    }

    fn set(&self, host: &str, behaviour: HostBehaviour) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .hosts
            .insert(host.to_string(), behaviour);
        self
    }

    pub fn connect_attempts(&self, host: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .connect_attempts
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_connect_attempts(&self) -> usize {
        self.inner.lock().unwrap().connect_attempts.values().sum()
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Commands run on `host`, in order.
    pub fn commands(&self, host: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Exec { host: h, command } if h == host => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn closed(&self, host: &str) -> usize {
        self.count(|e| matches!(e, Event::Closed(h) if h == host))
    }

    pub fn aborted(&self, host: &str) -> usize {
        self.count(|e| matches!(e, Event::Aborted(h) if h == host))
    }

    /// Connections to `host` that were neither closed nor aborted.
    pub fn leaked(&self, host: &str) -> usize {
        let opened = self.count(|e| matches!(e, Event::Connected(h) if h == host));
        opened - self.closed(host) - self.aborted(host)
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| pred(e))
            .count()
    }

    fn record(&self, event: Event) {
        self.inner.lock().unwrap().events.push(event);
    }
}

impl Connector for FakeConnector {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn RemoteShell>>> {
        Box::pin(async move {
            let host = target.host.clone();
            let behaviour = {
                let mut inner = self.inner.lock().unwrap();
                *inner.connect_attempts.entry(host.clone()).or_default() += 1;
                inner.hosts.get(&host).cloned()
            };
            match behaviour {
                Some(HostBehaviour::Script(_)) => {
                    self.record(Event::Connected(host.clone()));
                    Ok(Box::new(FakeShell {
                        host,
                        connector: self.clone(),
                    }) as Box<dyn RemoteShell>)
                }
                Some(HostBehaviour::HangOnConnect) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Some(HostBehaviour::Refuse) | None => Err(DaqError::Connection(format!(
                    "connecting to {host}:22: Connection refused"
                ))),
            }
        })
    }
}

struct FakeShell {
    host: String,
    connector: FakeConnector,
}

impl FakeShell {
    fn reply(&self, command: &str) -> Reply {
        let mut inner = self.connector.inner.lock().unwrap();
        inner.events.push(Event::Exec {
            host: self.host.clone(),
            command: command.to_string(),
        });
        let Some(HostBehaviour::Script(script)) = inner.hosts.get_mut(&self.host) else {
            return Reply::Output(CommandOutput::failed(255, "connection lost"));
        };
        script
            .rules
            .iter_mut()
            .find(|r| command.starts_with(&r.prefix))
            .map(Rule::next)
            .unwrap_or_else(|| {
                Reply::Output(CommandOutput::failed(127, format!("sh: {command}: not found")))
            })
    }
}

impl RemoteShell for FakeShell {
    fn exec<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            match self.reply(command) {
                Reply::Output(out) => Ok(out),
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.connector.record(Event::Closed(self.host.clone()));
        })
    }

    fn abort(&mut self) {
        self.connector.record(Event::Aborted(self.host.clone()));
    }
}

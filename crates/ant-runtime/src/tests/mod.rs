//! Shared test doubles and crate-level behaviour tests.


use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;

use mockall::mock;

use crate::capability::Capability;
use crate::identity::AntId;
use crate::plugin::{Member, Plugin, PluginFault};
use crate::process::{ProcessExit, ProcessHandle, ProcessOptions, ProcessPipe, ProcessSpawner};

mock! {
    pub Spawner {}
    impl ProcessSpawner for Spawner {
        fn spawn(
            &self,
            executable: &Path,
            args: &[String],
            options: &ProcessOptions,
        ) -> io::Result<Box<dyn ProcessHandle>>;
    }
}

/// A process whose output and exit status are fixed up front.
pub(crate) struct ScriptedHandle {
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
    exit: Option<io::Result<ProcessExit>>,
}

impl ScriptedHandle {
    pub(crate) fn new(stdout: &str, exit: ProcessExit) -> Self {
        Self {
            stdout: Some(stdout.as_bytes().to_vec()),
            stderr: Some(Vec::new()),
            exit: Some(Ok(exit)),
        }
    }

    pub(crate) fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = Some(stderr.as_bytes().to_vec());
        self
    }

    pub(crate) fn failing_wait(stdout: &str) -> Self {
        Self {
            stdout: Some(stdout.as_bytes().to_vec()),
            stderr: None,
            exit: Some(Err(io::Error::other("wait failed"))),
        }
    }
}

impl ProcessHandle for ScriptedHandle {
    fn take_stdout(&mut self) -> Option<ProcessPipe> {
        self.stdout
            .take()
            .map(|bytes| Box::new(Cursor::new(bytes)) as ProcessPipe)
    }

    fn take_stderr(&mut self) -> Option<ProcessPipe> {
        self.stderr
            .take()
            .map(|bytes| Box::new(Cursor::new(bytes)) as ProcessPipe)
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        self.exit.take().unwrap_or(Ok(ProcessExit::Code(0)))
    }
}

/// A spawner whose every process writes `stdout` and exits with `exit`.
pub(crate) fn scripted_spawner(stdout: &'static str, exit: ProcessExit) -> Arc<MockSpawner> {
    let mut spawner = MockSpawner::new();
    spawner
        .expect_spawn()
        .returning(move |_, _, _| Ok(Box::new(ScriptedHandle::new(stdout, exit))));
    Arc::new(spawner)
}

/// A spawner that refuses to start anything.
pub(crate) fn refusing_spawner() -> Arc<MockSpawner> {
    let mut spawner = MockSpawner::new();
    spawner
        .expect_spawn()
        .returning(|_, _, _| Err(io::Error::new(io::ErrorKind::NotFound, "no such file")));
    Arc::new(spawner)
}

/// How a [`StubPlugin`] answers a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Misbehaviour {
    Fail,
    Panic,
}

/// A plugin whose name and capability lists are configured per test.
pub(crate) struct StubPlugin {
    ant: AntId,
    name: Option<String>,
    name_fault: Option<Misbehaviour>,
    members: Vec<(Member, Vec<Capability>)>,
    faults: Vec<(Member, Misbehaviour)>,
}

impl StubPlugin {
    pub(crate) fn new(ant: AntId) -> Self {
        Self {
            ant,
            name: None,
            name_fault: None,
            members: Vec::new(),
            faults: Vec::new(),
        }
    }

    pub(crate) fn named(ant: AntId, name: &str) -> Self {
        let mut plugin = Self::new(ant);
        plugin.name = Some(name.to_owned());
        plugin
    }

    pub(crate) fn with(mut self, member: Member, capabilities: Vec<Capability>) -> Self {
        self.members.push((member, capabilities));
        self
    }

    pub(crate) fn misbehaving(mut self, member: Member, fault: Misbehaviour) -> Self {
        self.faults.push((member, fault));
        self
    }

    pub(crate) fn misbehaving_name(mut self, fault: Misbehaviour) -> Self {
        self.name_fault = Some(fault);
        self
    }

    pub(crate) fn shared(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }

    fn answer(&self, member: Member) -> Result<Vec<Capability>, PluginFault> {
        match self.faults.iter().find(|(faulty, _)| *faulty == member) {
            Some((_, Misbehaviour::Fail)) => return Err(format!("{member} unavailable").into()),
            Some((_, Misbehaviour::Panic)) => panic!("{member} exploded"),
            None => {}
        }
        Ok(self
            .members
            .iter()
            .filter(|(listed, _)| *listed == member)
            .flat_map(|(_, capabilities)| capabilities.iter().cloned())
            .collect())
    }
}

impl Plugin for StubPlugin {
    fn ant(&self) -> AntId {
        self.ant
    }

    fn name(&self) -> Result<String, PluginFault> {
        match self.name_fault {
            Some(Misbehaviour::Fail) => Err("name unavailable".into()),
            Some(Misbehaviour::Panic) => panic!("name exploded"),
            None => Ok(self
                .name
                .clone()
                .unwrap_or_else(|| self.type_name().to_owned())),
        }
    }

    fn functions(&self) -> Result<Vec<Capability>, PluginFault> {
        self.answer(Member::Functions)
    }

    fn runtimes(&self) -> Result<Vec<Capability>, PluginFault> {
        self.answer(Member::Runtimes)
    }

    fn hosts(&self) -> Result<Vec<Capability>, PluginFault> {
        self.answer(Member::Hosts)
    }

    fn providers(&self) -> Result<Vec<Capability>, PluginFault> {
        self.answer(Member::Providers)
    }

    fn templates(&self) -> Result<Vec<Capability>, PluginFault> {
        self.answer(Member::Templates)
    }
}

//! Shared test domain: a to-do list and a program aggregate.
#![allow(dead_code, clippy::ptr_arg)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use eventloom::{Aggregate, AggregateBase, Codec, Error, RecordedEvent, Result};

pub const TASK_ADDED: &str = "task_added";
pub const TASK_REMOVED: &str = "task_removed";
pub const PROGRAM_CREATED: &str = "program.created";

/// A to-do list whose tasks are unique, compared case-insensitively.
#[derive(Debug)]
pub struct List {
    base: AggregateBase<Self>,
    pub tasks: Vec<String>,
}

impl List {
    pub fn add_task(&mut self, task: &str) -> Result<()> {
        if self.contains(task) {
            return Err(Error::Validation(format!("list already contains {task:?}")));
        }
        self.next(TASK_ADDED, task.to_owned())
    }

    pub fn remove_task(&mut self, task: &str) -> Result<()> {
        if !self.contains(task) {
            return Err(Error::Validation(format!("list does not contain {task:?}")));
        }
        self.next(TASK_REMOVED, task.to_owned())
    }

    pub fn contains(&self, task: &str) -> bool {
        self.position(task).is_some()
    }

    fn position(&self, task: &str) -> Option<usize> {
        let task = task.to_lowercase();
        self.tasks.iter().position(|t| t.to_lowercase() == task)
    }

    fn task_added(&mut self, task: &String) {
        self.tasks.push(task.clone());
    }

    fn task_removed(&mut self, task: &String) {
        if let Some(index) = self.position(task) {
            self.tasks.remove(index);
        }
    }
}

impl Aggregate for List {
    fn new(id: Uuid) -> Result<Self> {
        let mut base = AggregateBase::new("list", id);
        base.register_applier(TASK_ADDED, Self::task_added)?;
        base.register_applier(TASK_REMOVED, Self::task_removed)?;
        Ok(Self {
            base,
            tasks: Vec::new(),
        })
    }

    fn base(&self) -> &AggregateBase<Self> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<Self> {
        &mut self.base
    }

    fn snapshot_state(&self) -> Result<Option<Vec<u8>>> {
        serde_json::to_vec(&self.tasks)
            .map(Some)
            .map_err(|e| Error::Snapshot(e.to_string()))
    }

    fn restore_snapshot(&mut self, state: &[u8]) -> Result<()> {
        self.tasks = serde_json::from_slice(state).map_err(|e| Error::Snapshot(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramCreated {
    pub name: String,
}

/// An aggregate without snapshot support.
#[derive(Debug)]
pub struct Program {
    base: AggregateBase<Self>,
    pub name: String,
}

impl Program {
    pub fn create(&mut self, name: &str) -> Result<()> {
        if self.version() > 0 {
            return Err(Error::Validation("program already created".into()));
        }
        self.next(
            PROGRAM_CREATED,
            ProgramCreated {
                name: name.to_owned(),
            },
        )
    }

    fn created(&mut self, event: &ProgramCreated) {
        self.name = event.name.clone();
    }
}

impl Aggregate for Program {
    fn new(id: Uuid) -> Result<Self> {
        let mut base = AggregateBase::new("program", id);
        base.register_applier(PROGRAM_CREATED, Self::created)?;
        Ok(Self {
            base,
            name: String::new(),
        })
    }

    fn base(&self) -> &AggregateBase<Self> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<Self> {
        &mut self.base
    }
}

/// The codec every test repository shares.
pub fn codec() -> Arc<Codec> {
    let mut codec = Codec::new();
    codec.register::<String>(TASK_ADDED).expect("register task_added");
    codec
        .register::<String>(TASK_REMOVED)
        .expect("register task_removed");
    codec
        .register::<ProgramCreated>(PROGRAM_CREATED)
        .expect("register program.created");
    Arc::new(codec)
}

/// A fresh list with `tasks` recorded but not saved.
pub fn list_with(id: Uuid, tasks: &[&str]) -> List {
    let mut list = List::new(id).expect("new list");
    for task in tasks {
        list.add_task(task).expect("add task");
    }
    list
}

/// Encodes the list's uncommitted events as an event store would receive them.
pub fn recorded(codec: &Codec, list: &List) -> Vec<RecordedEvent> {
    list.changes()
        .iter()
        .map(|event| codec.encode_event(event).expect("encode event"))
        .collect()
}

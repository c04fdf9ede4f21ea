use std::time::{Duration, Instant};

use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    KeyScan,
    AutoRefresh,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::KeyScan => "Key Scan",
            TaskKind::AutoRefresh => "Auto Refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// Bookkeeping for one background fetch. Fetches are never cancelled, so a
/// task only leaves `Running` by completing or failing.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

impl Task {
    pub fn start(kind: TaskKind, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new_v4(),
            kind,
            description: description.into(),
            status: TaskStatus::Running,
            started_at: Instant::now(),
            completed_at: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.completed_at {
            Some(completed) => completed.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    pub fn complete(&mut self) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Completed;
            self.completed_at = Some(Instant::now());
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Failed(error.into());
            self.completed_at = Some(Instant::now());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
    pub elapsed_secs: f64,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            description: task.description.clone(),
            status: task.status.clone(),
            elapsed_secs: task.elapsed().as_secs_f64(),
        }
    }
}

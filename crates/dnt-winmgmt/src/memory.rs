//! In-memory host.
//!
//! Implements [`ServiceControl`] and [`TaskScheduler`] over plain vectors, with
//! per-object fault injection. Used by tests and by simulation runs on
//! machines without the real service database.

use crate::scheduled_tasks::TaskScheduler;
use crate::services::ServiceControl;
use crate::types::*;
use async_trait::async_trait;
use dnt_core::{DntError, DntErrorKind, DntResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Fault {
    kind: DntErrorKind,
    /// `None` fails every call.
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    services: Vec<WindowsService>,
    tasks: Vec<ScheduledTask>,
    faults: HashMap<String, Fault>,
    calls: Vec<String>,
    registrations: u32,
}

/// Shared, clonable in-memory service and task database.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryState>>,
}

/// Fault key for whole-database enumeration of services.
pub const LIST_SERVICES: &str = "list:services";
/// Fault key for whole-database enumeration of tasks.
pub const LIST_TASKS: &str = "list:tasks";

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ─── Seeding ─────────────────────────────────────────────────────

    pub fn with_service(self, service: WindowsService) -> Self {
        self.add_service(service);
        self
    }

    pub fn with_task(self, task: ScheduledTask) -> Self {
        self.add_task(task);
        self
    }

    pub fn add_service(&self, service: WindowsService) {
        let mut st = self.lock();
        st.services.retain(|s| !s.name.eq_ignore_ascii_case(&service.name));
        st.services.push(service);
    }

    pub fn add_task(&self, task: ScheduledTask) {
        let mut st = self.lock();
        let path = task.full_path();
        st.tasks.retain(|t| !t.full_path().eq_ignore_ascii_case(&path));
        st.tasks.push(task);
    }

    /// Delete a service behind the caller's back.
    pub fn remove_service(&self, name: &str) -> bool {
        let mut st = self.lock();
        let before = st.services.len();
        st.services.retain(|s| !s.name.eq_ignore_ascii_case(name));
        st.services.len() != before
    }

    /// Delete a task behind the caller's back.
    pub fn remove_task(&self, path: &str) -> bool {
        let mut st = self.lock();
        let before = st.tasks.len();
        st.tasks.retain(|t| !t.full_path().eq_ignore_ascii_case(path));
        st.tasks.len() != before
    }

    // ─── Faults ──────────────────────────────────────────────────────

    /// Fail every call touching `target` (service name, task path, or a `LIST_*` key).
    pub fn fail(&self, target: &str, kind: DntErrorKind) {
        self.lock().faults.insert(
            target.to_ascii_lowercase(),
            Fault {
                kind,
                remaining: None,
            },
        );
    }

    /// Fail only the next `times` calls touching `target`.
    pub fn fail_times(&self, target: &str, kind: DntErrorKind, times: u32) {
        self.lock().faults.insert(
            target.to_ascii_lowercase(),
            Fault {
                kind,
                remaining: Some(times),
            },
        );
    }

    /// Fail every `op` call (e.g. `"stop_service"`) touching `target`, leaving
    /// other operations on it working.
    pub fn fail_call(&self, op: &str, target: &str, kind: DntErrorKind) {
        self.lock().faults.insert(
            format!("{}:{}", op, target.to_ascii_lowercase()),
            Fault {
                kind,
                remaining: None,
            },
        );
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    // ─── Inspection ──────────────────────────────────────────────────

    pub fn service(&self, name: &str) -> Option<WindowsService> {
        self.lock()
            .services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn task(&self, path: &str) -> Option<ScheduledTask> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.full_path().eq_ignore_ascii_case(path))
            .cloned()
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Number of successful `register_task` calls.
    pub fn registrations(&self) -> u32 {
        self.lock().registrations
    }

    /// Every call made, as `operation target`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

impl MemoryState {
    fn enter(&mut self, op: &str, target: &str) -> DntResult<()> {
        self.calls.push(format!("{} {}", op, target));
        let target_key = target.to_ascii_lowercase();
        let call_key = format!("{}:{}", op, target_key);
        match self.trip(&call_key).or_else(|| self.trip(&target_key)) {
            Some(kind) => Err(DntError::new(
                kind,
                format!("Injected {:?} failure on {} {}", kind, op, target),
            )),
            None => Ok(()),
        }
    }

    /// Consume one shot of the fault registered under `key`, if any.
    fn trip(&mut self, key: &str) -> Option<DntErrorKind> {
        let fault = self.faults.get_mut(key)?;
        let kind = fault.kind;
        match fault.remaining {
            None => Some(kind),
            Some(0) => {
                self.faults.remove(key);
                None
            }
            Some(n) => {
                if n == 1 {
                    self.faults.remove(key);
                } else {
                    fault.remaining = Some(n - 1);
                }
                Some(kind)
            }
        }
    }

    fn service_mut(&mut self, name: &str) -> DntResult<&mut WindowsService> {
        self.services
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DntError::not_found(format!("service {}", name)))
    }

    fn task_mut(&mut self, path: &str) -> DntResult<&mut ScheduledTask> {
        self.tasks
            .iter_mut()
            .find(|t| t.full_path().eq_ignore_ascii_case(path))
            .ok_or_else(|| DntError::not_found(format!("scheduled task {}", path)))
    }
}

#[async_trait]
impl ServiceControl for MemoryHost {
    async fn list_services(&self) -> DntResult<Vec<WindowsService>> {
        let mut st = self.lock();
        st.enter("list_services", LIST_SERVICES)?;
        Ok(st.services.clone())
    }

    async fn get_service(&self, name: &str) -> DntResult<WindowsService> {
        let mut st = self.lock();
        st.enter("get_service", name)?;
        let service = st.service_mut(name)?.clone();
        Ok(service)
    }

    async fn set_start_mode(&self, name: &str, mode: ServiceStartMode) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("set_start_mode", name)?;
        st.service_mut(name)?.start_mode = mode;
        Ok(())
    }

    async fn stop_service(&self, name: &str) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("stop_service", name)?;
        st.service_mut(name)?.state = ServiceState::Stopped;
        Ok(())
    }

    async fn start_service(&self, name: &str) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("start_service", name)?;
        let svc = st.service_mut(name)?;
        if svc.start_mode == ServiceStartMode::Disabled {
            return Err(DntError::os_failure(format!(
                "Service '{}' cannot be started because it is disabled",
                name
            )));
        }
        svc.state = ServiceState::Running;
        Ok(())
    }
}

#[async_trait]
impl TaskScheduler for MemoryHost {
    async fn list_tasks(&self) -> DntResult<Vec<ScheduledTask>> {
        let mut st = self.lock();
        st.enter("list_tasks", LIST_TASKS)?;
        Ok(st.tasks.clone())
    }

    async fn get_task(&self, path: &str) -> DntResult<ScheduledTask> {
        let mut st = self.lock();
        st.enter("get_task", path)?;
        let task = st.task_mut(path)?.clone();
        Ok(task)
    }

    async fn set_task_enabled(&self, path: &str, enabled: bool) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("set_task_enabled", path)?;
        let task = st.task_mut(path)?;
        task.enabled = enabled;
        task.state = if enabled {
            ScheduledTaskState::Ready
        } else {
            ScheduledTaskState::Disabled
        };
        Ok(())
    }

    async fn register_task(&self, definition: &TaskDefinition) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("register_task", &definition.path)?;
        let mut task = ScheduledTask::new(&definition.path, true);
        task.description = definition.description.clone();
        task.triggers = vec![definition.trigger.cim_class().to_string()];
        // Replace in place: the swap happens under one lock.
        match st
            .tasks
            .iter_mut()
            .find(|t| t.full_path().eq_ignore_ascii_case(&definition.path))
        {
            Some(existing) => *existing = task,
            None => st.tasks.push(task),
        }
        st.registrations += 1;
        Ok(())
    }

    async fn unregister_task(&self, path: &str) -> DntResult<()> {
        let mut st = self.lock();
        st.enter("unregister_task", path)?;
        let before = st.tasks.len();
        st.tasks.retain(|t| !t.full_path().eq_ignore_ascii_case(path));
        if st.tasks.len() == before {
            return Err(DntError::not_found(format!("scheduled task {}", path)));
        }
        Ok(())
    }
}

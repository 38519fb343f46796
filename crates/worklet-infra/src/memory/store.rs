//! In-memory workflow, workplace, context and event map store.

use std::collections::{BTreeSet, HashMap};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use worklet_core::repository::{
    ContextEventMapStore, WorkflowLogStore, WorkflowStore, WorkplaceStore,
};
use worklet_core::workflow::{Workflow, WorkflowContext};
use worklet_types::error::RepositoryError;
use worklet_types::log::LogEntry;
use worklet_types::program_counter::ProgramCounter;
use worklet_types::workflow::Workplace;

use super::log::MemoryLogStore;

#[derive(Debug, Clone)]
struct WaitEntry {
    hints: BTreeSet<String>,
    pc: ProgramCounter,
}

#[derive(Debug, Clone)]
struct TriggerEntry {
    event_type: String,
    hints: BTreeSet<String>,
    worklet_type: String,
}

/// DashMap-backed store. `L` receives the per-context log.
#[derive(Debug)]
pub struct MemoryStore<L = MemoryLogStore> {
    workflows: DashMap<String, Workflow>,
    workplaces: DashMap<String, Workplace>,
    contexts: DashMap<String, WorkflowContext>,
    /// Keyed by `(event type, context name)`.
    waits: DashMap<(String, String), WaitEntry>,
    /// Keyed by context name.
    triggers: DashMap<String, Vec<TriggerEntry>>,
    log: L,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_log(MemoryLogStore::new())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: WorkflowLogStore> MemoryStore<L> {
    pub fn with_log(log: L) -> Self {
        Self {
            workflows: DashMap::new(),
            workplaces: DashMap::new(),
            contexts: DashMap::new(),
            waits: DashMap::new(),
            triggers: DashMap::new(),
            log,
        }
    }

    pub fn log_store(&self) -> &L {
        &self.log
    }
}

// ---------------------------------------------------------------------------
// WorkflowStore
// ---------------------------------------------------------------------------

impl<L: WorkflowLogStore> WorkflowStore for MemoryStore<L> {
    async fn register_workflow(&self, workflow: Workflow) -> Result<(), RepositoryError> {
        self.workflows.insert(workflow.id().to_string(), workflow);
        Ok(())
    }

    async fn unregister_workflow(&self, workflow_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.workflows.remove(workflow_id).is_some())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.workflows.get(workflow_id).map(|w| w.value().clone()))
    }

    async fn workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let mut workflows: Vec<Workflow> = self.workflows.iter().map(|w| w.value().clone()).collect();
        workflows.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(workflows)
    }
}

// ---------------------------------------------------------------------------
// WorkplaceStore
// ---------------------------------------------------------------------------

impl<L: WorkflowLogStore> WorkplaceStore for MemoryStore<L> {
    async fn register_workplace(&self, workplace: Workplace) -> Result<(), RepositoryError> {
        match self.workplaces.entry(workplace.name.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "workplace '{}' already exists",
                workplace.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(workplace);
                Ok(())
            }
        }
    }

    async fn remove_workplace(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.workplaces.remove(name).is_some())
    }

    async fn get_workplace(&self, name: &str) -> Result<Option<Workplace>, RepositoryError> {
        Ok(self.workplaces.get(name).map(|w| w.value().clone()))
    }

    async fn workplaces(&self) -> Result<Vec<Workplace>, RepositoryError> {
        let mut workplaces: Vec<Workplace> =
            self.workplaces.iter().map(|w| w.value().clone()).collect();
        workplaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workplaces)
    }

    async fn register_context(&self, context: WorkflowContext) -> Result<(), RepositoryError> {
        match self.contexts.entry(context.name().to_string()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "workflow context '{}' already exists",
                context.name()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(context);
                Ok(())
            }
        }
    }

    async fn remove_context(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.contexts.remove(name).is_some())
    }

    async fn get_context(&self, name: &str) -> Result<Option<WorkflowContext>, RepositoryError> {
        Ok(self.contexts.get(name).map(|c| c.value().clone()))
    }

    async fn commit_context(&self, context: WorkflowContext) -> Result<(), RepositoryError> {
        match self.contexts.get_mut(context.name()) {
            Some(mut slot) => {
                *slot = context;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn contexts(&self) -> Result<Vec<WorkflowContext>, RepositoryError> {
        let mut contexts: Vec<WorkflowContext> =
            self.contexts.iter().map(|c| c.value().clone()).collect();
        contexts.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(contexts)
    }

    async fn workplace_contexts(&self, workplace: &str) -> Result<Vec<WorkflowContext>, RepositoryError> {
        let mut contexts: Vec<WorkflowContext> = self
            .contexts
            .iter()
            .filter(|c| c.workplace_name() == workplace)
            .map(|c| c.value().clone())
            .collect();
        contexts.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(contexts)
    }
}

// ---------------------------------------------------------------------------
// ContextEventMapStore
// ---------------------------------------------------------------------------

impl<L: WorkflowLogStore> ContextEventMapStore for MemoryStore<L> {
    async fn register_event_map(
        &self,
        event_type: &str,
        hints: &BTreeSet<String>,
        context_name: &str,
        pc: &ProgramCounter,
    ) -> Result<(), RepositoryError> {
        self.waits.insert(
            (event_type.to_string(), context_name.to_string()),
            WaitEntry {
                hints: hints.clone(),
                pc: pc.clone(),
            },
        );
        Ok(())
    }

    async fn unregister_event_map(&self, event_type: &str, context_name: &str) -> Result<(), RepositoryError> {
        self.waits
            .remove(&(event_type.to_string(), context_name.to_string()));
        Ok(())
    }

    async fn event_map_by_hint(
        &self,
        event_type: &str,
        hint: &str,
    ) -> Result<HashMap<String, ProgramCounter>, RepositoryError> {
        Ok(self
            .waits
            .iter()
            .filter(|entry| entry.key().0 == event_type && entry.value().hints.contains(hint))
            .map(|entry| (entry.key().1.clone(), entry.value().pc.clone()))
            .collect())
    }

    async fn is_event_map_present(&self, context_name: &str) -> Result<bool, RepositoryError> {
        Ok(self.waits.iter().any(|entry| entry.key().1 == context_name))
    }

    async fn register_trigger_event_map(
        &self,
        event_type: &str,
        hints: &BTreeSet<String>,
        context_name: &str,
        worklet_type: &str,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.triggers.entry(context_name.to_string()).or_default();
        entries.retain(|e| !(e.event_type == event_type && e.worklet_type == worklet_type));
        entries.push(TriggerEntry {
            event_type: event_type.to_string(),
            hints: hints.clone(),
            worklet_type: worklet_type.to_string(),
        });
        Ok(())
    }

    async fn unregister_trigger_event_map(&self, context_name: &str) -> Result<(), RepositoryError> {
        self.triggers.remove(context_name);
        Ok(())
    }

    async fn trigger_event_map_by_hint(
        &self,
        event_type: &str,
        hint: &str,
    ) -> Result<HashMap<String, String>, RepositoryError> {
        let mut matches = HashMap::new();
        for entry in self.triggers.iter() {
            if let Some(trigger) = entry
                .value()
                .iter()
                .find(|t| t.event_type == event_type && t.hints.contains(hint))
            {
                matches.insert(entry.key().clone(), trigger.worklet_type.clone());
            }
        }
        Ok(matches)
    }
}

// ---------------------------------------------------------------------------
// WorkflowLogStore
// ---------------------------------------------------------------------------

impl<L: WorkflowLogStore> WorkflowLogStore for MemoryStore<L> {
    async fn add_log(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.log.add_log(context_name, message).await
    }

    async fn add_exception(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.log.add_exception(context_name, message).await
    }

    async fn get_log(&self, context_name: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        self.log.get_log(context_name).await
    }
}

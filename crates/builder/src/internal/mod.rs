//! Internal model builder
//!
//! `InternalModelBuilder` owns the model under construction and exposes the
//! resolver operations (entity types, properties, keys, indexes,
//! relationships). Every operation takes the configuration source of its
//! caller: the fluent facade passes `Explicit`, conventions pass `Convention`
//! or `DataAnnotation`. Structural changes are recorded as events and drained
//! through the convention set by `process_conventions`.

mod entity;
mod index;
mod key;
mod property;
mod relationship;

pub use relationship::{NavigationRequest, RelationshipRequest};

use crate::config::BuilderConfig;
use crate::conventions::ConventionSet;
use crate::events::ModelEvent;
use modelforge_core::{CachedMemberAccessor, ConfigurationSource, MetadataError, MetadataResult};
use modelforge_metadata::{Model, Savepoint};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Whether an ignore recorded at `ignored` blocks a configuration at `source`
pub(crate) fn blocked_by_ignore(
    ignored: Option<ConfigurationSource>,
    source: ConfigurationSource,
) -> bool {
    ignored.is_some_and(|ignored| ignored >= source)
}

// ============================================================================
// InternalModelBuilder
// ============================================================================

/// Saved state restored when a configuration call fails
#[derive(Debug)]
struct Checkpoint {
    savepoint: Savepoint,
    pending: VecDeque<ModelEvent>,
}

/// Resolver layer over a model under construction
pub struct InternalModelBuilder {
    model: Model,
    accessor: CachedMemberAccessor,
    conventions: Rc<ConventionSet>,
    config: BuilderConfig,
    pending: VecDeque<ModelEvent>,
    processing: bool,
}

impl InternalModelBuilder {
    pub fn new(
        accessor: CachedMemberAccessor,
        conventions: ConventionSet,
        config: BuilderConfig,
    ) -> Self {
        Self {
            model: Model::new(),
            accessor,
            conventions: Rc::new(conventions),
            config,
            pending: VecDeque::new(),
            processing: false,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn accessor(&self) -> &CachedMemberAccessor {
        &self.accessor
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn conventions(&self) -> &ConventionSet {
        &self.conventions
    }

    /// Consume the builder, returning the model
    pub fn into_model(self) -> Model {
        self.model
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Queue an event for the convention set
    pub(crate) fn notify(&mut self, event: ModelEvent) {
        trace!(event = event.kind(), "queued model event");
        self.pending.push_back(event);
    }

    /// Number of events waiting for the convention set
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Drain queued events through the convention set until none remain
    ///
    /// Conventions run in set order for each event, events in the order they
    /// were raised. Rejections raised by a convention leave the model as the
    /// stronger source configured it and are not errors. Re-entrant calls
    /// return immediately; the outer drain picks up their events.
    pub fn process_conventions(&mut self) -> MetadataResult<()> {
        if self.processing {
            return Ok(());
        }
        self.processing = true;
        let conventions = Rc::clone(&self.conventions);
        let limit = self.config.max_convention_iterations;
        let mut processed = 0usize;
        let mut outcome = Ok(());

        'events: while let Some(event) = self.pending.pop_front() {
            processed += 1;
            if processed > limit {
                outcome = Err(MetadataError::internal(format!(
                    "conventions did not settle after {limit} events"
                )));
                break;
            }
            for convention in conventions.iter() {
                trace!(convention = convention.name(), event = event.kind(), "applying convention");
                match convention.apply(self, &event) {
                    Ok(()) => {}
                    Err(err) if err.is_rejection() => {
                        trace!(convention = convention.name(), error = %err, "convention rejected");
                    }
                    Err(err) => {
                        outcome = Err(err);
                        break 'events;
                    }
                }
            }
        }

        if outcome.is_err() {
            self.pending.clear();
        }
        self.processing = false;
        outcome
    }

    // ========================================================================
    // Checkpoints
    // ========================================================================

    fn checkpoint(&mut self) -> Checkpoint {
        Checkpoint {
            savepoint: self.model.savepoint(),
            pending: self.pending.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.model.rollback_to(checkpoint.savepoint);
        self.pending = checkpoint.pending;
    }

    /// Run one configuration call and settle conventions, all or nothing
    ///
    /// On error the model is restored to its state before the call.
    pub fn configure<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> MetadataResult<T>,
    ) -> MetadataResult<T> {
        let checkpoint = self.checkpoint();
        let result = operation(self).and_then(|value| {
            self.process_conventions()?;
            Ok(value)
        });
        match &result {
            Ok(_) => self.model.release(checkpoint.savepoint),
            Err(err) => {
                warn!(error = %err, "configuration failed, model restored");
                self.restore(checkpoint);
            }
        }
        result
    }

    /// Run a convention step that may not apply
    ///
    /// Rejections, missing elements and relationship shape errors undo the
    /// step and yield `None`; anything else is an error. Undoing costs what
    /// the step touched, and events the step raised are dropped with it.
    pub(crate) fn attempt<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> MetadataResult<T>,
    ) -> MetadataResult<Option<T>> {
        let savepoint = self.model.savepoint();
        let queued = self.pending.len();
        let result = operation(self);
        if result.is_err() {
            self.model.rollback_to(savepoint);
            self.pending.truncate(queued);
        } else {
            self.model.release(savepoint);
        }
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_rejection() || err.is_not_found() || err.is_relationship() => {
                debug!(error = %err, "convention step skipped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for InternalModelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalModelBuilder")
            .field("entity_types", &self.model.entity_type_count())
            .field("pending", &self.pending.len())
            .field("conventions", &self.conventions.len())
            .finish()
    }
}

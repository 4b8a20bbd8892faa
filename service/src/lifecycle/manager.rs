//! Creation, training, analysis and deletion of composite models

use crate::context::ComposerContext;
use crate::graph::topological_sort;
use crate::parser::{DirectiveTable, ParsedSchema, SchemaBlock, SchemaParser, parse_blocks};
use crate::store::{
    BaseModelLink, ModelHeader, OrderRecord, OwnershipRecord, ParentEdgeRecord,
    PredictorAssignmentRecord, ReplicateRecord,
};
use composer_core::{ColNo, ColumnSpec, ComposerError, ModelId, Result, Table, casefold};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle operations over the composite models of one composer
pub struct ModelLifecycle {
    ctx: Arc<ComposerContext>,
}

impl ModelLifecycle {
    #[must_use]
    pub fn new(ctx: Arc<ComposerContext>) -> Self {
        Self { ctx }
    }

    /// Schema parser that knows the currently registered predictor builders
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SchemaError` if a builder name collides with a
    /// reserved directive
    pub fn parser(&self) -> Result<SchemaParser> {
        let directives = DirectiveTable::new(
            &self.ctx.config().parser.base_aliases,
            self.ctx.registry().names(),
        )?;
        Ok(SchemaParser::new(directives))
    }

    /// Create a composite model from schema text
    ///
    /// # Errors
    ///
    /// See [`ModelLifecycle::create_model`]
    pub fn create_model_from_text(&self, name: &str, table: &str, schema: &str) -> Result<ModelId> {
        self.create_model(name, table, &parse_blocks(schema)?)
    }

    /// Create a composite model over `table`
    ///
    /// The schema is parsed, checked against the table and scheduled before
    /// anything is written. The base model is created next, then every
    /// record is written in one transaction; if that fails the base model is
    /// dropped again.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SchemaError` for an invalid schema,
    /// `ComposerError::CyclicDependency` if the foreign columns cannot be
    /// ordered, or `ComposerError::InvalidArgument` if the name is taken
    pub fn create_model(&self, name: &str, table: &str, blocks: &[SchemaBlock]) -> Result<ModelId> {
        let name = casefold(name);
        if name.is_empty() {
            return Err(ComposerError::invalid("Composite model name is empty"));
        }
        let table = self.ctx.table(table)?;
        let schema = self.parser()?.parse(blocks)?;
        check_table_columns(&schema, &table)?;

        if self.ctx.store().snapshot()?.model_by_name(&name).is_some() {
            return Err(ComposerError::invalid(format!(
                "Composite model \"{name}\" already exists"
            )));
        }

        let order: Vec<String> = topological_sort(
            schema
                .foreign
                .iter()
                .map(|column| (column.clone(), schema.parents.get(column).cloned().unwrap_or_default())),
        )?
        .into_iter()
        .map(|(column, _)| column)
        .collect();

        let columns: Vec<ColumnSpec> = schema
            .columns
            .iter()
            .map(|(column, stattype)| ColumnSpec::new(column, *stattype))
            .collect();
        let colno = |column: &str| -> Result<ColNo> {
            schema
                .columns
                .get_index_of(column)
                .ok_or_else(|| ComposerError::ColumnNotFound(column.to_string()))
        };

        let local: Vec<ColumnSpec> = columns
            .iter()
            .filter(|c| schema.local.contains(&c.name))
            .cloned()
            .collect();

        let mut ownership = Vec::with_capacity(columns.len());
        for column in &columns {
            ownership.push((colno(column.name.as_str())?, schema.local.contains(&column.name)));
        }
        let mut edges = Vec::new();
        for (child, parents) in &schema.parents {
            for parent in parents {
                edges.push((colno(child.as_str())?, colno(parent.as_str())?));
            }
        }
        let ranks: Vec<ColNo> = order.iter().map(|c| colno(c.as_str())).collect::<Result<_>>()?;
        let mut assignments = Vec::with_capacity(schema.predictors.len());
        for (column, builder) in &schema.predictors {
            assignments.push((colno(column.as_str())?, builder.clone()));
        }

        let base = self.ctx.base.create(
            &format!("{name}_base"),
            &table,
            &local,
            &schema.dependencies,
        )?;

        let mut created = None;
        let written = self.ctx.store().transact(&mut |state| {
            if state.model_by_name(&name).is_some() {
                return Err(ComposerError::invalid(format!(
                    "Composite model \"{name}\" already exists"
                )));
            }
            let id = state.allocate_model_id();
            state.models.push(ModelHeader {
                id,
                name: name.clone(),
                table: table.name().to_string(),
                columns: columns.clone(),
            });
            state.base_links.push(BaseModelLink { model: id, base });
            state
                .ownership
                .extend(ownership.iter().map(|(colno, local)| OwnershipRecord {
                    model: id,
                    colno: *colno,
                    local: *local,
                }));
            state
                .parents
                .extend(edges.iter().map(|(child, parent)| ParentEdgeRecord {
                    model: id,
                    child: *child,
                    parent: *parent,
                }));
            state
                .order
                .extend(ranks.iter().enumerate().map(|(rank, colno)| OrderRecord {
                    model: id,
                    colno: *colno,
                    rank,
                }));
            state.assignments.extend(assignments.iter().map(|(colno, builder)| {
                PredictorAssignmentRecord {
                    model: id,
                    colno: *colno,
                    builder: builder.clone(),
                    trained: None,
                }
            }));
            created = Some(id);
            Ok(())
        });

        match (written, created) {
            (Ok(()), Some(id)) => {
                info!(
                    model = %id,
                    name = %name,
                    base = %base,
                    local = schema.local.len(),
                    foreign = schema.foreign.len(),
                    "created composite model"
                );
                Ok(id)
            }
            (result, _) => {
                if let Err(e) = self.ctx.base.drop_model(base) {
                    warn!(base = %base, error = %e, "failed to drop base model after aborted create");
                }
                Err(result.err().unwrap_or_else(|| {
                    ComposerError::invalid(format!("Composite model \"{name}\" was not recorded"))
                }))
            }
        }
    }

    /// Delete a composite model, its base model and its cached predictors
    ///
    /// The records are removed first. If the base model then refuses the
    /// drop, the records are put back so the drop can be retried.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if the model does not exist,
    /// or the base model's error after the records were restored
    pub fn drop_model(&self, id: ModelId) -> Result<()> {
        let mut removed = None;
        self.ctx.store().transact(&mut |state| {
            removed = Some(
                state
                    .take_model(id)
                    .ok_or_else(|| ComposerError::ModelNotFound(id.to_string()))?,
            );
            Ok(())
        })?;
        let Some(records) = removed else {
            return Err(ComposerError::ModelNotFound(id.to_string()));
        };
        let base = records.base_link(id)?;
        let evicted = self.ctx.cache().evict_model(id);

        if let Err(err) = self.ctx.base.drop_model(base) {
            warn!(model = %id, base = %base, error = %err, "base model drop failed, restoring records");
            self.ctx
                .store()
                .transact(&mut |state| state.restore_model(records.clone()))?;
            return Err(err);
        }
        info!(model = %id, base = %base, evicted, "dropped composite model");
        Ok(())
    }

    /// Add `replicates` replicates and train every untrained foreign predictor
    ///
    /// Predictors are trained once per model and shared by all replicates.
    /// If the base model fails to initialize, the new replicate records are
    /// withdrawn again; trained predictors are kept.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::UnregisteredPredictor` if a persisted builder
    /// is no longer registered, or the base model's or builder's error
    pub fn initialize_models(&self, id: ModelId, replicates: usize) -> Result<()> {
        if replicates == 0 {
            return Err(ComposerError::invalid("replicate count must be positive"));
        }
        let model = self.ctx.model(id)?;
        let table = self.ctx.table(&model.table)?;

        let mut trained: Vec<(ColNo, Arc<Vec<u8>>)> = Vec::new();
        for colno in model.graph().order() {
            let Some(assignment) = model.assignment(*colno) else {
                continue;
            };
            if assignment.trained.is_some() {
                continue;
            }
            let column = model.column(*colno)?;
            let builder = self.ctx.registry().require(&assignment.builder, &column.name)?;
            let conditions = model
                .graph()
                .parents(*colno)
                .iter()
                .map(|parent| model.column(*parent).cloned())
                .collect::<Result<Vec<_>>>()?;
            let predictor = builder.create(&table, std::slice::from_ref(column), &conditions)?;
            let bytes = builder.serialize(predictor.as_ref())?;
            debug!(model = %id, column = %column.name, builder = %assignment.builder, bytes = bytes.len(), "trained foreign predictor");
            trained.push((*colno, Arc::new(bytes)));
        }

        let mut added = 0..0;
        self.ctx.store().transact(&mut |state| {
            state.model(id)?;
            for (colno, bytes) in &trained {
                if let Some(record) = state
                    .assignments
                    .iter_mut()
                    .find(|r| r.model == id && r.colno == *colno && r.trained.is_none())
                {
                    record.trained = Some(Arc::clone(bytes));
                }
            }
            let existing = state.replicates_of(id).len();
            added = existing..existing + replicates;
            state.replicates.extend(added.clone().map(|replicate| ReplicateRecord {
                model: id,
                replicate,
                iterations: 0,
            }));
            Ok(())
        })?;

        // Replicate records are committed before the base model grows, so a
        // failed commit leaves the base model untouched
        if let Err(err) = self.ctx.base.initialize(model.base, replicates) {
            warn!(model = %id, error = %err, "base model initialize failed, withdrawing replicates");
            self.ctx.store().transact(&mut |state| {
                state
                    .replicates
                    .retain(|r| r.model != id || !added.contains(&r.replicate));
                Ok(())
            })?;
            return Err(err);
        }

        info!(model = %id, replicates, trained = trained.len(), "initialized composite model");
        Ok(())
    }

    /// Run base-model inference and record the iterations per replicate
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotInitialized` if the model has no
    /// replicates or `ComposerError::InvalidArgument` for an unknown replicate
    pub fn analyze_models(
        &self,
        id: ModelId,
        replicates: Option<&[usize]>,
        iterations: u32,
        max_duration: Option<Duration>,
    ) -> Result<()> {
        let model = self.ctx.model(id)?;
        let selected: Vec<usize> = match replicates {
            Some(list) => {
                for r in list {
                    model.select_replicates(Some(*r))?;
                }
                list.to_vec()
            }
            None => model.select_replicates(None)?,
        };

        self.ctx
            .base
            .analyze(model.base, replicates, iterations, max_duration)?;

        self.ctx.store().transact(&mut |state| {
            for record in state
                .replicates
                .iter_mut()
                .filter(|r| r.model == id && selected.contains(&r.replicate))
            {
                record.iterations += u64::from(iterations);
            }
            Ok(())
        })?;

        info!(model = %id, replicates = selected.len(), iterations, "analyzed composite model");
        Ok(())
    }

    /// Per-replicate deletion is not supported for composite models
    ///
    /// # Errors
    ///
    /// Always returns `ComposerError::UnsupportedOperation`
    pub fn drop_replicates(&self, id: ModelId, _replicates: &[usize]) -> Result<()> {
        Err(ComposerError::unsupported(format!(
            "cannot drop individual replicates of composite model {id}"
        )))
    }

    /// Id of a composite model by name
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if no model has the name
    pub fn model_id(&self, name: &str) -> Result<ModelId> {
        let name = casefold(name);
        self.ctx
            .store()
            .snapshot()?
            .model_by_name(&name)
            .map(|m| m.id)
            .ok_or(ComposerError::ModelNotFound(name))
    }

    /// Iterations recorded for each replicate, in replicate order
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if the model does not exist
    pub fn replicate_iterations(&self, id: ModelId) -> Result<Vec<u64>> {
        let snapshot = self.ctx.store().snapshot()?;
        snapshot.model(id)?;
        Ok(snapshot
            .replicates_of(id)
            .into_iter()
            .map(|r| r.iterations)
            .collect())
    }
}

/// Every schema column must exist in the table
fn check_table_columns(schema: &ParsedSchema, table: &Table) -> Result<()> {
    match schema
        .columns
        .keys()
        .find(|column| table.column_index(column).is_none())
    {
        Some(column) => Err(ComposerError::schema(format!(
            "Column \"{column}\" does not exist in table \"{}\"",
            table.name()
        ))),
        None => Ok(()),
    }
}

//! Value transform nodes: select, select-many, collect, combine

use crate::context::RunContext;
use crate::error::EngineError;
use crate::node::{NodeId, PipelineValue};
use crate::nodes::{reusable, NodeExec};
use crate::store::TablePart;
use crate::table::StateTable;
use std::sync::Arc;

pub(crate) type MapFn<T, U> = dyn Fn(&T) -> U + Send + Sync;
pub(crate) type FlatMapFn<T, U> = dyn Fn(&T) -> Vec<U> + Send + Sync;

fn equal<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Per-entry map; entries whose upstream value is unchanged keep their
/// previous result.
pub(crate) struct SelectNode<T, U> {
    pub input: NodeId,
    pub map: Arc<MapFn<T, U>>,
}

impl<T: PipelineValue, U: PipelineValue> NodeExec for SelectNode<T, U> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let input = ctx.input::<T>(self.input)?;
        let previous = ctx.previous::<U>(TablePart::Output)?;

        if let Some(previous) = &previous {
            if input.is_cached() {
                ctx.publish(TablePart::Output, previous.as_cached());
                return Ok(());
            }
        }

        let previous = previous.unwrap_or_default();
        let prev_input = ctx.previous_output_of::<T>(self.input)?;
        let prev_inputs: Vec<&T> = prev_input.values().collect();
        let prev_outputs: Vec<&U> = previous.values().collect();

        let mut candidates = Vec::with_capacity(prev_outputs.len());
        let mut executed = 0;
        for (i, entry) in input.live().enumerate() {
            ctx.check_cancelled()?;
            match reusable(entry, i, &prev_inputs, &prev_outputs) {
                Some(old) => candidates.push(old.clone()),
                None => {
                    candidates.push((self.map)(&entry.value));
                    executed += 1;
                }
            }
        }

        let table = StateTable::diff(&previous, candidates, equal);
        ctx.executed(executed);
        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

/// Map over a single value
pub(crate) struct SelectValueNode<T, U> {
    pub input: NodeId,
    pub map: Arc<MapFn<T, U>>,
}

impl<T: PipelineValue, U: PipelineValue> NodeExec for SelectValueNode<T, U> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let input = ctx.input::<T>(self.input)?;
        let previous = ctx.previous::<U>(TablePart::Output)?;

        if let Some(previous) = &previous {
            if input.is_cached() {
                ctx.publish(TablePart::Output, previous.as_cached());
                return Ok(());
            }
        }

        let mapped: Vec<U> = input.values().map(|v| (self.map)(v)).collect();
        ctx.executed(mapped.len());
        let table = StateTable::diff(&previous.unwrap_or_default(), mapped, equal);
        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

/// One-to-many map, flattened.
///
/// Groups are cached per upstream entry, but the flattened output is diffed
/// as one table by position; flattened elements are not matched against
/// their previous identities.
pub(crate) struct SelectManyNode<T, U> {
    pub input: NodeId,
    pub map: Arc<FlatMapFn<T, U>>,
}

impl<T: PipelineValue, U: PipelineValue> NodeExec for SelectManyNode<T, U> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let input = ctx.input::<T>(self.input)?;
        let prev_groups = ctx.previous::<Arc<[U]>>(TablePart::PerInput)?;
        let prev_output = ctx.previous::<U>(TablePart::Output)?;

        if let (Some(groups), Some(output)) = (&prev_groups, &prev_output) {
            if input.is_cached() {
                ctx.publish(TablePart::PerInput, groups.as_cached());
                ctx.publish(TablePart::Output, output.as_cached());
                return Ok(());
            }
        }

        let prev_groups = prev_groups.unwrap_or_default();
        let prev_input = ctx.previous_output_of::<T>(self.input)?;
        let prev_inputs: Vec<&T> = prev_input.values().collect();
        let prev_group_values: Vec<&Arc<[U]>> = prev_groups.values().collect();

        let mut groups = Vec::new();
        let mut executed = 0;
        for (i, entry) in input.live().enumerate() {
            ctx.check_cancelled()?;
            match reusable(entry, i, &prev_inputs, &prev_group_values) {
                Some(old) => groups.push(old.clone()),
                None => {
                    groups.push(Arc::from((self.map)(&entry.value)));
                    executed += 1;
                }
            }
        }

        let groups = StateTable::diff(&prev_groups, groups, equal);
        let output = StateTable::diff(
            &prev_output.unwrap_or_default(),
            groups.values().flat_map(|g| g.iter().cloned()),
            equal,
        );

        ctx.executed(executed);
        ctx.publish(TablePart::PerInput, groups);
        ctx.publish(TablePart::Output, output);
        Ok(())
    }
}

/// Gathers every upstream value into one aggregate entry
pub(crate) struct CollectNode<T> {
    pub input: NodeId,
    pub _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: PipelineValue> NodeExec for CollectNode<T> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let input = ctx.input::<T>(self.input)?;
        let previous = ctx.previous::<Arc<[T]>>(TablePart::Output)?;

        if let Some(previous) = &previous {
            if input.is_cached() {
                ctx.publish(TablePart::Output, previous.as_cached());
                return Ok(());
            }
        }

        let aggregate: Arc<[T]> = input.values().cloned().collect();
        ctx.executed(1);
        let table = StateTable::diff(&previous.unwrap_or_default(), [aggregate], equal);
        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

/// Pairs each left entry with the single right value.
///
/// A left entry is recomputed when it changed or when the right value did.
pub(crate) struct CombineNode<L, R> {
    pub left: NodeId,
    pub right: NodeId,
    pub _marker: std::marker::PhantomData<fn() -> (L, R)>,
}

impl<L: PipelineValue, R: PipelineValue> NodeExec for CombineNode<L, R> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let left = ctx.input::<L>(self.left)?;
        let right = ctx.input::<R>(self.right)?;
        let previous = ctx.previous::<(L, R)>(TablePart::Output)?;

        if let Some(previous) = &previous {
            if left.is_cached() && right.is_cached() {
                ctx.publish(TablePart::Output, previous.as_cached());
                return Ok(());
            }
        }

        let previous = previous.unwrap_or_default();
        let Some(right_value) = right.single() else {
            // no right value, nothing to pair with
            let table = StateTable::diff(&previous, Vec::new(), equal);
            ctx.publish(TablePart::Output, table);
            return Ok(());
        };

        let prev_left = ctx.previous_output_of::<L>(self.left)?;
        let prev_lefts: Vec<&L> = prev_left.values().collect();
        let prev_pairs: Vec<&(L, R)> = previous.values().collect();
        let right_cached = right.is_cached();

        let mut candidates = Vec::with_capacity(prev_pairs.len());
        let mut executed = 0;
        for (i, entry) in left.live().enumerate() {
            ctx.check_cancelled()?;
            let reused = if right_cached {
                reusable(entry, i, &prev_lefts, &prev_pairs)
            } else {
                None
            };
            match reused {
                Some(old) => candidates.push(old.clone()),
                None => {
                    candidates.push((entry.value.clone(), right_value.clone()));
                    executed += 1;
                }
            }
        }

        let table = StateTable::diff(&previous, candidates, equal);
        ctx.executed(executed);
        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

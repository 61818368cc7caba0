//! Place flat extraction output onto the steps that use it

use crate::parser::types::Module;

/// How many elements of the flat list found a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub total: usize,
    pub placed: usize,
}

impl ReconcileOutcome {
    pub fn unplaced(&self) -> usize {
        self.total - self.placed
    }
}

/// Consuming form of [`reconcile_in_place`]
pub fn reconcile(mut module: Module) -> Module {
    reconcile_in_place(&mut module);
    module
}

/// Group `module.extracted_data` under steps by exact `step_name == step` match.
///
/// A step with at least one match gets exactly its matched elements, in flat
/// list order and without `step_name`; other steps are left untouched. The flat
/// list is dropped once every element has been placed and kept whole otherwise.
/// Steps sharing identical text all receive the same elements.
pub fn reconcile_in_place(module: &mut Module) -> ReconcileOutcome {
    let Some(flat) = module.extracted_data.as_ref() else {
        return ReconcileOutcome {
            total: 0,
            placed: 0,
        };
    };

    let mut matched = vec![false; flat.len()];

    for step in module.execution_steps.iter_mut() {
        let elements: Vec<_> = flat
            .iter()
            .enumerate()
            .filter(|(_, e)| e.step_name == step.step)
            .map(|(idx, e)| {
                matched[idx] = true;
                e.project()
            })
            .collect();

        if !elements.is_empty() {
            step.extracted_data = elements;
        }
    }

    let outcome = ReconcileOutcome {
        total: flat.len(),
        placed: matched.iter().filter(|m| **m).count(),
    };

    if outcome.placed == outcome.total {
        module.extracted_data = None;
    } else {
        for e in flat.iter().zip(&matched).filter(|(_, m)| !**m).map(|(e, _)| e) {
            log::warn!(
                "Element '{}' names unknown step \"{}\" on {}",
                e.request_description,
                e.step_name,
                module.url
            );
        }
    }

    outcome
}
